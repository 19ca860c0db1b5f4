//! Launch Sequence entry point
//!
//! On the web: mounts the story against the live page and drives it from
//! `requestAnimationFrame`. Natively: a headless scroll sweep over a
//! stacked page layout that logs what the story did.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod web_app {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;

    use launch_sequence::EngineSettings;
    use launch_sequence::audio::WebAudio;
    use launch_sequence::consts::FRAME_DT;
    use launch_sequence::engine::{FrameInput, Story};
    use launch_sequence::platform::{self, DomBinder, DomLayout};

    /// Mounted story plus everything it draws and plays through
    struct App {
        story: Story,
        layout: DomLayout,
        binder: DomBinder,
        audio: WebAudio,
        settings: EngineSettings,
        start_time: f64,
        last_time: f64,
        running: bool,
        /// A `requestAnimationFrame` callback is pending
        looping: bool,
    }

    impl App {
        fn frame(&mut self, time: f64) {
            if self.start_time == 0.0 {
                self.start_time = time;
            }
            // Section clamps long gaps (tab switch)
            let dt = if self.last_time > 0.0 {
                ((time - self.last_time) / 1000.0) as f32
            } else {
                FRAME_DT
            };
            self.last_time = time;

            let input = FrameInput {
                time_secs: ((time - self.start_time) / 1000.0) as f32,
                dt,
            };
            let reports = self
                .story
                .frame(&input, &self.layout, &mut self.audio, &mut self.binder);
            log::trace!(
                "Frame: {} collisions, {} particles",
                reports.iter().map(|r| r.collisions.len()).sum::<usize>(),
                self.story.live_particles()
            );
        }

        fn stop(&mut self) {
            if self.running {
                self.story.unmount(&mut self.binder);
                self.audio.set_muted(true);
                self.running = false;
            }
        }

        /// Back from the page cache; true if the frame loop must be restarted
        fn restart(&mut self) -> bool {
            if self.running {
                return false;
            }
            self.audio.set_muted(self.settings.muted);
            if let Err(e) = self.story.remount(&mut self.audio) {
                log::error!("Failed to remount story: {}", e);
                return false;
            }
            self.last_time = 0.0;
            self.running = true;
            !std::mem::replace(&mut self.looping, true)
        }

        fn toggle_mute(&mut self) {
            self.settings.muted = !self.settings.muted;
            self.audio.set_muted(self.settings.muted);
            self.settings.save();
            log::info!("Muted: {}", self.settings.muted);
        }
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Launch Sequence starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let viewport = platform::viewport_size().ok_or("no viewport size")?;

        let settings = EngineSettings::load();
        let mut audio = WebAudio::new(settings.master_volume, settings.sfx_volume);
        audio.set_muted(settings.muted);

        let story = Story::mount(&settings, viewport, &mut audio)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let app = Rc::new(RefCell::new(App {
            story,
            layout: DomLayout::new(window.clone(), document.clone()),
            binder: DomBinder::new(document.clone()),
            audio,
            settings,
            start_time: 0.0,
            last_time: 0.0,
            running: true,
            looping: true,
        }));

        setup_listeners(&window, app.clone());
        request_animation_frame(app);
        Ok(())
    }

    fn setup_listeners(window: &web_sys::Window, app: Rc<RefCell<App>>) {
        // Leaving the page (navigation or bfcache)
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow_mut().stop();
            });
            let _ = window
                .add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Restored from bfcache
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let restarted = app.borrow_mut().restart();
                if restarted {
                    request_animation_frame(app.clone());
                }
            });
            let _ = window
                .add_event_listener_with_callback("pageshow", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Audio can only start after a gesture
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow().audio.resume();
            });
            let _ = window
                .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                let mut a = app.borrow_mut();
                a.audio.resume();
                if matches!(event.key().as_str(), "m" | "M") {
                    a.toggle_mute();
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            frame_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn frame_loop(app: Rc<RefCell<App>>, time: f64) {
        {
            let mut a = app.borrow_mut();
            if !a.running {
                a.looping = false;
                return;
            }
            a.frame(time);
        }

        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    web_app::run()
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Launch Sequence (native) starting...");

    if let Err(e) = headless::run(std::env::args().nth(1)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use glam::Vec2;

    use launch_sequence::audio::{Cue, CueLog};
    use launch_sequence::binder::RecordingBinder;
    use launch_sequence::consts::FRAME_DT;
    use launch_sequence::engine::{FrameInput, ScrollAccumulator, StackedPage, StoryFlag, Story};
    use launch_sequence::{ConfigError, ConfigResult, EngineSettings, QualityPreset};

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 800.0);
    /// One wheel notch per frame
    const WHEEL_DELTA: f32 = 40.0;

    /// `arg` is a quality preset name or a settings JSON file
    fn load_settings(arg: Option<String>) -> ConfigResult<EngineSettings> {
        let Some(arg) = arg else {
            return Ok(EngineSettings::default());
        };
        if let Some(preset) = QualityPreset::parse(&arg) {
            log::info!("Using {} preset", preset.as_str());
            return Ok(EngineSettings::from_preset(preset));
        }
        let json = std::fs::read_to_string(&arg)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", arg, e)))?;
        log::info!("Loaded settings from {}", arg);
        EngineSettings::from_json(&json)
    }

    /// Scroll to the bottom of the page and back up, one wheel notch per frame
    pub fn run(arg: Option<String>) -> ConfigResult<()> {
        let settings = load_settings(arg)?;
        let mut audio = CueLog::default();
        let mut binder = RecordingBinder::default();
        let mut story = Story::mount(&settings, VIEWPORT, &mut audio)?;

        let max_scroll = StackedPage::max_scroll(VIEWPORT);
        let mut wheel = ScrollAccumulator::new(VIEWPORT.y)?;
        let mut time = 0.0;
        let mut frames = 0usize;
        let mut collisions = 0usize;
        let mut peak_particles = 0usize;
        let mut docked = false;

        for direction in [1.0, -1.0] {
            loop {
                let scroll_y = (wheel.value() * VIEWPORT.y).min(max_scroll);
                time += FRAME_DT;
                let input = FrameInput {
                    time_secs: time,
                    dt: FRAME_DT,
                };
                let page = StackedPage::new(VIEWPORT, scroll_y);
                for report in story.frame(&input, &page, &mut audio, &mut binder) {
                    collisions += report.collisions.len();
                }
                frames += 1;
                peak_particles = peak_particles.max(story.live_particles());
                docked |= story.flags().contains(StoryFlag::Docked);

                let at_end = if direction > 0.0 {
                    scroll_y >= max_scroll
                } else {
                    scroll_y <= 0.0
                };
                if at_end {
                    break;
                }
                wheel.push(direction * WHEEL_DELTA);
            }
            log::info!(
                "Reached scroll {:.0} after {} frames",
                (wheel.value() * VIEWPORT.y).min(max_scroll),
                frames
            );
        }

        story.unmount(&mut binder);

        println!("Frames:          {}", frames);
        println!("Collisions:      {}", collisions);
        println!("Peak particles:  {}", peak_particles);
        println!("Docked:          {}", docked);
        for cue in [Cue::Ambient, Cue::Launch, Cue::UfoScan, Cue::Docking] {
            println!("Cue {:<12} {}", cue.as_str(), audio.count(cue));
        }
        println!("Left on screen:  {}", binder.live_particles());
        Ok(())
    }
}
