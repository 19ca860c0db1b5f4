//! Audio cues
//!
//! The engine only ever says "play this cue" and moves on: no waiting, no
//! failure handling. On the web the cues are synthesized with the Web Audio
//! API, so no sound files are needed.

use serde::{Deserialize, Serialize};

/// Named story sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// Space drone, started once when the story mounts
    Ambient,
    /// Rocket whoosh at lift-off
    Launch,
    /// UFO scanner warble
    UfoScan,
    /// Docking clamp lock
    Docking,
}

impl Cue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cue::Ambient => "ambient",
            Cue::Launch => "launch",
            Cue::UfoScan => "ufo-scan",
            Cue::Docking => "docking",
        }
    }
}

/// Fire-and-forget sink for cues
pub trait AudioTrigger {
    fn play(&mut self, cue: Cue);
}

/// Drops every cue (muted, or no audio backend)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioTrigger for SilentAudio {
    fn play(&mut self, _cue: Cue) {}
}

/// Remembers cues in order; used by the headless runner and tests
#[derive(Debug, Default, Clone)]
pub struct CueLog {
    pub played: Vec<Cue>,
}

impl CueLog {
    pub fn count(&self, cue: Cue) -> usize {
        self.played.iter().filter(|&&c| c == cue).count()
    }
}

impl AudioTrigger for CueLog {
    fn play(&mut self, cue: Cue) {
        log::info!("Cue: {}", cue.as_str());
        self.played.push(cue);
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebAudio;

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::{AudioTrigger, Cue};

    /// Web Audio synthesizer for story cues
    pub struct WebAudio {
        ctx: Option<AudioContext>,
        master_volume: f32,
        sfx_volume: f32,
        muted: bool,
        ambient: Option<(OscillatorNode, OscillatorNode)>,
        /// Ambient was cued; resumes on unmute
        ambient_cued: bool,
    }

    impl WebAudio {
        pub fn new(master_volume: f32, sfx_volume: f32) -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                master_volume: master_volume.clamp(0.0, 1.0),
                sfx_volume: sfx_volume.clamp(0.0, 1.0),
                muted: false,
                ambient: None,
                ambient_cued: false,
            }
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        pub fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
            if muted {
                self.stop_ambient();
            } else if self.ambient_cued {
                self.play(Cue::Ambient);
            }
        }

        fn effective_volume(&self) -> f32 {
            if self.muted {
                0.0
            } else {
                self.master_volume * self.sfx_volume
            }
        }

        /// Create an oscillator with gain envelope
        fn create_osc(
            &self,
            ctx: &AudioContext,
            freq: f32,
            osc_type: OscillatorType,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;

            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;

            Some((osc, gain))
        }

        /// Two detuned low sines, looping until muted or dropped
        fn play_ambient(&mut self, ctx: &AudioContext, vol: f32) {
            if self.ambient.is_some() {
                return;
            }
            let (Some((low, low_gain)), Some((high, high_gain))) = (
                self.create_osc(ctx, 55.0, OscillatorType::Sine),
                self.create_osc(ctx, 82.5, OscillatorType::Sine),
            ) else {
                return;
            };
            let t = ctx.current_time();
            low_gain.gain().set_value_at_time(0.0, t).ok();
            low_gain
                .gain()
                .linear_ramp_to_value_at_time(vol * 0.12, t + 3.0)
                .ok();
            high_gain.gain().set_value_at_time(0.0, t).ok();
            high_gain
                .gain()
                .linear_ramp_to_value_at_time(vol * 0.05, t + 4.0)
                .ok();
            low.start().ok();
            high.start().ok();
            self.ambient = Some((low, high));
        }

        fn stop_ambient(&mut self) {
            if let Some((low, high)) = self.ambient.take() {
                low.stop().ok();
                high.stop().ok();
            }
        }

        /// Launch - rising sawtooth whoosh over a rumble
        fn play_launch(&self, ctx: &AudioContext, vol: f32) {
            let t = ctx.current_time();

            if let Some((osc, gain)) = self.create_osc(ctx, 80.0, OscillatorType::Sawtooth) {
                gain.gain().set_value_at_time(vol * 0.25, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 1.2)
                    .ok();
                osc.frequency().set_value_at_time(80.0, t).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(900.0, t + 1.0)
                    .ok();
                osc.start().ok();
                osc.stop_with_when(t + 1.3).ok();
            }

            // Rumble
            if let Some((osc, gain)) = self.create_osc(ctx, 40.0, OscillatorType::Triangle) {
                gain.gain().set_value_at_time(vol * 0.4, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.01, t + 1.5)
                    .ok();
                osc.start().ok();
                osc.stop_with_when(t + 1.6).ok();
            }
        }

        /// UFO scan - warbling sine sweep
        fn play_ufo_scan(&self, ctx: &AudioContext, vol: f32) {
            let Some((osc, gain)) = self.create_osc(ctx, 600.0, OscillatorType::Sine) else {
                return;
            };
            let t = ctx.current_time();

            gain.gain().set_value_at_time(vol * 0.3, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, t + 1.6)
                .ok();
            for i in 0..8 {
                let step = t + i as f64 * 0.2;
                let freq = if i % 2 == 0 { 600.0 } else { 1200.0 };
                osc.frequency()
                    .linear_ramp_to_value_at_time(freq, step + 0.2)
                    .ok();
            }
            osc.start().ok();
            osc.stop_with_when(t + 1.7).ok();
        }

        /// Docking - two metallic clunks
        fn play_docking(&self, ctx: &AudioContext, vol: f32) {
            let t = ctx.current_time();
            for (delay, freq) in [(0.0, 220.0), (0.25, 160.0)] {
                if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Square) {
                    gain.gain().set_value_at_time(vol * 0.25, t + delay).ok();
                    gain.gain()
                        .exponential_ramp_to_value_at_time(0.01, t + delay + 0.18)
                        .ok();
                    osc.start_with_when(t + delay).ok();
                    osc.stop_with_when(t + delay + 0.2).ok();
                }
            }
        }
    }

    impl AudioTrigger for WebAudio {
        fn play(&mut self, cue: Cue) {
            if cue == Cue::Ambient {
                self.ambient_cued = true;
            }
            let vol = self.effective_volume();
            if vol <= 0.0 {
                return;
            }
            let Some(ctx) = self.ctx.clone() else { return };

            // Resume context if suspended (browsers require user gesture)
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            match cue {
                Cue::Ambient => self.play_ambient(&ctx, vol),
                Cue::Launch => self.play_launch(&ctx, vol),
                Cue::UfoScan => self.play_ufo_scan(&ctx, vol),
                Cue::Docking => self.play_docking(&ctx, vol),
            }
        }
    }

    impl Drop for WebAudio {
        fn drop(&mut self) {
            self.stop_ambient();
        }
    }
}
