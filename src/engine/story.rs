//! The launch story
//!
//! Five stacked sections: the countdown and lift-off, a buffeting climb
//! through the stratosphere, a zigzag through drifting problem clouds, a UFO
//! abduction with rescue cards, and the docking sequence.
//!
//! Section coordinates are CSS pixels relative to each section's top-left
//! corner, laid out for a reference viewport.

use glam::Vec2;

use super::NodeId;
use super::collision::{DriftingObstacle, ObstacleField};
use super::geometry::{Pose, Rect};
use super::particles::BurstPreset;
use super::progress::{Anchor, ScrollMetrics, ScrollWindow, WindowEnd};
use super::section::{FrameInput, FrameReport, PageLayout, ParallaxLayer, Section, SectionDef};
use super::timeline::{Motion, Phase, PhaseEffect, StoryFlag, StoryFlags};
use crate::audio::{AudioTrigger, Cue};
use crate::binder::RenderBinder;
use crate::consts::{ACTOR_HEIGHT, ACTOR_WIDTH};
use crate::easing::Ease;
use crate::error::{ConfigError, ConfigResult};
use crate::settings::EngineSettings;

/// Section element ids, top to bottom
pub const HERO: NodeId = "hero";
pub const STRATOSPHERE: NodeId = "stratosphere";
pub const SPACE: NodeId = "space";
pub const UFO: NodeId = "ufo";
pub const DOCKING: NodeId = "docking";
pub const SECTIONS: [NodeId; 5] = [HERO, STRATOSPHERE, SPACE, UFO, DOCKING];

const STRATO_CLOUDS: [NodeId; 5] = [
    "strato-cloud-0",
    "strato-cloud-1",
    "strato-cloud-2",
    "strato-cloud-3",
    "strato-cloud-4",
];

/// Problem clouds; the label length sizes the cloud
const PROBLEMS: [(NodeId, &str); 10] = [
    ("problem-cloud-0", "Cross-Browser Compatibility"),
    ("problem-cloud-1", "Mobile Responsiveness"),
    ("problem-cloud-2", "Page Load Speed"),
    ("problem-cloud-3", "SEO Optimization"),
    ("problem-cloud-4", "Accessibility"),
    ("problem-cloud-5", "Browser Caching"),
    ("problem-cloud-6", "JavaScript Errors"),
    ("problem-cloud-7", "Security Vulnerabilities"),
    ("problem-cloud-8", "CSS Specificity"),
    ("problem-cloud-9", "Browser Rendering"),
];

const SOLUTION_CARDS: [NodeId; 4] = [
    "solution-card-0",
    "solution-card-1",
    "solution-card-2",
    "solution-card-3",
];

/// Section heights in viewport heights
const TALL_SECTION: f32 = 1.5;

fn actor_box(center: Vec2) -> Rect {
    Rect::from_center(center, Vec2::new(ACTOR_WIDTH, ACTOR_HEIGHT))
}

/// Timeline fraction from a run of durations (seconds of the authored tween)
fn at(elapsed: f32, total: f32) -> f32 {
    elapsed / total
}

/// Countdown, then the rocket rises into view and climbs
pub fn hero(viewport: Vec2) -> ConfigResult<SectionDef> {
    const ROCKET: NodeId = "hero-rocket";
    const COUNTDOWN: NodeId = "countdown";
    let total = 4.5;

    Ok(SectionDef {
        name: "hero",
        trigger: HERO,
        window: ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(1.0))?,
        phases: vec![
            Phase::new("countdown-in", 0.0, at(1.0, total)).track(
                COUNTDOWN,
                Motion::tween(
                    Pose::IDENTITY.with_opacity(0.0).with_scale(2.0),
                    Pose::IDENTITY,
                    Ease::Power1InOut,
                ),
            ),
            Phase::new("countdown-out", at(1.0, total), at(1.5, total)).track(
                COUNTDOWN,
                Motion::tween(
                    Pose::IDENTITY,
                    Pose::at(0.0, -50.0).with_opacity(0.0),
                    Ease::Power1InOut,
                ),
            ),
            Phase::new("liftoff", at(1.5, total), at(2.5, total))
                .track(
                    ROCKET,
                    Motion::tween(
                        Pose::at(0.0, 100.0).with_opacity(0.0),
                        Pose::IDENTITY,
                        Ease::SineOut,
                    ),
                )
                .effect(PhaseEffect::Cue(Cue::Launch))
                .effect(PhaseEffect::Flag(StoryFlag::Ignition))
                .effect(PhaseEffect::Burst(BurstPreset::Exhaust)),
            Phase::new("ascent", at(2.5, total), 1.0).track(
                ROCKET,
                Motion::tween(Pose::IDENTITY, Pose::at(0.0, -200.0), Ease::SineOut),
            ),
        ],
        actor: ROCKET,
        actor_base: actor_box(Vec2::new(viewport.x / 2.0, viewport.y * 0.7)),
        obstacles: None,
        parallax: Vec::new(),
    })
}

/// Rocket buffets while cloud banks slide past at different depths
pub fn stratosphere(viewport: Vec2) -> ConfigResult<SectionDef> {
    const ROCKET: NodeId = "strato-rocket";

    let parallax = STRATO_CLOUDS
        .iter()
        .enumerate()
        .map(|(i, &cloud)| {
            let x = if i % 2 == 0 { 20.0 } else { -20.0 };
            let y = (i + 1) as f32 * 50.0;
            ParallaxLayer::new(
                cloud,
                STRATOSPHERE,
                ScrollWindow::full_pass(),
                Motion::tween(Pose::IDENTITY, Pose::at(x, y), Ease::Linear),
            )
        })
        .collect();

    Ok(SectionDef {
        name: "stratosphere",
        trigger: STRATOSPHERE,
        window: ScrollWindow::full_pass(),
        phases: vec![Phase::new("buffeting", 0.0, 1.0).track(
            ROCKET,
            Motion::Shake {
                base: Pose::IDENTITY,
                amplitude: Vec2::new(2.0, 2.0),
                // 0.1s each way
                frequency_hz: 5.0,
            },
        )],
        actor: ROCKET,
        actor_base: actor_box(Vec2::new(viewport.x / 2.0, viewport.y * TALL_SECTION / 2.0)),
        obstacles: None,
        parallax,
    })
}

/// Drifting problem clouds laid out on a 3 x 4 grid
pub fn problem_clouds(viewport: Vec2) -> ObstacleField {
    let height = viewport.y * TALL_SECTION;
    let clouds = PROBLEMS
        .iter()
        .enumerate()
        .map(|(i, &(node, label))| {
            let len = label.len() as f32;
            let size = Vec2::new((len * 10.0).max(180.0), (len * 5.0).max(120.0));
            let left = ((i % 3) as f32 * 30.0 + 15.0) / 100.0 * viewport.x;
            let top = ((i % 4) as f32 * 22.0 + 10.0) / 100.0 * height;
            let cloud = DriftingObstacle {
                id: i as u32,
                base: Rect::from_xywh(left, top, size.x, size.y),
                amplitude: Vec2::new(
                    if i % 2 == 0 { 20.0 } else { -20.0 },
                    if i % 3 == 0 { 15.0 } else { -15.0 },
                ),
                // Yoyo of 3 + i seconds each way
                period_secs: 2.0 * (3.0 + i as f32),
            };
            (node, cloud)
        })
        .collect();
    ObstacleField { clouds }
}

/// Zigzag flight path through the problem clouds
pub fn space(viewport: Vec2) -> ConfigResult<SectionDef> {
    const ROCKET: NodeId = "space-rocket";

    Ok(SectionDef {
        name: "space",
        trigger: SPACE,
        window: ScrollWindow::full_pass(),
        phases: vec![Phase::new("zigzag", 0.0, 1.0).track(
            ROCKET,
            Motion::Path {
                base: Pose::IDENTITY,
                waypoints: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(200.0, -50.0),
                    Vec2::new(-200.0, -100.0),
                    Vec2::new(150.0, -150.0),
                    Vec2::new(-150.0, -200.0),
                    Vec2::new(0.0, -250.0),
                ],
                ease: Ease::Power1InOut,
            },
        )],
        actor: ROCKET,
        actor_base: actor_box(Vec2::new(viewport.x / 2.0, viewport.y * TALL_SECTION / 2.0)),
        obstacles: Some(Box::new(problem_clouds(viewport))),
        parallax: Vec::new(),
    })
}

/// UFO slides in, beams the rocket up, rescue cards appear, UFO leaves
pub fn ufo(viewport: Vec2) -> ConfigResult<SectionDef> {
    const ROCKET: NodeId = "ufo-rocket";
    const SAUCER: NodeId = "ufo-saucer";
    const BEAM: NodeId = "ufo-beam";
    // w-48
    const SAUCER_WIDTH: f32 = 192.0;
    let total = 7.0;

    let parallax = SOLUTION_CARDS
        .iter()
        .enumerate()
        .map(|(i, &card)| {
            let rotation = if i % 2 == 0 { 5.0 } else { -5.0 };
            ParallaxLayer::new(
                card,
                UFO,
                ScrollWindow::full_pass(),
                Motion::tween(
                    Pose::IDENTITY,
                    Pose::at(0.0, 30.0).with_rotation(rotation).with_scale(1.05),
                    Ease::Linear,
                ),
            )
        })
        .collect();

    Ok(SectionDef {
        name: "ufo",
        trigger: UFO,
        window: ScrollWindow::new(Anchor::TOP_TOP, WindowEnd::Relative(1.0))?,
        phases: vec![
            Phase::new("arrive", 0.0, at(2.0, total))
                .track(
                    SAUCER,
                    Motion::tween(Pose::at(SAUCER_WIDTH, 0.0), Pose::IDENTITY, Ease::Power1InOut),
                )
                .track(ROCKET, Motion::Hold(Pose::IDENTITY))
                .effect(PhaseEffect::Cue(Cue::UfoScan)),
            Phase::new("beam", at(2.0, total), at(3.0, total))
                .track(
                    BEAM,
                    Motion::tween(
                        Pose::IDENTITY.with_scale(0.0).with_opacity(0.0),
                        Pose::IDENTITY.with_opacity(0.7),
                        Ease::Power1InOut,
                    ),
                )
                .effect(PhaseEffect::Flag(StoryFlag::TractorBeam)),
            Phase::new("abduct", at(3.0, total), at(4.0, total)).track(
                ROCKET,
                Motion::tween(Pose::IDENTITY, Pose::at(0.0, -100.0), Ease::Power1InOut),
            ),
            Phase::new("rescue", at(4.0, total), at(5.0, total))
                .track(ROCKET, Motion::Hold(Pose::at(0.0, -100.0)))
                .effect(PhaseEffect::Flag(StoryFlag::SolutionsShown)),
            Phase::new("depart", at(5.0, total), 1.0).track(
                SAUCER,
                Motion::tween(
                    Pose::IDENTITY,
                    Pose::at(-SAUCER_WIDTH, -150.0),
                    Ease::Power1InOut,
                ),
            ),
        ],
        actor: ROCKET,
        actor_base: actor_box(viewport / 2.0),
        obstacles: None,
        parallax,
    })
}

/// Orient, approach, align, final approach, hard dock
pub fn docking(viewport: Vec2) -> ConfigResult<SectionDef> {
    const ROCKET: NodeId = "docking-rocket";
    const THRUSTER: NodeId = "rocket-thruster";
    const SUCCESS: NodeId = "success-message";
    const STATUS: NodeId = "system-status";
    let total = 13.0;

    // Rocket starts nose-left (-rotate-90)
    let start = Pose::IDENTITY.with_rotation(-90.0);
    let upright = Pose::IDENTITY;
    let approached = Pose::at(80.0, -20.0);
    let aligned = Pose::at(130.0, -10.0).with_rotation(90.0);
    let docked = Pose::at(250.0, -10.0).with_rotation(90.0);
    let thruster_idle = Pose::IDENTITY.with_scale(0.8).with_opacity(0.6);
    let hidden = Pose::IDENTITY.with_opacity(0.0);

    Ok(SectionDef {
        name: "docking",
        trigger: DOCKING,
        window: ScrollWindow::new(Anchor::TOP_CENTER, WindowEnd::Anchor(Anchor::BOTTOM_CENTER))?,
        phases: vec![
            Phase::new("orient", 0.0, at(2.0, total))
                .track(ROCKET, Motion::tween(start, upright, Ease::Power2InOut))
                .effect(PhaseEffect::Cue(Cue::Docking))
                .effect(PhaseEffect::Indicator(StoryFlag::ApproachIndicator)),
            Phase::new("approach", at(2.0, total), at(4.0, total))
                .track(ROCKET, Motion::tween(upright, approached, Ease::Power1InOut))
                .effect(PhaseEffect::Flag(StoryFlag::DockingThrusters))
                .effect(PhaseEffect::Indicator(StoryFlag::ApproachIndicator)),
            Phase::new("align", at(4.0, total), at(6.0, total))
                .track(ROCKET, Motion::tween(approached, aligned, Ease::Power2InOut))
                .effect(PhaseEffect::Indicator(StoryFlag::AlignmentIndicator)),
            Phase::new("thrust-up", at(6.0, total), at(7.0, total))
                .track(ROCKET, Motion::Hold(aligned))
                .effect(PhaseEffect::Indicator(StoryFlag::AlignmentIndicator))
                .track(
                    THRUSTER,
                    Motion::tween(
                        thruster_idle,
                        Pose::IDENTITY.with_scale(1.2).with_opacity(0.9),
                        Ease::Linear,
                    ),
                ),
            Phase::new("final-approach", at(7.0, total), at(10.0, total))
                .track(ROCKET, Motion::tween(aligned, docked, Ease::Power1InOut))
                .effect(PhaseEffect::Indicator(StoryFlag::FinalApproachIndicator)),
            Phase::new("thrust-down", at(10.0, total), at(11.0, total)).track(
                THRUSTER,
                Motion::tween(
                    Pose::IDENTITY.with_scale(1.2).with_opacity(0.9),
                    Pose::IDENTITY.with_scale(0.6).with_opacity(0.2),
                    Ease::Linear,
                ),
            ),
            Phase::new("success", at(11.0, total), at(12.0, total))
                .track(
                    SUCCESS,
                    Motion::tween(
                        hidden,
                        Pose::at(0.0, -20.0).with_scale(1.1),
                        Ease::BackOut,
                    ),
                )
                .effect(PhaseEffect::Flag(StoryFlag::Docked))
                .effect(PhaseEffect::Burst(BurstPreset::Twinkle)),
            Phase::new("status", at(12.0, total), 1.0).track(
                STATUS,
                Motion::tween(hidden, Pose::at(0.0, -15.0), Ease::Power1InOut),
            ),
        ],
        actor: ROCKET,
        actor_base: actor_box(Vec2::new(viewport.x / 4.0, viewport.y / 2.0)),
        obstacles: None,
        parallax: Vec::new(),
    })
}

/// All section definitions, top to bottom
pub fn definitions(viewport: Vec2) -> ConfigResult<Vec<SectionDef>> {
    ConfigError::check_range("viewport.width", viewport.x, 1.0, f32::MAX)?;
    ConfigError::check_range("viewport.height", viewport.y, 1.0, f32::MAX)?;
    Ok(vec![
        hero(viewport)?,
        stratosphere(viewport)?,
        space(viewport)?,
        ufo(viewport)?,
        docking(viewport)?,
    ])
}

/// Every section of the page, mounted together
pub struct Story {
    sections: Vec<Section>,
}

impl Story {
    /// Validate settings, mount every section and start the ambient drone
    pub fn mount(
        settings: &EngineSettings,
        viewport: Vec2,
        audio: &mut dyn AudioTrigger,
    ) -> ConfigResult<Self> {
        settings.validate()?;
        let sections = definitions(viewport)?
            .into_iter()
            .map(|def| Section::mount(def, settings))
            .collect::<ConfigResult<Vec<_>>>()?;
        audio.play(Cue::Ambient);
        log::info!(
            "Story mounted: {} sections, quality {}",
            sections.len(),
            settings.quality.as_str()
        );
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name() == name)
    }

    /// Flags raised anywhere in the story
    pub fn flags(&self) -> StoryFlags {
        let mut all = StoryFlags::default();
        for flag in self.sections.iter().flat_map(|s| s.flags().iter()) {
            all.set(flag);
        }
        all
    }

    pub fn live_particles(&self) -> usize {
        self.sections.iter().map(|s| s.pool().live_count()).sum()
    }

    /// One frame for every section, top to bottom
    pub fn frame(
        &mut self,
        input: &FrameInput,
        layout: &dyn PageLayout,
        audio: &mut dyn AudioTrigger,
        binder: &mut dyn RenderBinder,
    ) -> Vec<FrameReport> {
        self.sections
            .iter_mut()
            .map(|s| s.frame(input, layout, audio, binder))
            .collect()
    }

    pub fn unmount(&mut self, binder: &mut dyn RenderBinder) {
        for section in &mut self.sections {
            section.unmount(binder);
        }
        log::info!("Story unmounted");
    }

    /// Restore after `unmount`; the ambient drone starts again
    pub fn remount(&mut self, audio: &mut dyn AudioTrigger) -> ConfigResult<()> {
        for section in &mut self.sections {
            section.remount()?;
        }
        audio.play(Cue::Ambient);
        Ok(())
    }
}

/// The story's sections stacked in document order with a one-screen footer.
///
/// A page layout reader for headless runs: no element moves except by scrolling.
#[derive(Debug, Clone, Copy)]
pub struct StackedPage {
    pub viewport: Vec2,
    pub scroll_y: f32,
}

impl StackedPage {
    pub fn new(viewport: Vec2, scroll_y: f32) -> Self {
        Self { viewport, scroll_y }
    }

    fn heights(viewport: Vec2) -> [(NodeId, f32); 5] {
        let h = viewport.y;
        [
            (HERO, h),
            (STRATOSPHERE, h * TALL_SECTION),
            (SPACE, h * TALL_SECTION),
            (UFO, h),
            (DOCKING, h),
        ]
    }

    /// Largest scroll offset; the footer fills the last screen
    pub fn max_scroll(viewport: Vec2) -> f32 {
        Self::heights(viewport).iter().map(|(_, h)| h).sum()
    }
}

impl PageLayout for StackedPage {
    fn viewport(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_y: self.scroll_y,
            viewport_height: self.viewport.y,
        }
    }

    fn rect(&self, node: NodeId) -> Option<Rect> {
        let mut doc_top = 0.0;
        for (id, height) in Self::heights(self.viewport) {
            if id == node {
                return Some(Rect::from_xywh(
                    0.0,
                    doc_top - self.scroll_y,
                    self.viewport.x,
                    height,
                ));
            }
            doc_top += height;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CueLog;
    use crate::binder::RecordingBinder;
    use crate::engine::collision::ObstacleProvider;

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 800.0);

    struct Run {
        story: Story,
        audio: CueLog,
        binder: RecordingBinder,
        time: f32,
    }

    impl Run {
        fn new() -> Self {
            let mut audio = CueLog::default();
            let story = Story::mount(&EngineSettings::default(), VIEWPORT, &mut audio).unwrap();
            Self {
                story,
                audio,
                binder: RecordingBinder::default(),
                time: 0.0,
            }
        }

        fn frame(&mut self, scroll_y: f32) {
            let dt = crate::consts::FRAME_DT;
            self.time += dt;
            let input = FrameInput {
                time_secs: self.time,
                dt,
            };
            self.story.frame(
                &input,
                &StackedPage::new(VIEWPORT, scroll_y),
                &mut self.audio,
                &mut self.binder,
            );
        }

        fn sweep(&mut self, from: f32, to: f32, step: f32) {
            let steps = ((to - from).abs() / step).ceil() as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                self.frame(from + (to - from) * t);
            }
        }
    }

    #[test]
    fn test_definitions_mount() {
        let settings = EngineSettings::default();
        for def in definitions(VIEWPORT).unwrap() {
            let name = def.name;
            assert!(Section::mount(def, &settings).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_bad_viewport_rejected() {
        assert!(definitions(Vec2::new(0.0, 800.0)).is_err());
        assert!(definitions(Vec2::new(1280.0, f32::NAN)).is_err());
    }

    #[test]
    fn test_problem_cloud_layout() {
        let field = problem_clouds(VIEWPORT);
        assert_eq!(field.clouds.len(), PROBLEMS.len());
        let obstacles = field.obstacles(0.0);
        // "Cross-Browser Compatibility" is 27 chars wide
        assert_eq!(obstacles[0].bounds.width(), 270.0);
        assert_eq!(obstacles[0].bounds.height(), 135.0);
        // "Accessibility" falls back to the minimum size
        assert_eq!(obstacles[4].bounds.width(), 180.0);
        assert_eq!(obstacles[4].bounds.height(), 120.0);
    }

    #[test]
    fn test_ambient_plays_once_on_mount() {
        let mut run = Run::new();
        run.frame(0.0);
        run.frame(10.0);
        assert_eq!(run.audio.played.first(), Some(&Cue::Ambient));
        assert_eq!(run.audio.count(Cue::Ambient), 1);
    }

    #[test]
    fn test_full_scroll_tells_the_story() {
        let mut run = Run::new();
        let bottom = StackedPage::max_scroll(VIEWPORT);
        run.sweep(0.0, bottom, 12.0);

        assert!(run.audio.count(Cue::Launch) >= 1);
        assert!(run.audio.count(Cue::UfoScan) >= 1);
        assert!(run.audio.count(Cue::Docking) >= 1);
        assert_eq!(run.audio.count(Cue::Ambient), 1);

        let flags = run.story.flags();
        assert!(flags.contains(StoryFlag::Docked));
        assert!(flags.contains(StoryFlag::SolutionsShown));
        assert_eq!(run.binder.flags, flags);
        for section in run.story.sections() {
            assert_eq!(section.progress(), 1.0, "{}", section.name());
        }

        let docking = run.story.section("docking").unwrap();
        let rocket = run.binder.node("docking-rocket").unwrap();
        assert_eq!(rocket.rotation, 90.0);
        assert!((rocket.offset - Vec2::new(250.0, -10.0)).length() < 1e-3);
        assert!(docking.pool().totals().0 >= BurstPreset::Twinkle.default_count() as u64);
    }

    #[test]
    fn test_loaded_at_bottom_matches_full_scroll() {
        let bottom = StackedPage::max_scroll(VIEWPORT);
        let mut scrolled = Run::new();
        scrolled.sweep(0.0, bottom, 12.0);

        let mut loaded = Run::new();
        loaded.frame(bottom);
        let flags = loaded.story.flags();
        assert!(flags.contains(StoryFlag::Docked));
        assert!(flags.contains(StoryFlag::SolutionsShown));
        assert_eq!(flags, scrolled.story.flags());
        assert_eq!(loaded.binder.flags, flags);

        // Nothing replays for the sections scrolled past before loading
        assert_eq!(loaded.audio.played, vec![Cue::Ambient]);
        let docking = loaded.story.section("docking").unwrap();
        assert_eq!(docking.pool().totals().0, 0);
        let rocket = loaded.binder.node("docking-rocket").unwrap();
        assert_eq!(rocket.rotation, 90.0);
    }

    #[test]
    fn test_docking_indicators_follow_the_step() {
        const INDICATORS: [StoryFlag; 3] = [
            StoryFlag::ApproachIndicator,
            StoryFlag::AlignmentIndicator,
            StoryFlag::FinalApproachIndicator,
        ];
        let bottom = StackedPage::max_scroll(VIEWPORT);
        let docking_top = bottom - VIEWPORT.y;
        let at_step = |step: f32| docking_top - VIEWPORT.y / 2.0 + VIEWPORT.y * step / 13.0;
        let raised = |run: &Run| -> Vec<StoryFlag> {
            INDICATORS
                .into_iter()
                .filter(|f| run.binder.flags.contains(*f))
                .collect()
        };

        let mut run = Run::new();
        run.sweep(0.0, at_step(1.0), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::ApproachIndicator]);
        run.sweep(at_step(1.0), at_step(3.0), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::ApproachIndicator]);
        run.sweep(at_step(3.0), at_step(5.0), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::AlignmentIndicator]);
        run.sweep(at_step(5.0), at_step(6.5), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::AlignmentIndicator]);
        run.sweep(at_step(6.5), at_step(8.5), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::FinalApproachIndicator]);
        assert!(!run.binder.flags.contains(StoryFlag::Docked));

        run.sweep(at_step(8.5), bottom, 12.0);
        assert!(raised(&run).is_empty());
        assert!(run.binder.flags.contains(StoryFlag::Docked));
        assert!(run.binder.flags.contains(StoryFlag::DockingThrusters));

        // Back up into alignment
        run.sweep(bottom, at_step(5.0), 12.0);
        assert_eq!(raised(&run), vec![StoryFlag::AlignmentIndicator]);
        assert!(!run.binder.flags.contains(StoryFlag::Docked));
        assert_eq!(run.binder.flags, run.story.flags());
    }

    #[test]
    fn test_scrolling_back_rewinds_flags() {
        let mut run = Run::new();
        let bottom = StackedPage::max_scroll(VIEWPORT);
        run.sweep(0.0, bottom, 12.0);
        run.sweep(bottom, 0.0, 12.0);

        assert!(run.story.flags().is_empty());
        assert!(run.binder.flags.is_empty());
        let rocket = run.binder.node("hero-rocket").unwrap();
        assert_eq!(rocket.opacity, 0.0);
    }

    #[test]
    fn test_particles_bounded_and_released_on_unmount() {
        let mut run = Run::new();
        let bottom = StackedPage::max_scroll(VIEWPORT);
        run.sweep(0.0, bottom, 8.0);
        run.sweep(bottom, 0.0, 8.0);

        for section in run.story.sections() {
            assert!(section.pool().live_count() <= section.pool().capacity());
        }
        assert_eq!(run.binder.live_particles(), run.story.live_particles());

        run.story.unmount(&mut run.binder);
        assert_eq!(run.story.live_particles(), 0);
        assert!(run.binder.latest.is_empty());
        assert!(run.binder.flags.is_empty());
        for section in run.story.sections() {
            let (spawned, released, _) = section.pool().totals();
            assert_eq!(spawned, released, "{}", section.name());
        }
    }

    #[test]
    fn test_reduced_motion_is_still_and_particle_free() {
        let settings = EngineSettings {
            reduced_motion: true,
            ..EngineSettings::default()
        };
        let mut audio = crate::audio::SilentAudio;
        let mut binder = RecordingBinder::default();
        let mut story = Story::mount(&settings, VIEWPORT, &mut audio).unwrap();
        let bottom = StackedPage::max_scroll(VIEWPORT);

        // Same scroll position at different times gives the same poses
        let mut snapshots = Vec::new();
        for time_secs in [0.5, 1.7] {
            let input = FrameInput {
                time_secs,
                dt: crate::consts::FRAME_DT,
            };
            story.frame(&input, &StackedPage::new(VIEWPORT, bottom * 0.3), &mut audio, &mut binder);
            snapshots.push(binder.latest.clone());
        }
        assert_eq!(snapshots[0], snapshots[1]);
        assert_eq!(story.live_particles(), 0);
        assert!(story.sections().iter().all(|s| s.pool().stream_count() == 0));
    }

    #[test]
    fn test_remount_restarts_ambient() {
        let mut run = Run::new();
        run.frame(0.0);
        run.story.unmount(&mut run.binder);
        run.story.remount(&mut run.audio).unwrap();
        assert_eq!(run.audio.count(Cue::Ambient), 2);
        assert!(run.story.sections().iter().all(|s| s.is_mounted()));
    }
}
