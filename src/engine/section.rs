//! One mounted story section
//!
//! A section owns everything that animates while it is mounted: its progress
//! source, timeline, detector, particle pool with its streams, and parallax
//! layers. Each frame runs a strict read-then-react pipeline:
//!
//! 1. read layout and measure progress (section and parallax layers)
//! 2. advance the timeline and compute target poses
//! 3. run the detector on the actor's planned box and apply the dodge
//! 4. fire phase effects (cues, flags, entry bursts) and impact bursts
//! 5. gate the exhaust stream on actor speed and tick particles
//! 6. hand every value to the render binder
//!
//! Unmounting cancels the whole scope at once.

use glam::Vec2;

use super::NodeId;
use super::collision::{CollisionDetector, CollisionEvent, ObstacleProvider};
use super::geometry::{Pose, Rect};
use super::particles::{BurstPreset, EmitterOrigin, ParticlePool, StreamId};
use super::progress::{Measurement, ProgressSource, ScrollMetrics, ScrollWindow};
use super::timeline::{
    Direction, Motion, Phase, PhaseEffect, PhaseEvent, StoryFlag, StoryFlags, Timeline,
};
use crate::audio::AudioTrigger;
use crate::binder::{RenderBinder, RenderFrame, TargetId};
use crate::consts::MAX_FRAME_DT;
use crate::error::{ConfigError, ConfigResult};
use crate::settings::EngineSettings;

/// Smoothing applied to the measured actor speed each frame
const SPEED_SMOOTHING: f32 = 0.2;

/// Timeline position while the scroll is above the section's window
const BEFORE_START: f32 = -1.0;

/// Synchronous layout queries, answered by the platform
pub trait PageLayout {
    fn viewport(&self) -> ScrollMetrics;

    /// Viewport-relative box of a node; `None` if it is not in the page
    fn rect(&self, node: NodeId) -> Option<Rect>;
}

/// Per-frame timing
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Seconds since the story was mounted (drives shakes and drifting clouds)
    pub time_secs: f32,
    /// Seconds since the previous frame
    pub dt: f32,
}

/// What happened during one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub progress: Measurement,
    pub events: Vec<PhaseEvent>,
    pub collisions: Vec<CollisionEvent>,
}

/// An element moved linearly by its own scroll progress (clouds, cards)
#[derive(Debug, Clone)]
pub struct ParallaxLayer {
    pub target: NodeId,
    /// Element whose travel through the viewport drives the layer
    pub trigger: NodeId,
    pub motion: Motion,
    source: ProgressSource,
}

impl ParallaxLayer {
    pub fn new(target: NodeId, trigger: NodeId, window: ScrollWindow, motion: Motion) -> Self {
        Self {
            target,
            trigger,
            motion,
            source: ProgressSource::new(window),
        }
    }

    pub fn progress(&self) -> f32 {
        self.source.last()
    }
}

/// Static description of a section, turned into a [`Section`] by `mount`
pub struct SectionDef {
    pub name: &'static str,
    /// Element whose scroll window drives the timeline
    pub trigger: NodeId,
    pub window: ScrollWindow,
    pub phases: Vec<Phase>,
    /// Target the detector and emitters follow
    pub actor: NodeId,
    /// Actor's box at the identity pose, in section coordinates
    pub actor_base: Rect,
    pub obstacles: Option<Box<dyn ObstacleProvider>>,
    pub parallax: Vec<ParallaxLayer>,
}

pub struct Section {
    name: &'static str,
    trigger: NodeId,
    source: ProgressSource,
    timeline: Timeline,
    actor: NodeId,
    actor_base: Rect,
    detector: Option<(CollisionDetector, Box<dyn ObstacleProvider>)>,
    parallax: Vec<ParallaxLayer>,
    pool: ParticlePool,
    exhaust: Option<StreamId>,
    /// Raised on entry, lowered on backward exit
    flags: StoryFlags,
    /// Raised while their phase is active
    indicators: StoryFlags,
    /// No fresh measurement yet since mounting
    catching_up: bool,
    last_actor_center: Option<Vec2>,
    speed: f32,
    mounted: bool,

    particles_enabled: bool,
    reduced_motion: bool,
    exhaust_rate_hz: f32,
    exhaust_speed_threshold: f32,
    impact_burst: usize,
}

impl Section {
    /// Validate the definition and allocate the section's resources
    pub fn mount(def: SectionDef, settings: &EngineSettings) -> ConfigResult<Self> {
        let timeline = Timeline::new(def.phases)?;
        if !timeline.targets().contains(&def.actor) {
            return Err(ConfigError::MissingActor {
                section: def.name,
                actor: def.actor,
            });
        }

        let detector = match def.obstacles {
            Some(provider) => Some((CollisionDetector::new(settings.detector)?, provider)),
            None => None,
        };
        let pool = ParticlePool::new(
            settings.max_particles(),
            section_seed(settings.seed, def.name),
        )?;

        let mut section = Self {
            name: def.name,
            trigger: def.trigger,
            source: ProgressSource::new(def.window),
            timeline,
            actor: def.actor,
            actor_base: def.actor_base,
            detector,
            parallax: def.parallax,
            pool,
            exhaust: None,
            flags: StoryFlags::default(),
            indicators: StoryFlags::default(),
            catching_up: true,
            last_actor_center: None,
            speed: 0.0,
            mounted: false,
            particles_enabled: settings.effective_particles(),
            reduced_motion: settings.reduced_motion,
            exhaust_rate_hz: settings.exhaust_rate_hz,
            exhaust_speed_threshold: settings.exhaust_speed_threshold,
            impact_burst: settings.impact_burst,
        };
        section.start()?;
        Ok(section)
    }

    fn start(&mut self) -> ConfigResult<()> {
        // Scrolling in from above the window, however far the page has
        // already been scrolled when the first measurement comes in
        self.timeline.update(BEFORE_START);
        self.catching_up = true;
        if self.particles_enabled {
            let stream = self.pool.start_stream(
                EmitterOrigin::Node(self.actor),
                BurstPreset::Exhaust.params(),
                self.exhaust_rate_hz,
            )?;
            self.exhaust = Some(stream);
        }
        self.mounted = true;
        log::info!(
            "Mounted section '{}' ({} phases, {} targets)",
            self.name,
            self.timeline.phases().len(),
            self.timeline.targets().len()
        );
        Ok(())
    }

    /// Mount again after `unmount` (page restored from the back/forward cache)
    pub fn remount(&mut self) -> ConfigResult<()> {
        if self.mounted {
            return Ok(());
        }
        self.start()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Last good progress value
    pub fn progress(&self) -> f32 {
        self.source.last()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Raised flags, latched and indicator
    pub fn flags(&self) -> StoryFlags {
        self.flags.union(self.indicators)
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn actor(&self) -> NodeId {
        self.actor
    }

    /// Run one frame of the pipeline. A no-op once unmounted.
    pub fn frame(
        &mut self,
        input: &FrameInput,
        layout: &dyn PageLayout,
        audio: &mut dyn AudioTrigger,
        binder: &mut dyn RenderBinder,
    ) -> FrameReport {
        if !self.mounted {
            return FrameReport {
                progress: Measurement::Stale(self.source.last()),
                events: Vec::new(),
                collisions: Vec::new(),
            };
        }

        let dt = input.dt.clamp(0.0, MAX_FRAME_DT);
        // Reduced motion freezes shakes and cloud drift
        let time = if self.reduced_motion {
            0.0
        } else {
            input.time_secs
        };

        // Read
        let viewport = layout.viewport();
        let measurement = self
            .source
            .measure(&viewport, layout.rect(self.trigger).as_ref());
        for layer in &mut self.parallax {
            layer
                .source
                .measure(&viewport, layout.rect(layer.trigger).as_ref());
        }
        let progress = measurement.value();
        // Above the window the timeline sits ahead of its first phase, so that
        // phase is entered when the window opens and left when scrolling back
        let position = if self.source.before_start() {
            BEFORE_START
        } else {
            progress
        };

        // Timeline
        let events = self.timeline.update(position);
        let mut poses = self.timeline.poses(position, time);

        // Detector
        let mut collisions = Vec::new();
        let mut actor_box = None;
        if let Some(i) = poses.iter().position(|(node, _)| *node == self.actor) {
            let planned = poses[i].1.apply_to(&self.actor_base);
            let mut resolved = planned;
            if let Some((detector, provider)) = self.detector.as_mut() {
                let obstacles = provider.obstacles(time);
                let report = detector.check(&planned, &obstacles);
                let pose = &mut poses[i].1;
                pose.offset.x += report.avoidance.dx;
                pose.rotation += report.avoidance.rotation;
                resolved = planned.translate(Vec2::new(report.avoidance.dx, 0.0));
                collisions = report.events;
            }
            actor_box = Some(resolved);
        }

        // Phase effects. On the first fresh frame the timeline catches up
        // from above the window: phases only passed through raise their
        // flags, and only the landing phase plays cues and bursts.
        let catching_up = self.catching_up;
        if measurement.is_fresh() {
            self.catching_up = false;
        }
        let raised_before = self.flags();
        let active = self.timeline.active();
        let emit_at = actor_box.map(|b| b.bottom_center());
        for event in &events {
            match *event {
                PhaseEvent::Enter { phase, direction } => {
                    let passed_through = catching_up && active != Some(phase);
                    for effect in &self.timeline.phase(phase).effects {
                        match *effect {
                            PhaseEffect::Flag(flag) => self.flags.set(flag),
                            PhaseEffect::Indicator(_) => {}
                            _ if passed_through => {}
                            PhaseEffect::Cue(cue) => audio.play(cue),
                            PhaseEffect::Burst(preset) => {
                                if direction == Direction::Forward && self.particles_enabled {
                                    if let Some(origin) = emit_at {
                                        let burst = self.pool.burst(
                                            origin,
                                            &preset.params(),
                                            preset.default_count(),
                                        );
                                        if let Err(e) = burst {
                                            log::warn!(
                                                "Section '{}': {:?} burst skipped: {}",
                                                self.name,
                                                preset,
                                                e
                                            );
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                PhaseEvent::Leave {
                    phase,
                    direction: Direction::Backward,
                } => {
                    for effect in &self.timeline.phase(phase).effects {
                        if let PhaseEffect::Flag(flag) = *effect {
                            self.flags.clear(flag);
                        }
                    }
                }
                PhaseEvent::Leave { .. } => {}
            }
        }
        self.indicators = StoryFlags::default();
        if let Some(i) = active {
            for effect in &self.timeline.phase(i).effects {
                if let PhaseEffect::Indicator(flag) = *effect {
                    self.indicators.set(flag);
                }
            }
        }
        let raised = self.flags();
        for flag in StoryFlag::ALL {
            if raised.contains(flag) != raised_before.contains(flag) {
                binder.flag(flag, raised.contains(flag));
            }
        }

        if self.particles_enabled {
            for event in &collisions {
                if let CollisionEvent::Impact { point, .. } = *event {
                    let burst =
                        self.pool
                            .burst(point, &BurstPreset::Impact.params(), self.impact_burst);
                    if let Err(e) = burst {
                        log::warn!("Section '{}': impact burst skipped: {}", self.name, e);
                    }
                }
            }
        }

        // Exhaust gating
        let center = actor_box.map(|b| b.center());
        let instant = match (center, self.last_actor_center) {
            (Some(now), Some(before)) if dt > 0.0 => (now - before).length() / dt,
            _ => 0.0,
        };
        self.speed += (instant - self.speed) * SPEED_SMOOTHING;
        self.last_actor_center = center;
        if let Some(stream) = self.exhaust {
            self.pool
                .set_stream_active(stream, self.speed > self.exhaust_speed_threshold);
        }

        // Particles
        let actor = self.actor;
        let released = self
            .pool
            .tick(dt, |node| if node == actor { emit_at } else { None });
        for (id, kind) in released {
            binder.release(&TargetId::Particle {
                section: self.name,
                id,
                kind,
            });
        }

        // Bind
        for (node, pose) in &poses {
            binder.apply(&RenderFrame {
                target: TargetId::Node(*node),
                pose: *pose,
            });
        }
        if let Some((_, provider)) = &self.detector {
            for (node, pose) in provider.poses(time) {
                binder.apply(&RenderFrame {
                    target: TargetId::Node(node),
                    pose,
                });
            }
        }
        for layer in &self.parallax {
            binder.apply(&RenderFrame {
                target: TargetId::Node(layer.target),
                pose: layer.motion.rest(layer.progress()),
            });
        }
        for (id, particle) in self.pool.live() {
            binder.apply(&RenderFrame {
                target: TargetId::Particle {
                    section: self.name,
                    id,
                    kind: particle.kind,
                },
                pose: Pose {
                    offset: particle.pos,
                    rotation: 0.0,
                    scale: particle.scale(),
                    opacity: particle.opacity(),
                },
            });
        }

        log::trace!(
            "Section '{}' progress {:.3} speed {:.0} particles {}",
            self.name,
            progress,
            self.speed,
            self.pool.live_count()
        );

        FrameReport {
            progress: measurement,
            events,
            collisions,
        }
    }

    /// Tear down: release every particle, cancel streams, lower flags and
    /// hand every node back. Later frames do nothing until `remount`.
    pub fn unmount(&mut self, binder: &mut dyn RenderBinder) {
        if !self.mounted {
            return;
        }
        for (id, kind) in self.pool.clear() {
            binder.release(&TargetId::Particle {
                section: self.name,
                id,
                kind,
            });
        }
        self.exhaust = None;

        for flag in self.flags().iter() {
            binder.flag(flag, false);
        }
        self.flags = StoryFlags::default();
        self.indicators = StoryFlags::default();

        for &node in self.timeline.targets() {
            binder.release(&TargetId::Node(node));
        }
        for layer in &self.parallax {
            binder.release(&TargetId::Node(layer.target));
        }
        if let Some((detector, provider)) = self.detector.as_mut() {
            detector.reset();
            for (node, _) in provider.poses(0.0) {
                binder.release(&TargetId::Node(node));
            }
        }

        self.timeline.reset();
        self.last_actor_center = None;
        self.speed = 0.0;
        self.mounted = false;
        log::info!("Unmounted section '{}'", self.name);
    }
}

/// Per-section particle seed so sections don't share a random sequence
fn section_seed(seed: u64, name: &str) -> u64 {
    // FNV-1a
    let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    });
    seed ^ hash
}
