//! Phase timeline controller
//!
//! An ordered list of disjoint progress intervals. Each phase animates one or
//! more render targets and carries side effects that fire on entry and undo
//! on backward exit, so scrolling up rewinds the story.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::NodeId;
use super::geometry::Pose;
use super::particles::BurstPreset;
use crate::audio::Cue;
use crate::easing::Ease;
use crate::error::{ConfigError, ConfigResult};
use crate::{clamp01, inverse_lerp};

/// How a target moves across a phase's local progress
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    /// Interpolate between two poses
    Tween { from: Pose, to: Pose, ease: Ease },
    /// Follow waypoints (offsets) through equal-length legs
    Path {
        base: Pose,
        waypoints: Vec<Vec2>,
        ease: Ease,
    },
    /// Constant pose
    Hold(Pose),
    /// Time-driven jitter around a base pose while the phase is active
    Shake {
        base: Pose,
        amplitude: Vec2,
        frequency_hz: f32,
    },
}

impl Motion {
    pub fn tween(from: Pose, to: Pose, ease: Ease) -> Self {
        Motion::Tween { from, to, ease }
    }

    /// Pose at local progress `t`, without time-driven components
    pub fn rest(&self, t: f32) -> Pose {
        let t = clamp01(t);
        match self {
            Motion::Tween { from, to, ease } => from.lerp(to, ease.apply(t)),
            Motion::Path {
                base,
                waypoints,
                ease,
            } => Pose {
                offset: sample_path(waypoints, ease.apply(t)),
                ..*base
            },
            Motion::Hold(pose) => *pose,
            Motion::Shake { base, .. } => *base,
        }
    }

    /// Pose at local progress `t` while active at wall-clock `time_secs`
    pub fn sample(&self, t: f32, time_secs: f32) -> Pose {
        let mut pose = self.rest(t);
        if let Motion::Shake {
            amplitude,
            frequency_hz,
            ..
        } = self
        {
            let phase = time_secs * frequency_hz * TAU;
            pose.offset += Vec2::new(amplitude.x * phase.sin(), amplitude.y * phase.cos());
        }
        pose
    }
}

/// Piecewise-linear interpolation; every leg gets an equal share of `t`
fn sample_path(waypoints: &[Vec2], t: f32) -> Vec2 {
    match waypoints {
        [] => Vec2::ZERO,
        [only] => *only,
        _ => {
            let legs = (waypoints.len() - 1) as f32;
            let scaled = t * legs;
            let leg = (scaled.floor() as usize).min(waypoints.len() - 2);
            let local = scaled - leg as f32;
            waypoints[leg].lerp(waypoints[leg + 1], local)
        }
    }
}

/// One target's motion within a phase
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub target: NodeId,
    pub motion: Motion,
}

/// Narrative state toggled by phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryFlag {
    /// Countdown finished, engines lit
    Ignition,
    /// UFO beam has locked onto the rocket
    TractorBeam,
    /// Rescue message and solution cards visible
    SolutionsShown,
    /// Docking thrusters firing
    DockingThrusters,
    /// "Approaching" HUD indicator
    ApproachIndicator,
    /// "Aligning" HUD indicator
    AlignmentIndicator,
    /// "Final approach" HUD indicator
    FinalApproachIndicator,
    /// Hard dock achieved, success message up
    Docked,
}

impl StoryFlag {
    pub const ALL: [StoryFlag; 8] = [
        StoryFlag::Ignition,
        StoryFlag::TractorBeam,
        StoryFlag::SolutionsShown,
        StoryFlag::DockingThrusters,
        StoryFlag::ApproachIndicator,
        StoryFlag::AlignmentIndicator,
        StoryFlag::FinalApproachIndicator,
        StoryFlag::Docked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryFlag::Ignition => "ignition",
            StoryFlag::TractorBeam => "tractor-beam",
            StoryFlag::SolutionsShown => "solutions-shown",
            StoryFlag::DockingThrusters => "docking-thrusters",
            StoryFlag::ApproachIndicator => "approach-indicator",
            StoryFlag::AlignmentIndicator => "alignment-indicator",
            StoryFlag::FinalApproachIndicator => "final-approach",
            StoryFlag::Docked => "docked",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Set of raised story flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoryFlags(u32);

impl StoryFlags {
    pub fn set(&mut self, flag: StoryFlag) {
        self.0 |= flag.bit();
    }

    pub fn clear(&mut self, flag: StoryFlag) {
        self.0 &= !flag.bit();
    }

    pub fn contains(&self, flag: StoryFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: StoryFlags) -> StoryFlags {
        StoryFlags(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = StoryFlag> {
        StoryFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

/// Side effect attached to a phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseEffect {
    /// Play on every entry, either direction
    Cue(Cue),
    /// Raise on entry, lower on backward exit
    Flag(StoryFlag),
    /// Raised exactly while the phase is active
    Indicator(StoryFlag),
    /// Emit at the actor on forward entry
    Burst(BurstPreset),
}

/// A named interval `[start, end)` of progress
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: &'static str,
    pub start: f32,
    pub end: f32,
    pub tracks: Vec<Track>,
    pub effects: Vec<PhaseEffect>,
}

impl Phase {
    pub fn new(name: &'static str, start: f32, end: f32) -> Self {
        Self {
            name,
            start,
            end,
            tracks: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn track(mut self, target: NodeId, motion: Motion) -> Self {
        self.tracks.push(Track { target, motion });
        self
    }

    pub fn effect(mut self, effect: PhaseEffect) -> Self {
        self.effects.push(effect);
        self
    }

    #[inline]
    pub fn contains(&self, progress: f32) -> bool {
        progress >= self.start && progress < self.end
    }

    /// `(progress - start) / (end - start)`, clamped
    #[inline]
    pub fn local(&self, progress: f32) -> f32 {
        inverse_lerp(self.start, self.end, progress)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.start.is_finite() && self.end.is_finite() && self.start < self.end) {
            return Err(ConfigError::InvalidInterval {
                phase: self.name.to_string(),
                start: self.start,
                end: self.end,
            });
        }
        if self.tracks.is_empty() {
            return Err(ConfigError::EmptyTrack {
                phase: self.name.to_string(),
            });
        }
        for track in &self.tracks {
            if let Motion::Path { waypoints, .. } = &track.motion {
                if waypoints.len() < 2 {
                    return Err(ConfigError::ShortPath {
                        phase: self.name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Scroll direction of a crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Boundary crossing reported by [`Timeline::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Enter { phase: usize, direction: Direction },
    Leave { phase: usize, direction: Direction },
}

/// Validated, ordered phase list plus the crossing state
#[derive(Debug, Clone)]
pub struct Timeline {
    phases: Vec<Phase>,
    targets: Vec<NodeId>,
    progress: Option<f32>,
    active: Option<usize>,
}

impl Timeline {
    /// Validate and build. Intervals must be well-formed, sorted and disjoint;
    /// touching ends (`a.end == b.start`) are allowed.
    pub fn new(phases: Vec<Phase>) -> ConfigResult<Self> {
        if phases.is_empty() {
            return Err(ConfigError::EmptyTimeline);
        }
        for phase in &phases {
            phase.validate()?;
        }
        for pair in phases.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start < prev.start {
                return Err(ConfigError::Unordered {
                    previous: prev.name.to_string(),
                    next: next.name.to_string(),
                });
            }
            if next.start < prev.end {
                return Err(ConfigError::Overlap {
                    previous: prev.name.to_string(),
                    next: next.name.to_string(),
                });
            }
        }

        let mut targets: Vec<NodeId> = Vec::new();
        for track in phases.iter().flat_map(|p| &p.tracks) {
            if !targets.contains(&track.target) {
                targets.push(track.target);
            }
        }

        Ok(Self {
            phases,
            targets,
            progress: None,
            active: None,
        })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> &Phase {
        &self.phases[index]
    }

    /// Every target animated by some phase, in first-appearance order
    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn progress(&self) -> Option<f32> {
        self.progress
    }

    /// Phase containing `progress`. Shared boundaries belong to the later phase.
    pub fn active_at(&self, progress: f32) -> Option<usize> {
        let idx = self.phases.partition_point(|p| p.start <= progress);
        let candidate = idx.checked_sub(1)?;
        self.phases[candidate]
            .contains(progress)
            .then_some(candidate)
    }

    /// Move to `progress` and report every boundary crossed, in crossing order.
    ///
    /// Phases jumped over in one update still get an enter/leave pair. The
    /// first update only enters the phase it lands in.
    pub fn update(&mut self, progress: f32) -> Vec<PhaseEvent> {
        if !progress.is_finite() {
            return Vec::new();
        }
        let next_active = self.active_at(progress);

        let Some(previous) = self.progress else {
            self.progress = Some(progress);
            self.active = next_active;
            return next_active
                .map(|phase| PhaseEvent::Enter {
                    phase,
                    direction: Direction::Forward,
                })
                .into_iter()
                .collect();
        };

        if progress == previous {
            return Vec::new();
        }

        let direction = if progress > previous {
            Direction::Forward
        } else {
            Direction::Backward
        };

        // Phases whose interval intersects the swept range, both ends inclusive
        let visited: Vec<usize> = match direction {
            Direction::Forward => (0..self.phases.len())
                .filter(|&i| {
                    let p = &self.phases[i];
                    p.start <= progress && p.end > previous
                })
                .collect(),
            Direction::Backward => (0..self.phases.len())
                .rev()
                .filter(|&i| {
                    let p = &self.phases[i];
                    p.start <= previous && p.end > progress
                })
                .collect(),
        };

        let mut events = Vec::with_capacity(visited.len() * 2);
        for i in visited {
            if self.active != Some(i) {
                events.push(PhaseEvent::Enter {
                    phase: i,
                    direction,
                });
            }
            if next_active != Some(i) {
                events.push(PhaseEvent::Leave {
                    phase: i,
                    direction,
                });
            }
        }

        for event in &events {
            log::debug!("Timeline {:?} ({})", event, self.event_phase_name(event));
        }

        self.progress = Some(progress);
        self.active = next_active;
        events
    }

    fn event_phase_name(&self, event: &PhaseEvent) -> &'static str {
        match event {
            PhaseEvent::Enter { phase, .. } | PhaseEvent::Leave { phase, .. } => {
                self.phases[*phase].name
            }
        }
    }

    /// Pose of `target` at `progress`.
    ///
    /// Inside one of the target's tracks the track is sampled. Otherwise the
    /// target holds the end of its most recent track, or the start of its
    /// first track if none has begun. `None` if no phase animates it.
    pub fn pose_of(&self, target: NodeId, progress: f32, time_secs: f32) -> Option<Pose> {
        let mut held = None;
        for phase in &self.phases {
            let Some(track) = phase.tracks.iter().rev().find(|t| t.target == target) else {
                continue;
            };
            if progress >= phase.end {
                held = Some(track.motion.rest(1.0));
            } else if phase.contains(progress) {
                return Some(track.motion.sample(phase.local(progress), time_secs));
            } else {
                return held.or_else(|| Some(track.motion.rest(0.0)));
            }
        }
        held
    }

    /// Poses for all targets at `progress`
    pub fn poses(&self, progress: f32, time_secs: f32) -> Vec<(NodeId, Pose)> {
        self.targets
            .iter()
            .filter_map(|&t| self.pose_of(t, progress, time_secs).map(|pose| (t, pose)))
            .collect()
    }

    /// Forget crossing state (section unmount)
    pub fn reset(&mut self) {
        self.progress = None;
        self.active = None;
    }
}
