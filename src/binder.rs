//! Render binder interface
//!
//! The engine computes values; a binder is the only thing that writes them to
//! visual nodes. Applying the same frame twice must be harmless.

use std::collections::HashMap;
use std::fmt;

use crate::engine::NodeId;
use crate::engine::geometry::Pose;
use crate::engine::particles::{ParticleId, ParticleKind};
use crate::engine::timeline::{StoryFlag, StoryFlags};

/// What a frame is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    /// A static node in the page (rocket, UFO, beam, cloud, ...)
    Node(NodeId),
    /// A pooled particle; binders create its node lazily
    Particle {
        /// Owning section (pools are per section)
        section: &'static str,
        id: ParticleId,
        kind: ParticleKind,
    },
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::Node(name) => f.write_str(name),
            TargetId::Particle { section, id, .. } => write!(f, "{section}-{id}"),
        }
    }
}

/// `{targetId, transform, opacity}` for one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFrame {
    pub target: TargetId,
    pub pose: Pose,
}

pub trait RenderBinder {
    /// Write the pose to the target's node. Missing nodes are ignored.
    fn apply(&mut self, frame: &RenderFrame);

    /// The target is gone for good (particle finished, section unmounted)
    fn release(&mut self, _target: &TargetId) {}

    /// A story flag was raised or lowered (show/hide HUD, cards, thrusters)
    fn flag(&mut self, _flag: StoryFlag, _raised: bool) {}
}

/// Keeps the latest pose per target in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingBinder {
    pub latest: HashMap<TargetId, Pose>,
    pub applied: usize,
    pub released: Vec<TargetId>,
    pub flags: StoryFlags,
}

impl RecordingBinder {
    pub fn pose(&self, target: &TargetId) -> Option<&Pose> {
        self.latest.get(target)
    }

    pub fn node(&self, name: NodeId) -> Option<&Pose> {
        self.latest.get(&TargetId::Node(name))
    }

    /// Particle nodes currently on screen
    pub fn live_particles(&self) -> usize {
        self.latest
            .keys()
            .filter(|t| matches!(t, TargetId::Particle { .. }))
            .count()
    }
}

impl RenderBinder for RecordingBinder {
    fn apply(&mut self, frame: &RenderFrame) {
        self.applied += 1;
        self.latest.insert(frame.target, frame.pose);
    }

    fn release(&mut self, target: &TargetId) {
        if self.latest.remove(target).is_some() {
            self.released.push(*target);
        }
    }

    fn flag(&mut self, flag: StoryFlag, raised: bool) {
        if raised {
            self.flags.set(flag);
        } else {
            self.flags.clear(flag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_idempotent() {
        let mut binder = RecordingBinder::default();
        let frame = RenderFrame {
            target: TargetId::Node("rocket"),
            pose: Pose::at(1.0, 2.0),
        };
        binder.apply(&frame);
        binder.apply(&frame);
        assert_eq!(binder.latest.len(), 1);
        assert_eq!(binder.node("rocket"), Some(&Pose::at(1.0, 2.0)));
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let mut binder = RecordingBinder::default();
        binder.release(&TargetId::Node("ufo"));
        assert!(binder.released.is_empty());
    }

    #[test]
    fn test_particle_target_display() {
        let target = TargetId::Particle {
            section: "space",
            id: ParticleId {
                index: 3,
                generation: 2,
            },
            kind: ParticleKind::Impact,
        };
        assert_eq!(target.to_string(), "space-particle-3-2");
    }
}
