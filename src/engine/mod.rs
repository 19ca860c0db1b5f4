//! Scroll-synchronized animation engine
//!
//! All story logic lives here. This module must be pure and deterministic:
//! - Progress in, values out; only the binder touches visual nodes
//! - Seeded RNG only
//! - Stable iteration order (phase order, target first appearance, slot index)
//! - No rendering or platform dependencies

pub mod collision;
pub mod geometry;
pub mod particles;
pub mod progress;
pub mod section;
pub mod story;
pub mod timeline;

/// Name of a visual node (DOM element id on the web)
pub type NodeId = &'static str;

pub use collision::{
    Avoidance, CollisionDetector, CollisionEvent, DetectorConfig, DetectorReport,
    DriftingObstacle, Obstacle, ObstacleField, ObstacleId, ObstacleProvider, nearest_ahead,
};
pub use geometry::{Pose, Rect};
pub use particles::{BurstPreset, EmitterOrigin, ParticleId, ParticleKind, ParticlePool};
pub use progress::{
    Anchor, Measurement, ProgressSource, ScrollAccumulator, ScrollMetrics, ScrollWindow, WindowEnd,
};
pub use section::{FrameInput, FrameReport, PageLayout, ParallaxLayer, Section, SectionDef};
pub use story::{StackedPage, Story};
pub use timeline::{
    Direction, Motion, Phase, PhaseEffect, PhaseEvent, StoryFlag, StoryFlags, Timeline,
};
