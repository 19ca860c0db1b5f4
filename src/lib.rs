//! Launch Sequence - a scroll-driven rocket story
//!
//! Core modules:
//! - `engine`: Deterministic animation engine (progress, phases, collisions, particles)
//! - `binder`: Render binder interface (the only thing that touches visual nodes)
//! - `audio`: Fire-and-forget audio cues
//! - `platform`: Browser glue (DOM binder, page layout reader)
//! - `settings`: Data-driven tuning and preferences

pub mod audio;
pub mod binder;
pub mod easing;
pub mod engine;
pub mod error;
pub mod platform;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{EngineSettings, QualityPreset};

/// Engine configuration constants
pub mod consts {
    /// Nominal frame timestep (60 Hz) used by the headless runner
    pub const FRAME_DT: f32 = 1.0 / 60.0;
    /// Frame deltas above this are clamped (tab switch, debugger pause)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Rocket bounding box in CSS pixels (w-32 with its SVG aspect ratio)
    pub const ACTOR_WIDTH: f32 = 128.0;
    pub const ACTOR_HEIGHT: f32 = 256.0;

    /// Particle pool capacity ceiling (the High preset)
    pub const MAX_PARTICLES: usize = 512;

    /// Avoidance values below this snap to zero
    pub const AVOIDANCE_EPSILON: f32 = 0.01;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp to [0, 1]
#[inline]
pub fn clamp01(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

/// Fraction of the way `value` sits between `start` and `end`, clamped to [0, 1].
///
/// A degenerate span (start == end) maps everything at or past `start` to 1.
#[inline]
pub fn inverse_lerp(start: f32, end: f32, value: f32) -> f32 {
    let span = end - start;
    if span.abs() < f32::EPSILON {
        return if value >= start { 1.0 } else { 0.0 };
    }
    clamp01((value - start) / span)
}
