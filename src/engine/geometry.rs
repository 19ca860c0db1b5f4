//! Boxes and poses
//!
//! Screen space throughout: CSS pixels, y grows downward. The rocket travels
//! toward smaller y.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::lerp;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box from a DOM-style `(left, top, width, height)`
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + width, y + height),
        }
    }

    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        let half = size / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.min.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.max.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }

    /// Midpoint of the bottom edge (where exhaust leaves the rocket)
    pub fn bottom_center(&self) -> Vec2 {
        Vec2::new(self.center().x, self.max.y)
    }

    /// Zero or negative area, or non-finite corners. Happens before layout.
    pub fn is_degenerate(&self) -> bool {
        !(self.min.is_finite() && self.max.is_finite())
            || self.width() <= 0.0
            || self.height() <= 0.0
    }

    /// Point strictly inside (edges excluded)
    pub fn contains_strict(&self, p: Vec2) -> bool {
        p.x > self.min.x && p.x < self.max.x && p.y > self.min.y && p.y < self.max.y
    }

    pub fn translate(&self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Horizontal spans overlap once both are widened by `margin` on each side
    pub fn overlaps_horizontally(&self, other: &Rect, margin: f32) -> bool {
        self.min.x - margin < other.max.x && other.min.x < self.max.x + margin
    }
}

/// Render-ready transform of one target: translation, rotation, scale, opacity.
///
/// Rotation is in degrees to match CSS transforms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub offset: Vec2,
    pub rotation: f32,
    pub scale: f32,
    pub opacity: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        offset: Vec2::ZERO,
        rotation: 0.0,
        scale: 1.0,
        opacity: 1.0,
    };

    pub fn at(x: f32, y: f32) -> Self {
        Self {
            offset: Vec2::new(x, y),
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Component-wise interpolation
    pub fn lerp(&self, to: &Pose, t: f32) -> Pose {
        Pose {
            offset: self.offset.lerp(to.offset, t),
            rotation: lerp(self.rotation, to.rotation, t),
            scale: lerp(self.scale, to.scale, t),
            opacity: lerp(self.opacity, to.opacity, t),
        }
    }

    /// The box a node with resting box `base` occupies under this pose.
    ///
    /// Rotation is ignored; obstacle checks work on the upright box.
    pub fn apply_to(&self, base: &Rect) -> Rect {
        let size = (base.max - base.min) * self.scale;
        Rect::from_center(base.center() + self.offset, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_strict_excludes_edges() {
        let r = Rect::from_xywh(100.0, 0.0, 100.0, 50.0);
        assert!(r.contains_strict(Vec2::new(150.0, 25.0)));
        assert!(!r.contains_strict(Vec2::new(100.0, 25.0)));
        assert!(!r.contains_strict(Vec2::new(200.0, 25.0)));
        assert!(!r.contains_strict(Vec2::new(250.0, 25.0)));
    }

    #[test]
    fn test_degenerate() {
        assert!(Rect::from_xywh(0.0, 0.0, 0.0, 10.0).is_degenerate());
        assert!(Rect::from_xywh(0.0, f32::NAN, 10.0, 10.0).is_degenerate());
        assert!(!Rect::from_xywh(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_pose_lerp_midpoint() {
        let a = Pose::at(0.0, 100.0).with_opacity(0.0);
        let b = Pose::at(0.0, -200.0).with_rotation(90.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.offset, Vec2::new(0.0, -50.0));
        assert_eq!(mid.rotation, 45.0);
        assert_eq!(mid.opacity, 0.5);
    }

    #[test]
    fn test_apply_to_scales_about_center() {
        let base = Rect::from_xywh(0.0, 0.0, 100.0, 200.0);
        let moved = Pose::at(10.0, -20.0).with_scale(0.5).apply_to(&base);
        assert_eq!(moved.center(), Vec2::new(60.0, 80.0));
        assert_eq!(moved.width(), 50.0);
        assert_eq!(moved.height(), 100.0);
    }
}
