//! Easing curves
//!
//! The handful of curves the story's tweens use. All map [0, 1] onto a curve
//! that starts at 0 and ends at 1 (`BackOut` overshoots in between).

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ease {
    /// `none`: scrubbed linear motion
    #[default]
    Linear,
    /// `power1.inOut`
    Power1InOut,
    /// `power2.inOut`
    Power2InOut,
    /// `sine.inOut`
    SineInOut,
    /// `sine.out`
    SineOut,
    /// `easeInQuad`
    InQuad,
    /// `back.out(1.7)`
    BackOut,
}

impl Ease {
    /// Apply the curve. Input is clamped to [0, 1].
    pub fn apply(self, t: f32) -> f32 {
        let t = crate::clamp01(t);
        match self {
            Ease::Linear => t,
            Ease::Power1InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Ease::Power2InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Ease::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Ease::SineOut => (t * PI / 2.0).sin(),
            Ease::InQuad => t * t,
            Ease::BackOut => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 7] = [
        Ease::Linear,
        Ease::Power1InOut,
        Ease::Power2InOut,
        Ease::SineInOut,
        Ease::SineOut,
        Ease::InQuad,
        Ease::BackOut,
    ];

    #[test]
    fn test_endpoints_fixed() {
        for ease in ALL {
            assert!(ease.apply(0.0).abs() < 1e-5, "{ease:?} at 0");
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-5, "{ease:?} at 1");
        }
    }

    #[test]
    fn test_in_out_symmetric_midpoint() {
        for ease in [Ease::Power1InOut, Ease::Power2InOut, Ease::SineInOut] {
            assert!((ease.apply(0.5) - 0.5).abs() < 1e-5, "{ease:?}");
        }
    }

    #[test]
    fn test_input_clamped() {
        assert_eq!(Ease::InQuad.apply(2.0), 1.0);
        assert_eq!(Ease::InQuad.apply(-1.0), 0.0);
    }
}
