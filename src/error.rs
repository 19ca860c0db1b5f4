//! Configuration errors
//!
//! Only setup can fail. Measurement glitches and cleanup races are absorbed
//! where they happen and never become error values.

use thiserror::Error;

/// Result type alias for engine setup
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A malformed phase list, scroll window or tuning value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("timeline has no phases")]
    EmptyTimeline,

    #[error("phase '{phase}' has an invalid interval [{start}, {end})")]
    InvalidInterval {
        phase: String,
        start: f32,
        end: f32,
    },

    #[error("phases '{previous}' and '{next}' overlap")]
    Overlap { previous: String, next: String },

    #[error("phase '{next}' starts before '{previous}'")]
    Unordered { previous: String, next: String },

    #[error("phase '{phase}' has no tracks")]
    EmptyTrack { phase: String },

    #[error("motion path in phase '{phase}' needs at least two waypoints")]
    ShortPath { phase: String },

    #[error("invalid value for {field}: {value}")]
    InvalidRange { field: &'static str, value: f32 },

    #[error("particle pool capacity must be non-zero")]
    InvalidCapacity,

    #[error("settings JSON: {0}")]
    Parse(String),

    #[error("section '{section}' has no actor track for '{actor}'")]
    MissingActor {
        section: &'static str,
        actor: &'static str,
    },
}

impl ConfigError {
    /// Reject NaN/infinite values
    pub(crate) fn check_finite(field: &'static str, value: f32) -> ConfigResult<f32> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ConfigError::InvalidRange { field, value })
        }
    }

    /// Reject values outside `min..=max` (and non-finite ones)
    pub(crate) fn check_range(
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    ) -> ConfigResult<f32> {
        Self::check_finite(field, value)?;
        if value < min || value > max {
            return Err(ConfigError::InvalidRange { field, value });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(ConfigError::check_range("decay", 0.5, 0.0, 1.0).is_ok());
        assert_eq!(
            ConfigError::check_range("decay", 1.5, 0.0, 1.0),
            Err(ConfigError::InvalidRange {
                field: "decay",
                value: 1.5
            })
        );
        assert!(ConfigError::check_range("decay", f32::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_messages_name_the_phase() {
        let err = ConfigError::Overlap {
            previous: "launch".into(),
            next: "ascent".into(),
        };
        assert_eq!(err.to_string(), "phases 'launch' and 'ascent' overlap");
    }
}
