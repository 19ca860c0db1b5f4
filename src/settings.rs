//! Engine settings and preferences
//!
//! Data-driven tuning for the detector and particles, plus user preferences.
//! Persisted as JSON in LocalStorage on the web.

use serde::{Deserialize, Serialize};

use crate::engine::collision::DetectorConfig;
use crate::error::{ConfigError, ConfigResult};

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Particle pool capacity for this preset
    pub fn particle_capacity(&self) -> usize {
        match self {
            QualityPreset::Low => 64,
            QualityPreset::Medium => 192,
            QualityPreset::High => crate::consts::MAX_PARTICLES,
        }
    }
}

/// Engine tuning and user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Particle RNG seed
    pub seed: u64,
    pub quality: QualityPreset,

    // === Detector ===
    pub detector: DetectorConfig,

    // === Particles ===
    /// Particle effects (exhaust, impacts, twinkles)
    pub particles: bool,
    /// Actor speed (px/s) above which the exhaust stream runs
    pub exhaust_speed_threshold: f32,
    /// Exhaust particles per second
    pub exhaust_rate_hz: f32,
    /// Particles per impact burst
    pub impact_burst: usize,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,

    // === Accessibility ===
    /// Reduced motion (no shake jitter, no particles)
    pub reduced_motion: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: 0x5eed_1a0c,
            quality: QualityPreset::Medium,

            detector: DetectorConfig::default(),

            particles: true,
            exhaust_speed_threshold: 120.0,
            exhaust_rate_hz: 30.0,
            impact_burst: 8,

            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,

            reduced_motion: false,
        }
    }
}

impl EngineSettings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> ConfigResult<()> {
        self.detector.validate()?;
        ConfigError::check_range(
            "exhaust_speed_threshold",
            self.exhaust_speed_threshold,
            0.0,
            f32::MAX,
        )?;
        ConfigError::check_range("exhaust_rate_hz", self.exhaust_rate_hz, 1e-3, 1000.0)?;
        ConfigError::check_range(
            "impact_burst",
            self.impact_burst as f32,
            0.0,
            crate::consts::MAX_PARTICLES as f32,
        )?;
        ConfigError::check_range("master_volume", self.master_volume, 0.0, 1.0)?;
        ConfigError::check_range("sfx_volume", self.sfx_volume, 0.0, 1.0)?;
        Ok(())
    }

    /// Effective particle toggle (respects reduced_motion)
    pub fn effective_particles(&self) -> bool {
        self.particles && !self.reduced_motion
    }

    /// Pool capacity; a disabled pool still gets one slot so it stays valid
    pub fn max_particles(&self) -> usize {
        if self.effective_particles() {
            self.quality.particle_capacity()
        } else {
            1
        }
    }

    /// Parse and validate
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "launch_sequence_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            let _ = storage.set_item(Self::STORAGE_KEY, &self.to_json());
            log::info!("Settings saved");
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
