use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::GuideError;
use crate::proximity::DEFAULT_PROXIMITY_RADIUS_M;
use crate::speech::{MAX_RATE, MIN_RATE};

/// Tunables shared by the guide, the narration engine and the location tracker.
///
/// Every field has a default, so both the builder and the JSON loader accept
/// partial input:
///
/// ```rust
/// use geo_narrator::GuideConfigBuilder;
///
/// let config = GuideConfigBuilder::default()
///     .proximity_radius_m(30.0)
///     .locale("pl-PL")
///     .build()
///     .unwrap();
/// assert_eq!(config.debounce_ms, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, setter(into))]
#[serde(default)]
pub struct GuideConfig {
    /// Distance in meters within which a POI counts as arrived at.
    pub proximity_radius_m: f64,
    /// Trailing window that coalesces bursts of narration starts.
    pub debounce_ms: u64,
    /// Per-fix timeout requested from the location source.
    pub fix_timeout_ms: u64,
    /// Speech rate used until the user picks one. Range: 0.5–2.0.
    pub default_rate: f32,
    /// Preferred locale (BCP-47), used to pick default voice and UI language.
    pub locale: String,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            proximity_radius_m: DEFAULT_PROXIMITY_RADIUS_M,
            debounce_ms: 300,
            fix_timeout_ms: 5000,
            default_rate: 1.0,
            locale: "en-US".to_string(),
        }
    }
}

impl GuideConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, GuideError> {
        let content = std::fs::read_to_string(path)?;
        let config: GuideConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded guide config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GuideError> {
        if !(self.proximity_radius_m > 0.0) {
            return Err(GuideError::Config(format!(
                "proximity_radius_m must be positive, got {}",
                self.proximity_radius_m
            )));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.default_rate) {
            return Err(GuideError::Config(format!(
                "default_rate must be within {MIN_RATE}–{MAX_RATE}, got {}",
                self.default_rate
            )));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }
}
