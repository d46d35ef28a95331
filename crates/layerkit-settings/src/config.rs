//! Configuration file model
//!
//! Sections map onto the engines they seed: `detection` builds the hole
//! detector, `output` the snippet render options, `eject` the default eject
//! sequence.

use std::path::{Path, PathBuf};

use layerkit_holes::{DetectorConfig, DEFAULT_MIN_DIAMETER};
use layerkit_modifier::{EjectSettings, Firmware, ParkMove, RenderOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Hole detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Grid resolution in mm per cell
    pub resolution_mm: f64,
    /// Nominal extrusion width in mm
    pub line_width_mm: f64,
    /// Smallest hole diameter reported
    pub min_diameter_mm: f64,
    /// Leave infill out of the occupancy grid
    pub ignore_infill: bool,
    /// Filled fraction of a hole footprint that counts as its floor
    pub floor_overlap: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        Self {
            resolution_mm: detector.resolution_mm,
            line_width_mm: detector.line_width_mm,
            min_diameter_mm: DEFAULT_MIN_DIAMETER,
            ignore_infill: true,
            floor_overlap: detector.floor_overlap,
        }
    }
}

impl DetectionSettings {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            resolution_mm: self.resolution_mm,
            line_width_mm: self.line_width_mm,
            floor_overlap: self.floor_overlap,
        }
    }
}

/// Output rendering settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Target firmware family
    pub firmware: Firmware,
    /// Lift-and-park move used by pauses with `move_head`
    pub park: ParkMove,
}

impl OutputSettings {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            firmware: self.firmware,
            park: self.park,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionSettings,
    pub output: OutputSettings,
    /// Eject sequence used when a plan asks for one without settings
    pub eject: EjectSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/layerkit/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("layerkit").join("config.toml"))
            .ok_or(SettingsError::NoConfigDirectory)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the file when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let d = &self.detection;
        positive("detection.resolution_mm", d.resolution_mm)?;
        positive("detection.line_width_mm", d.line_width_mm)?;
        if !d.min_diameter_mm.is_finite() || d.min_diameter_mm < 0.0 {
            return Err(out_of_range("detection.min_diameter_mm", d.min_diameter_mm));
        }
        if !(d.floor_overlap > 0.0 && d.floor_overlap <= 1.0) {
            return Err(out_of_range("detection.floor_overlap", d.floor_overlap));
        }

        let park = &self.output.park;
        if !(park.lift_mm.is_finite() && park.x.is_finite() && park.y.is_finite()) {
            return Err(SettingsError::InvalidSetting {
                key: "output.park".to_string(),
                reason: "park coordinates must be finite".to_string(),
            });
        }

        self.eject
            .validate()
            .map_err(|e| SettingsError::InvalidSetting {
                key: "eject".to_string(),
                reason: e.to_string(),
            })
    }
}

fn out_of_range(key: &str, value: f64) -> SettingsError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn positive(key: &str, value: f64) -> SettingsResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(out_of_range(key, value))
    }
}
