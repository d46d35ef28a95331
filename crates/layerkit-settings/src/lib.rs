//! LayerKit Settings Crate
//!
//! Reads and writes the configuration file that seeds hole detection,
//! snippet rendering and eject defaults.

pub mod config;
pub mod error;

pub use config::{Config, DetectionSettings, OutputSettings};
pub use error::{ConfigError, SettingsError, SettingsResult};
