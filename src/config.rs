//! Configuration for the tracklogd daemon
//!
//! Loads configuration from a TOML file. Every section and key has a
//! default, so the daemon also runs with no configuration file at all
//! (localhost fix source, GPX to stdout).

use crate::error::Result;
use crate::segmenter::FilterConfig;
use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub output: OutputConfig,
    pub filters: FilterSettings,
    pub logging: LoggingConfig,
}

/// Fix source endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Positioning service host
    pub host: String,
    /// Positioning service TCP port (gpsd default: 2947)
    pub port: u16,
    /// Restrict the watch to one device path (e.g. "/dev/ttyACM0")
    pub device: Option<String>,
}

impl ServerConfig {
    /// Endpoint in `host:port` form, for log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2947,
            device: None,
        }
    }
}

/// Output document settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// strftime-style filename template, e.g. "track-%Y%m%d-%H%M%S.gpx".
    ///
    /// Re-evaluated against the wall clock on every rotation. When absent
    /// the document is written to stdout and SIGHUP rotation is disabled.
    pub template: Option<String>,
    /// Include fix quality, satellite count and DOP values in each point
    pub verbose: bool,
}

/// Fix filtering thresholds.
///
/// Zero disables the corresponding distance/bearing filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Minimum interval between logged fixes, seconds
    pub min_interval_secs: u64,
    /// Reception gap that forces a new track, seconds
    pub track_timeout_secs: u64,
    /// Minimum movement between logged fixes, meters
    pub min_move_meters: f64,
    /// Movement above which the bearing filter never suppresses, meters
    pub max_segment_meters: f64,
    /// Minimum change of bearing between logged fixes, degrees
    pub min_bearing_degrees: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_interval_secs: 1,
            track_timeout_secs: 300,
            min_move_meters: 0.0,
            max_segment_meters: 200.0,
            min_bearing_degrees: 0.0,
        }
    }
}

impl FilterSettings {
    /// Convert to the segmenter's filter configuration.
    ///
    /// Clamps the time thresholds to at least one second and warns about
    /// values that are almost certainly misconfiguration.
    pub fn filter_config(&self) -> FilterConfig {
        let interval = self.min_interval_secs.max(1);
        if interval > 60 {
            log::warn!("logging interval is more than a minute!");
        }
        let timeout = self.track_timeout_secs.max(1);
        if timeout >= 3600 {
            log::warn!("track timeout is an hour or more!");
        }

        FilterConfig {
            min_interval: Duration::seconds(interval as i64),
            track_timeout: Duration::seconds(timeout as i64),
            min_move: self.min_move_meters.max(0.0),
            max_seg: self.max_segment_meters.max(0.0),
            min_bearing: self.min_bearing_degrees.max(0.0).to_radians(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
