//! Position fix types shared across the pipeline

use chrono::{DateTime, Utc};

/// Positioning solution quality, as reported by the fix source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMode {
    /// No positional solution
    NoFix,
    /// Two-dimensional fix (no altitude)
    Fix2d,
    /// Full three-dimensional fix
    Fix3d,
}

impl FixMode {
    /// GPX `<fix>` element label
    pub fn label(self) -> &'static str {
        match self {
            FixMode::NoFix => "none",
            FixMode::Fix2d => "2d",
            FixMode::Fix3d => "3d",
        }
    }

    /// Whether this mode carries a usable position
    pub fn has_position(self) -> bool {
        !matches!(self, FixMode::NoFix)
    }
}

/// One positioning sample from the fix source.
///
/// Immutable once received; per-fix quality metadata (satellite count, DOP
/// triple) is merged in by the source from the most recent sky view report.
#[derive(Debug, Clone)]
pub struct Fix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude in meters, when the solution includes one
    pub altitude: Option<f64>,
    /// Wall-clock timestamp with sub-second precision
    pub time: DateTime<Utc>,
    /// Solution quality
    pub mode: FixMode,
    /// Satellites used in the solution
    pub satellites_used: Option<u32>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Vertical dilution of precision
    pub vdop: Option<f64>,
    /// Position dilution of precision
    pub pdop: Option<f64>,
}
