//! Stateful fix filtering and track segmentation
//!
//! Consumes one fix at a time and decides whether it is worth logging and
//! whether it continues the current track segment, starts a new segment, or
//! starts a new track. The filters are ordered so the cheap time check runs
//! before any spherical geometry:
//!
//! 1. fix quality (no solution is never logged)
//! 2. minimum interval since the last logged fix
//! 3. minimum movement since the last logged fix
//! 4. minimum bearing change since the last raw fix
//! 5. track timeout (a long reception gap starts a new track)
//!
//! The movement filter keeps stops from piling up points; the bearing filter
//! thins nearly-straight travel while keeping points through turns, unless
//! the movement already exceeds `max_seg`.

use crate::fix::Fix;
use crate::geo;
use chrono::Duration;

/// Outcome of evaluating one fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fix filtered out; nothing to write
    Discard,
    /// Emit the point into the currently open segment
    LogSameSegment,
    /// Open a segment, then emit the point
    LogNewSegment,
    /// Close the current segment, open a new one, then emit the point
    LogNewTrack,
}

/// Filtering thresholds; zero disables a distance/bearing filter
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Minimum interval between logged fixes
    pub min_interval: Duration,
    /// Reception gap that forces a new track
    pub track_timeout: Duration,
    /// Minimum movement between logged fixes, meters
    pub min_move: f64,
    /// Movement above which the bearing filter never suppresses, meters
    pub max_seg: f64,
    /// Minimum change of bearing between logged fixes, radians
    pub min_bearing: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::seconds(1),
            track_timeout: Duration::seconds(300),
            min_move: 0.0,
            max_seg: 200.0,
            min_bearing: 0.0,
        }
    }
}

/// Decision engine for one stream of fixes.
///
/// Holds two independent "last" references: `last_logged` is the most
/// recently accepted fix and drives the interval/movement/timeout checks,
/// while `last_raw` is the most recent fix the position filters evaluated,
/// accepted or not, and drives the bearing comparison. They deliberately may
/// refer to different prior fixes when intermediate fixes were rejected.
pub struct TrackSegmenter {
    config: FilterConfig,
    last_logged: Option<Fix>,
    last_raw: Option<Fix>,
    last_bearing: f64,
    track_open: bool,
}

impl TrackSegmenter {
    /// Create a segmenter with no history
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            last_logged: None,
            last_raw: None,
            last_bearing: 0.0,
            track_open: false,
        }
    }

    /// Tell the segmenter the document's segment was closed externally
    /// (rotation or reconnection), so the next accepted fix opens a new one.
    pub fn reset_track(&mut self) {
        self.track_open = false;
    }

    /// Evaluate one fix and update history per the outcome
    pub fn evaluate(&mut self, fix: &Fix) -> Decision {
        if !fix.mode.has_position() {
            return Decision::Discard;
        }

        // The very first fix has no last-logged timestamp and always passes.
        let elapsed = self.last_logged.as_ref().map(|last| fix.time - last.time);
        if let Some(dt) = elapsed {
            if dt < self.config.min_interval {
                return Decision::Discard;
            }
        }

        let first = self.last_logged.is_none();

        let mut movement = 0.0;
        if self.config.min_move > 0.0 || self.config.min_bearing > 0.0 {
            if let Some(last) = &self.last_logged {
                movement = geo::earth_distance(
                    last.latitude,
                    last.longitude,
                    fix.latitude,
                    fix.longitude,
                );
            }
        }

        let mut rejected =
            self.config.min_move > 0.0 && !first && movement < self.config.min_move;

        let mut bearing_update = None;
        if !rejected && self.config.min_bearing > 0.0 && !first {
            let bearing = match &self.last_raw {
                // A degenerate zero-length leg has no bearing; reuse the
                // last one computed instead of dividing by nothing.
                Some(raw) if raw.latitude == fix.latitude && raw.longitude == fix.longitude => {
                    self.last_bearing
                }
                Some(raw) => geo::earth_distance_and_bearing(
                    raw.latitude,
                    raw.longitude,
                    fix.latitude,
                    fix.longitude,
                )
                .1
                .unwrap_or(self.last_bearing),
                None => self.last_bearing,
            };

            if movement < self.config.max_seg
                && (bearing - self.last_bearing).abs() < self.config.min_bearing
            {
                rejected = true;
            } else {
                bearing_update = Some(bearing);
            }
        }

        let decision = if rejected {
            Decision::Discard
        } else {
            let timed_out = matches!(elapsed, Some(dt) if dt > self.config.track_timeout);
            let decision = if timed_out && !first {
                Decision::LogNewTrack
            } else if !self.track_open {
                Decision::LogNewSegment
            } else {
                Decision::LogSameSegment
            };

            self.track_open = true;
            self.last_logged = Some(fix.clone());
            if let Some(bearing) = bearing_update {
                self.last_bearing = bearing;
            }
            decision
        };

        // The bearing comparison always runs against the latest raw sample,
        // even when that sample itself was filtered out.
        if self.config.min_bearing > 0.0 {
            self.last_raw = Some(fix.clone());
        }

        decision
    }
}
