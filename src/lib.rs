//! tracklogd - GPX track logging daemon
//!
//! Consumes a live stream of position fixes from a gpsd-compatible service
//! and renders them into a GPX 1.1 track log, with configurable filters
//! deciding which fixes are worth recording and when a track starts over.
//!
//! Pipeline: fix source → [`segmenter::TrackSegmenter`] (stateful filter) →
//! [`gpx::GpxWriter`] (streaming emit) → file or stdout. SIGHUP rotates the
//! output file; SIGINT/SIGTERM/SIGQUIT shut down cleanly.

pub mod app;
pub mod config;
pub mod error;
pub mod fix;
pub mod geo;
pub mod gpx;
pub mod rotation;
pub mod segmenter;
pub mod signals;
pub mod source;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
