//! Control loop for the tracklogd daemon
//!
//! Single-threaded and event-driven: one `poll(2)` multiplexes the fix
//! source descriptor and the signal notification descriptor with a bounded
//! timeout, so neither starves the other and no busy-waiting happens. All
//! writer and segmenter state lives on this thread.

use crate::config::Config;
use crate::error::Result;
use crate::fix::Fix;
use crate::gpx::GpxWriter;
use crate::rotation::RotationController;
use crate::segmenter::{Decision, TrackSegmenter};
use crate::signals::{SignalEvent, SignalListener};
use crate::source::{FixSource, GpsdClient};
use log::{debug, error, info, warn};
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Upper bound on one blocking wait, so shutdown stays responsive
const POLL_CAP: Duration = Duration::from_millis(250);

/// Pause between reconnection attempts to the fix source
const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Why the streaming loop returned
enum LoopExit {
    /// Terminate signal processed; document already closed
    Terminated,
    /// Connection lost; reconnect and continue
    Disconnected,
}

/// Readiness of the two multiplexed descriptors
struct Readiness {
    data: bool,
    signal: bool,
}

/// Block until a descriptor is ready or the timeout elapses.
///
/// `data_fd` may be negative to wait on the signal descriptor alone.
fn wait_ready(data_fd: RawFd, signal_fd: RawFd, timeout: Duration) -> Result<Readiness> {
    let mut fds = [
        libc::pollfd {
            fd: data_fd,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: signal_fd,
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    loop {
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc >= 0 {
            // Errors and hangups count as readable: the subsequent read
            // surfaces the actual failure.
            let ready = |f: &libc::pollfd| f.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP) != 0;
            return Ok(Readiness {
                data: ready(&fds[0]),
                signal: ready(&fds[1]),
            });
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::Interrupted {
            // A signal landed mid-wait; the next poll sees its wakeup byte.
            continue;
        }
        return Err(err.into());
    }
}

/// Sequence the writer calls implied by one segmenter decision
pub fn apply_decision(
    writer: &mut GpxWriter,
    decision: Decision,
    fix: &Fix,
    verbose: bool,
) -> Result<()> {
    match decision {
        Decision::Discard => Ok(()),
        Decision::LogSameSegment => writer.emit_point(fix, verbose),
        Decision::LogNewSegment => {
            writer.open_segment()?;
            writer.emit_point(fix, verbose)
        }
        Decision::LogNewTrack => {
            // A rotation between fixes may already have closed the segment.
            if writer.segment_open() {
                writer.close_segment()?;
            }
            writer.open_segment()?;
            writer.emit_point(fix, verbose)
        }
    }
}

/// Top-level daemon state: the pipeline plus its control plumbing
pub struct App {
    config: Config,
    writer: GpxWriter,
    segmenter: TrackSegmenter,
    rotation: RotationController,
    signals: SignalListener,
}

impl App {
    /// Initialize the pipeline: signal channel, initial document, segmenter.
    ///
    /// Any failure here is a configuration or startup error and the caller
    /// should exit non-zero.
    pub fn new(config: Config) -> Result<Self> {
        let signals = SignalListener::new()?;

        let rotation = RotationController::new(config.output.template.clone());
        let mut writer = GpxWriter::new();
        rotation.open_initial(&mut writer)?;
        match config.output.template.as_deref() {
            Some(template) => info!("logging to template {:?}", template),
            None => info!("no filename template, logging to stdout"),
        }

        let segmenter = TrackSegmenter::new(config.filters.filter_config());

        Ok(Self {
            config,
            writer,
            segmenter,
            rotation,
            signals,
        })
    }

    /// Run until a terminate signal is processed
    pub fn run(&mut self) -> Result<()> {
        loop {
            let mut client = match self.connect_with_backoff()? {
                Some(client) => client,
                None => return Ok(()), // terminated during the wait
            };
            info!("connected to gpsd at {}", self.config.server.address());

            match self.stream(&mut client)? {
                LoopExit::Terminated => return Ok(()),
                LoopExit::Disconnected => continue,
            }
        }
    }

    /// Consume fixes and signals until disconnection or termination
    fn stream<S: FixSource>(&mut self, client: &mut S) -> Result<LoopExit> {
        loop {
            let ready = wait_ready(client.as_raw_fd(), self.signals.as_raw_fd(), POLL_CAP)?;

            // Signals first: a queued terminate must win over pending data.
            if ready.signal && self.process_signals()? {
                return Ok(LoopExit::Terminated);
            }

            if !ready.data && !client.has_buffered() {
                continue;
            }

            loop {
                match client.read_fix() {
                    Ok(Some(fix)) => self.dispatch(&fix)?,
                    Ok(None) => {}
                    Err(e) => {
                        error!("fix source read failed: {}, reconnecting", e);
                        self.on_disconnect()?;
                        return Ok(LoopExit::Disconnected);
                    }
                }
                if !client.has_buffered() {
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, fix: &Fix) -> Result<()> {
        let decision = self.segmenter.evaluate(fix);
        if decision != Decision::Discard {
            debug!(
                "{:?} fix at {:.6},{:.6}",
                decision, fix.latitude, fix.longitude
            );
        }
        apply_decision(&mut self.writer, decision, fix, self.config.output.verbose)
    }

    /// Drain queued signals; returns true when the daemon should stop.
    ///
    /// On terminate the document is closed before returning, so the output
    /// is well-formed no matter where in the stream the signal landed.
    fn process_signals(&mut self) -> Result<bool> {
        for event in self.signals.drain() {
            match event {
                SignalEvent::Reload => {
                    if self.rotation.rotate(&mut self.writer)? {
                        self.segmenter.reset_track();
                    } else {
                        debug!("SIGHUP ignored: no filename template configured");
                    }
                }
                SignalEvent::Terminate(sig) => {
                    info!("going down on signal {}", sig);
                    if self.writer.document_open() {
                        self.writer.close_document()?;
                    }
                    return Ok(true);
                }
                SignalEvent::Unknown(sig) => {
                    warn!("unexpected signal {} received", sig);
                }
            }
        }
        Ok(false)
    }

    /// Connection loss handling: with a rotation template configured, start
    /// a fresh document rather than resuming a possibly-stale open segment
    /// after a gap of unknown duration. Without one, the document is kept
    /// and new points simply continue appending after reconnection.
    fn on_disconnect(&mut self) -> Result<()> {
        if self.rotation.has_template() {
            self.rotation.rotate(&mut self.writer)?;
            self.segmenter.reset_track();
        }
        Ok(())
    }

    /// Retry the fix source indefinitely with a fixed backoff.
    ///
    /// Returns `None` when a terminate signal is processed during the wait;
    /// queued signals are observed between attempts, never delayed by the
    /// full backoff.
    fn connect_with_backoff(&mut self) -> Result<Option<GpsdClient>> {
        loop {
            let server = &self.config.server;
            match GpsdClient::connect(&server.host, server.port, server.device.as_deref()) {
                Ok(client) => return Ok(Some(client)),
                Err(e) => {
                    error!("failed to connect to {}: {}", server.address(), e);
                    if self.backoff_wait()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Sleep out the backoff while staying responsive to signals
    fn backoff_wait(&mut self) -> Result<bool> {
        let deadline = Instant::now() + RECONNECT_BACKOFF;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let ready = wait_ready(-1, self.signals.as_raw_fd(), remaining.min(POLL_CAP))?;
            if ready.signal && self.process_signals()? {
                return Ok(true);
            }
        }
    }
}
