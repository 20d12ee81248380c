//! Signal-safe notification channel
//!
//! Real signal handlers do nothing but poke a byte into a non-blocking
//! socketpair; the control loop polls the read end alongside the data
//! connection and drains the queued signal numbers synchronously on its own
//! thread. All file I/O and state mutation stays out of handler context.

use crate::error::{Error, Result};
use libc::c_int;
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::pipe;
use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

/// Signals the daemon reacts to
const WATCHED: [c_int; 4] = [SIGHUP, SIGINT, SIGTERM, SIGQUIT];

/// Decoded control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGHUP: rotate the output document
    Reload,
    /// SIGINT/SIGTERM/SIGQUIT: clean shutdown
    Terminate(c_int),
    /// Anything else that got queued
    Unknown(c_int),
}

/// Drainable, poll-able queue of delivered signals
pub struct SignalListener {
    wake: UnixStream,
    signals: Signals,
}

impl SignalListener {
    /// Register handlers for the watched signals
    pub fn new() -> Result<Self> {
        let (wake, notify) = UnixStream::pair()?;
        wake.set_nonblocking(true)?;
        notify.set_nonblocking(true)?;

        for sig in WATCHED {
            pipe::register(sig, notify.try_clone()?)
                .map_err(|e| Error::Signal(format!("register signal {}: {}", sig, e)))?;
        }
        let signals = Signals::new(WATCHED)
            .map_err(|e| Error::Signal(format!("signal iterator: {}", e)))?;

        Ok(Self { wake, signals })
    }

    /// Descriptor that becomes readable when a signal has been queued
    pub fn as_raw_fd(&self) -> RawFd {
        self.wake.as_raw_fd()
    }

    /// Drain everything queued so far, in arrival order.
    ///
    /// Never blocks; returns an empty vector when nothing is pending.
    pub fn drain(&mut self) -> Vec<SignalEvent> {
        // Empty the wakeup bytes first so the descriptor goes quiet.
        let mut scratch = [0u8; 64];
        loop {
            match self.wake.read(&mut scratch) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        self.signals
            .pending()
            .map(|sig| match sig {
                SIGHUP => SignalEvent::Reload,
                SIGINT | SIGTERM | SIGQUIT => SignalEvent::Terminate(sig),
                other => SignalEvent::Unknown(other),
            })
            .collect()
    }
}
