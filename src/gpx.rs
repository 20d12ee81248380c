//! Streaming GPX 1.1 document writer
//!
//! Emits the document incrementally, one point at a time, and flushes the
//! sink after every operation so a tailing reader always sees a consistent
//! prefix and a crash loses no buffered data. The writer enforces its own
//! state machine; calling an operation outside its required state is a
//! caller bug and returns [`Error::WriterState`].

use crate::error::{Error, Result};
use crate::fix::Fix;
use std::io::Write;

/// Document writer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    DocumentOpen,
    SegmentOpen,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::DocumentOpen => "document open",
            State::SegmentOpen => "segment open",
        }
    }
}

/// Streaming writer for one GPX document at a time.
///
/// Owns the output sink while a document is open and releases it on close.
/// Track and segment boundaries coincide: `open_segment` opens both a
/// `<trk>` and its `<trkseg>`, `close_segment` closes both.
pub struct GpxWriter {
    sink: Option<Box<dyn Write + Send>>,
    state: State,
}

impl GpxWriter {
    /// Create a writer with no document open
    pub fn new() -> Self {
        Self {
            sink: None,
            state: State::Closed,
        }
    }

    /// Whether a document is currently open
    pub fn document_open(&self) -> bool {
        self.state != State::Closed
    }

    /// Whether a track segment is currently open
    pub fn segment_open(&self) -> bool {
        self.state == State::SegmentOpen
    }

    fn require(&mut self, expected: State, op: &'static str) -> Result<&mut (dyn Write + Send)> {
        if self.state != expected {
            return Err(Error::WriterState {
                op,
                state: self.state.name(),
            });
        }
        match self.sink.as_mut() {
            Some(sink) => Ok(sink.as_mut()),
            None => Err(Error::WriterState {
                op,
                state: "closed",
            }),
        }
    }

    /// Take ownership of a sink and write the document header
    pub fn open_document(&mut self, mut sink: Box<dyn Write + Send>) -> Result<()> {
        if self.state != State::Closed {
            return Err(Error::WriterState {
                op: "open_document",
                state: self.state.name(),
            });
        }

        writeln!(sink, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        writeln!(sink, "<gpx version=\"1.1\" creator=\"tracklogd\"")?;
        writeln!(
            sink,
            "        xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""
        )?;
        writeln!(sink, "        xmlns=\"http://www.topografix.com/GPX/1.1\"")?;
        writeln!(
            sink,
            "        xsi:schemaLocation=\"http://www.topografix.com/GPS/1/1"
        )?;
        writeln!(sink, "        http://www.topografix.com/GPX/1/1/gpx.xsd\">")?;
        sink.flush()?;

        self.sink = Some(sink);
        self.state = State::DocumentOpen;
        Ok(())
    }

    /// Open a track and its segment
    pub fn open_segment(&mut self) -> Result<()> {
        let sink = self.require(State::DocumentOpen, "open_segment")?;
        writeln!(sink, " <trk>")?;
        writeln!(sink, "  <trkseg>")?;
        sink.flush()?;
        self.state = State::SegmentOpen;
        Ok(())
    }

    /// Write one track point into the open segment.
    ///
    /// Altitude is omitted when the fix has none. In verbose mode the fix
    /// quality, satellite count (when positive) and each available DOP value
    /// are included as well, each omitted independently when unavailable.
    pub fn emit_point(&mut self, fix: &Fix, verbose: bool) -> Result<()> {
        let sink = self.require(State::SegmentOpen, "emit_point")?;

        writeln!(
            sink,
            "   <trkpt lat=\"{:.6}\" lon=\"{:.6}\">",
            fix.latitude, fix.longitude
        )?;
        if let Some(altitude) = fix.altitude {
            writeln!(sink, "    <ele>{:.0}</ele>", altitude)?;
        }
        writeln!(
            sink,
            "    <time>{}</time>",
            fix.time.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )?;
        if verbose {
            writeln!(sink, "    <fix>{}</fix>", fix.mode.label())?;
            match fix.satellites_used {
                Some(sats) if sats > 0 => writeln!(sink, "    <sat>{}</sat>", sats)?,
                _ => {}
            }
            if let Some(hdop) = fix.hdop {
                writeln!(sink, "    <hdop>{:.1}</hdop>", hdop)?;
            }
            if let Some(vdop) = fix.vdop {
                writeln!(sink, "    <vdop>{:.1}</vdop>", vdop)?;
            }
            if let Some(pdop) = fix.pdop {
                writeln!(sink, "    <pdop>{:.1}</pdop>", pdop)?;
            }
        }
        writeln!(sink, "   </trkpt>")?;
        sink.flush()?;
        Ok(())
    }

    /// Close the open segment and its track
    pub fn close_segment(&mut self) -> Result<()> {
        let sink = self.require(State::SegmentOpen, "close_segment")?;
        writeln!(sink, "  </trkseg>")?;
        writeln!(sink, " </trk>")?;
        sink.flush()?;
        self.state = State::DocumentOpen;
        Ok(())
    }

    /// Write the footer and release the sink.
    ///
    /// Closes the segment first when one is still open.
    pub fn close_document(&mut self) -> Result<()> {
        if self.state == State::SegmentOpen {
            self.close_segment()?;
        }
        let sink = self.require(State::DocumentOpen, "close_document")?;
        writeln!(sink, "</gpx>")?;
        sink.flush()?;
        self.sink = None;
        self.state = State::Closed;
        Ok(())
    }
}

impl Default for GpxWriter {
    fn default() -> Self {
        Self::new()
    }
}
