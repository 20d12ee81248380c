//! Client for a gpsd-compatible fix source
//!
//! Connects over TCP, enables JSON watch mode, and turns the report stream
//! into [`Fix`] records. `TPV` reports carry the position itself; satellite
//! count and DOP values arrive separately in `SKY` reports and are retained
//! here and merged into every subsequent fix, mirroring how the gpsd client
//! library accumulates them.

use crate::error::{Error, Result};
use crate::fix::{Fix, FixMode};
use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Deserialize;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};

/// Waitable, pull-based source of fixes
pub trait FixSource {
    /// Descriptor to multiplex on for readiness
    fn as_raw_fd(&self) -> RawFd;

    /// Whether a complete report is already waiting in the client buffer.
    ///
    /// Buffered lines do not show up as descriptor readiness, so the control
    /// loop must keep reading while this is true before blocking again.
    fn has_buffered(&self) -> bool;

    /// Read one report. `Ok(None)` means the report carried no fix, or that
    /// no complete report has arrived yet. Must never block: a stalled peer
    /// that sent only part of a report must not hold up the control loop.
    fn read_fix(&mut self) -> Result<Option<Fix>>;
}

/// One line of gpsd JSON, keyed by its `class` field
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Report {
    #[serde(rename = "TPV")]
    Tpv(TpvReport),
    #[serde(rename = "SKY")]
    Sky(SkyReport),
    #[serde(other)]
    Other,
}

/// Time-position-velocity report (position subset)
#[derive(Debug, Deserialize)]
struct TpvReport {
    mode: Option<u8>,
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    time: Option<DateTime<Utc>>,
}

/// Sky view report (precision subset)
#[derive(Debug, Deserialize)]
struct SkyReport {
    hdop: Option<f64>,
    vdop: Option<f64>,
    pdop: Option<f64>,
    #[serde(rename = "uSat")]
    usat: Option<u32>,
    satellites: Option<Vec<SkySatellite>>,
}

#[derive(Debug, Deserialize)]
struct SkySatellite {
    #[serde(default)]
    used: bool,
}

/// Latest sky view data, merged into each fix
#[derive(Debug, Default)]
struct SkyState {
    satellites_used: Option<u32>,
    hdop: Option<f64>,
    vdop: Option<f64>,
    pdop: Option<f64>,
}

impl SkyState {
    fn apply(&mut self, sky: SkyReport) {
        self.satellites_used = sky
            .usat
            .or_else(|| {
                sky.satellites
                    .as_ref()
                    .map(|sats| sats.iter().filter(|s| s.used).count() as u32)
            })
            .or(self.satellites_used);
        self.hdop = sky.hdop.or(self.hdop);
        self.vdop = sky.vdop.or(self.vdop);
        self.pdop = sky.pdop.or(self.pdop);
    }
}

fn fix_from_tpv(tpv: TpvReport, sky: &SkyState) -> Option<Fix> {
    let mode = match tpv.mode {
        Some(2) => FixMode::Fix2d,
        Some(3) => FixMode::Fix3d,
        _ => FixMode::NoFix,
    };
    // A report without position or timestamp is not a sample at all,
    // whereas a mode-none report with them still flows through the filter.
    let (lat, lon, time) = match (tpv.lat, tpv.lon, tpv.time) {
        (Some(lat), Some(lon), Some(time)) => (lat, lon, time),
        _ => return None,
    };

    Some(Fix {
        latitude: lat,
        longitude: lon,
        altitude: tpv.alt,
        time,
        mode,
        satellites_used: sky.satellites_used,
        hdop: sky.hdop,
        vdop: sky.vdop,
        pdop: sky.pdop,
    })
}

fn parse_line(line: &str, sky: &mut SkyState) -> Option<Fix> {
    match serde_json::from_str::<Report>(line) {
        Ok(Report::Tpv(tpv)) => fix_from_tpv(tpv, sky),
        Ok(Report::Sky(report)) => {
            sky.apply(report);
            None
        }
        Ok(Report::Other) => None,
        Err(e) => {
            debug!("ignoring unparseable report: {}", e);
            None
        }
    }
}

/// Pull the next complete newline-terminated line out of the reader.
///
/// Never blocks on a non-blocking stream: a partial tail accumulates in
/// `partial` across calls and `Ok(None)` is returned until the rest of the
/// line arrives. End of stream is a disconnect.
fn next_line<R: Read>(reader: &mut BufReader<R>, partial: &mut String) -> Result<Option<String>> {
    loop {
        let (consumed, complete) = {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if buf.is_empty() {
                return Err(Error::Disconnected);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    partial.push_str(&String::from_utf8_lossy(&buf[..pos]));
                    (pos + 1, true)
                }
                None => {
                    partial.push_str(&String::from_utf8_lossy(buf));
                    (buf.len(), false)
                }
            }
        };
        reader.consume(consumed);
        if complete {
            return Ok(Some(std::mem::take(partial)));
        }
    }
}

/// TCP client speaking the gpsd JSON watch protocol
pub struct GpsdClient {
    reader: BufReader<TcpStream>,
    line: String,
    sky: SkyState,
}

impl GpsdClient {
    /// Connect and enable watch mode, optionally pinned to one device
    pub fn connect(host: &str, port: u16, device: Option<&str>) -> Result<Self> {
        let mut stream = TcpStream::connect((host, port))?;

        let watch = match device {
            Some(dev) => format!(
                "?WATCH={{\"enable\":true,\"json\":true,\"device\":\"{}\"}}\n",
                dev
            ),
            None => "?WATCH={\"enable\":true,\"json\":true}\n".to_string(),
        };
        stream.write_all(watch.as_bytes())?;
        // Reads must return instead of stalling on a half-sent report.
        stream.set_nonblocking(true)?;

        Ok(Self {
            reader: BufReader::new(stream),
            line: String::new(),
            sky: SkyState::default(),
        })
    }
}

impl FixSource for GpsdClient {
    fn as_raw_fd(&self) -> RawFd {
        self.reader.get_ref().as_raw_fd()
    }

    fn has_buffered(&self) -> bool {
        // A partial tail line is not readable yet; only a complete buffered
        // line avoids a wasted read_fix call with no reported readiness.
        self.reader.buffer().contains(&b'\n')
    }

    fn read_fix(&mut self) -> Result<Option<Fix>> {
        let line = match next_line(&mut self.reader, &mut self.line)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        trace!("report: {}", line);
        Ok(parse_line(line, &mut self.sky))
    }
}
