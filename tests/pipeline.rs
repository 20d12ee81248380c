//! End-to-end pipeline tests: segmenter decisions driving the document
//! writer, the way the control loop sequences them.

use chrono::{TimeZone, Utc};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracklogd::app::apply_decision;
use tracklogd::fix::{Fix, FixMode};
use tracklogd::gpx::GpxWriter;
use tracklogd::segmenter::{FilterConfig, TrackSegmenter};

/// Write sink that stays observable after the writer releases it
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn fix_at(secs: i64, lat: f64, lon: f64) -> Fix {
    Fix {
        latitude: lat,
        longitude: lon,
        altitude: Some(50.0),
        time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        mode: FixMode::Fix3d,
        satellites_used: Some(8),
        hdop: Some(1.0),
        vdop: Some(1.5),
        pdop: Some(1.8),
    }
}

fn feed(
    segmenter: &mut TrackSegmenter,
    writer: &mut GpxWriter,
    fixes: &[Fix],
) {
    for fix in fixes {
        let decision = segmenter.evaluate(fix);
        apply_decision(writer, decision, fix, false).unwrap();
    }
}

/// Structural shape of an emitted document: points per segment, in order
fn parse_structure(doc: &str) -> Vec<usize> {
    let mut segments = Vec::new();
    let mut current: Option<usize> = None;
    let mut depth_ok = true;

    for line in doc.lines() {
        let line = line.trim_start();
        if line.starts_with("<trkseg>") {
            assert!(current.is_none(), "nested segment");
            current = Some(0);
        } else if line.starts_with("</trkseg>") {
            segments.push(current.take().expect("close without open"));
        } else if line.starts_with("<trkpt") {
            match current.as_mut() {
                Some(count) => *count += 1,
                None => depth_ok = false,
            }
        }
    }
    assert!(depth_ok, "point outside segment");
    assert!(current.is_none(), "dangling unclosed segment");
    assert!(doc.trim_end().ends_with("</gpx>"), "missing footer");
    segments
}

#[test]
fn scenario_a_steady_fixes_one_segment() {
    // Fixes at t=0,1,2 with identical coordinates, 1s interval, no movement
    // filter: all three land in a single segment.
    let buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig::default());

    feed(
        &mut segmenter,
        &mut writer,
        &[
            fix_at(0, 50.0, 10.0),
            fix_at(1, 50.0, 10.0),
            fix_at(2, 50.0, 10.0),
        ],
    );
    writer.close_document().unwrap();

    assert_eq!(parse_structure(&buf.contents()), vec![3]);
}

#[test]
fn scenario_b_timeout_splits_tracks() {
    // t=0 then t=500 with a 300s track timeout: two one-point segments.
    let buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig::default());

    feed(
        &mut segmenter,
        &mut writer,
        &[fix_at(0, 50.0, 10.0), fix_at(500, 50.0, 10.0)],
    );
    writer.close_document().unwrap();

    let doc = buf.contents();
    assert_eq!(parse_structure(&doc), vec![1, 1]);
    assert_eq!(doc.matches("<trk>").count(), 2);
}

#[test]
fn scenario_c_stationary_fixes_filtered() {
    // Two identical-coordinate fixes with min_move = 5m: one point logged.
    let buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig {
        min_move: 5.0,
        ..FilterConfig::default()
    });

    feed(
        &mut segmenter,
        &mut writer,
        &[fix_at(0, 50.0, 10.0), fix_at(10, 50.0, 10.0)],
    );
    writer.close_document().unwrap();

    assert_eq!(parse_structure(&buf.contents()), vec![1]);
}

#[test]
fn scenario_d_rotation_mid_stream() {
    // A reload mid-stream closes the current document well-formed and the
    // next accepted fix opens a fresh segment in the new document.
    let old_buf = SharedBuf::default();
    let new_buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(old_buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig::default());

    feed(
        &mut segmenter,
        &mut writer,
        &[fix_at(0, 50.0, 10.0), fix_at(1, 50.0001, 10.0)],
    );

    // Reload: close the old document, open the new one, reset the
    // segmenter's notion of an open track. No segment is opened here.
    writer.close_document().unwrap();
    writer.open_document(Box::new(new_buf.clone())).unwrap();
    segmenter.reset_track();

    let old_doc = old_buf.contents();
    assert_eq!(parse_structure(&old_doc), vec![2]);

    // New document so far: header only
    let header_only = new_buf.contents();
    assert!(header_only.contains("<gpx"));
    assert!(!header_only.contains("<trk>"));

    feed(&mut segmenter, &mut writer, &[fix_at(2, 50.0002, 10.0)]);
    writer.close_document().unwrap();

    assert_eq!(parse_structure(&new_buf.contents()), vec![1]);
}

#[test]
fn long_mixed_run_round_trips() {
    // A drive with a stop, a gap, and a resumed outing; the document
    // structure must mirror the decision sequence exactly.
    let buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig {
        min_move: 5.0,
        ..FilterConfig::default()
    });

    let mut fixes = Vec::new();
    // Moving: accepted
    for i in 0..5 {
        fixes.push(fix_at(i * 10, 50.0 + 0.001 * i as f64, 10.0));
    }
    // Parked: filtered out
    for i in 0..5 {
        fixes.push(fix_at(50 + i * 10, 50.004, 10.0));
    }
    // Back after a long gap: new track
    for i in 0..3 {
        fixes.push(fix_at(1000 + i * 10, 50.01 + 0.001 * i as f64, 10.0));
    }

    feed(&mut segmenter, &mut writer, &fixes);
    writer.close_document().unwrap();

    assert_eq!(parse_structure(&buf.contents()), vec![5, 3]);
}

#[test]
fn no_fix_quality_never_reaches_document() {
    let buf = SharedBuf::default();
    let mut writer = GpxWriter::new();
    writer.open_document(Box::new(buf.clone())).unwrap();
    let mut segmenter = TrackSegmenter::new(FilterConfig::default());

    let mut dead = fix_at(0, 50.0, 10.0);
    dead.mode = FixMode::NoFix;
    feed(&mut segmenter, &mut writer, &[dead]);
    writer.close_document().unwrap();

    let doc = buf.contents();
    assert!(parse_structure(&doc).is_empty());
    assert!(!doc.contains("<trkpt"));
}
