//! End-to-end guide loop tests against mock cameras and TCS backends

use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guider::{CycleLog, GuideError, GuideLoop, GuideState, StopReason};
use hardware::tcs::{CommandFileSink, MockTcs, TcsError, DEFAULT_COMMAND_FILE};
use ndarray::Array2;
use shared::camera_interface::{CameraError, CameraResult, FrameSource, MockFrameSource};
use shared::guide_config::GuideConfig;
use shared::image_proc::SubframeSpec;
use shared::test_util::{synthetic_star_frame, SyntheticSource};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config() -> GuideConfig {
    GuideConfig {
        subframe: SubframeSpec::Centered { size: 300 },
        connect_retry_delay_ms: 1,
        ..Default::default()
    }
}

/// Star 20 px right of and 10 px above the subframe center.
fn star_frame(seed: u64) -> Array2<u16> {
    synthetic_star_frame(
        400,
        400,
        &[SyntheticSource::new(220.0, 190.0, 800.0, 3.0)],
        100.0,
        4.0,
        seed,
    )
}

fn star_frames(count: u64) -> Vec<Array2<u16>> {
    (0..count).map(star_frame).collect()
}

/// Camera that panics on its first frame.
#[derive(Default)]
struct PanickingCamera {
    disconnect_calls: usize,
}

impl FrameSource for PanickingCamera {
    fn connect(&mut self) -> CameraResult<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> CameraResult<Array2<u16>> {
        panic!("sensor driver crashed");
    }

    fn disconnect(&mut self) -> CameraResult<()> {
        self.disconnect_calls += 1;
        Ok(())
    }

    fn name(&self) -> String {
        "panicking camera".to_string()
    }
}

/// Writer that starts failing once `broken` is set.
struct BreakableWriter {
    broken: Arc<AtomicBool>,
}

impl Write for BreakableWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        Ok(())
    }
}

#[test]
fn test_guides_until_source_exhausted() {
    init_logging();

    let camera = MockFrameSource::new(star_frames(3));
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 3);
    assert_eq!(summary.commands_sent, 3);
    assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
    assert_eq!(guide.state(), &GuideState::Disconnected);

    let (camera, tcs) = guide.into_parts();
    assert_eq!(camera.disconnect_calls(), 1);
    assert_eq!(tcs.disconnect_calls(), 1);
    assert!(!tcs.is_connected());

    // dx = +20 px, dy = -10 px: EW follows dy and NS follows -dx
    for wire in tcs.sent_wire() {
        assert!(wire.starts_with("PT -"), "unexpected command {wire:?}");
        assert!(wire.ends_with(" \r"));
    }
    for cmd in tcs.sent() {
        assert!(cmd.ew_arcsec() < 0.0 && cmd.ew_arcsec() > -0.5);
        assert!(cmd.ns_arcsec() < -0.3 && cmd.ns_arcsec() > -0.6);
    }
}

#[test]
fn test_stops_after_max_cycles() {
    init_logging();

    let config = GuideConfig {
        max_cycles: Some(4),
        ..test_config()
    };
    let camera = MockFrameSource::new_repeating(star_frame(1));
    let mut guide = GuideLoop::new(config, camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 4);
    assert_eq!(summary.stop_reason, Some(StopReason::MaxCycles));
    assert_eq!(guide.camera().frames_served(), 4);
    assert_eq!(guide.tcs().sent().len(), 4);
}

#[test]
fn test_stop_signal_from_another_thread() {
    init_logging();

    let config = GuideConfig {
        interval_ms: 20,
        ..test_config()
    };
    let camera = MockFrameSource::new_repeating(star_frame(2));
    let mut guide = GuideLoop::new(config, camera, MockTcs::new()).unwrap();

    let stop = guide.stop_signal();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        stop.request_stop();
    });

    let summary = guide.run().unwrap();
    stopper.join().unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::StopRequested));
    assert!(summary.cycles_completed >= 1);
    assert_eq!(guide.tcs().disconnect_calls(), 1);
    assert_eq!(guide.camera().disconnect_calls(), 1);
}

#[test]
fn test_stop_before_first_cycle() {
    init_logging();

    let camera = MockFrameSource::new_repeating(star_frame(3));
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new()).unwrap();
    guide.stop_signal().request_stop();

    let summary = guide.run().unwrap();
    assert_eq!(summary.cycles_completed, 0);
    assert_eq!(summary.stop_reason, Some(StopReason::StopRequested));
    assert!(guide.tcs().sent().is_empty());
    assert_eq!(guide.tcs().disconnect_calls(), 1);
}

#[test]
fn test_transient_capture_errors_skip_cycle() {
    init_logging();

    let camera = MockFrameSource::from_outcomes(vec![
        Ok(star_frame(4)),
        Err(CameraError::Timeout(Duration::from_millis(50))),
        Err(CameraError::CaptureError("dropped frame".to_string())),
        Ok(star_frame(5)),
    ]);
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(summary.capture_failures, 2);
    assert_eq!(summary.commands_sent, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
}

#[test]
fn test_connect_failure_still_tears_down() {
    init_logging();

    let config = GuideConfig {
        connect_attempts: 2,
        ..test_config()
    };
    let tcs = MockTcs::new().with_connect_failures(5);
    let camera = MockFrameSource::new(star_frames(1));
    let mut guide = GuideLoop::new(config, camera, tcs).unwrap();

    let result = guide.run();
    assert!(matches!(
        result,
        Err(GuideError::Tcs(TcsError::ConnectionFailed(_)))
    ));
    assert_eq!(guide.state(), &GuideState::Disconnected);
    assert!(matches!(
        guide.summary().stop_reason,
        Some(StopReason::Failed(_))
    ));

    let (camera, tcs) = guide.into_parts();
    assert_eq!(tcs.connect_calls(), 2);
    assert_eq!(camera.connect_calls(), 1);
    assert_eq!(tcs.disconnect_calls(), 1);
    assert_eq!(camera.disconnect_calls(), 1);
    assert_eq!(camera.frames_served(), 0);
}

#[test]
fn test_connect_retry_recovers() {
    init_logging();

    let config = GuideConfig {
        connect_attempts: 3,
        ..test_config()
    };
    let tcs = MockTcs::new().with_connect_failures(2);
    let camera = MockFrameSource::new(star_frames(2));
    let mut guide = GuideLoop::new(config, camera, tcs).unwrap();

    let summary = guide.run().unwrap();
    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(guide.tcs().connect_calls(), 3);
}

#[test]
fn test_send_failure_is_fatal() {
    init_logging();

    let tcs = MockTcs::new().with_send_failure_at(1);
    let camera = MockFrameSource::new(star_frames(5));
    let mut guide = GuideLoop::new(test_config(), camera, tcs).unwrap();

    let result = guide.run();
    assert!(matches!(result, Err(GuideError::Tcs(TcsError::Io(_)))));

    let summary = guide.summary().clone();
    assert_eq!(summary.cycles_completed, 1);
    assert_eq!(summary.commands_sent, 1);
    assert!(matches!(summary.stop_reason, Some(StopReason::Failed(_))));
    assert_eq!(guide.state(), &GuideState::Disconnected);

    let (camera, tcs) = guide.into_parts();
    assert_eq!(camera.frames_served(), 2);
    assert_eq!(camera.disconnect_calls(), 1);
    assert_eq!(tcs.disconnect_calls(), 1);
}

#[test]
fn test_panic_in_cycle_still_tears_down() {
    init_logging();

    let mut guide =
        GuideLoop::new(test_config(), PanickingCamera::default(), MockTcs::new()).unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| guide.run()));
    assert!(outcome.is_err());

    assert_eq!(guide.state(), &GuideState::Disconnected);
    assert_eq!(guide.camera().disconnect_calls, 1);
    assert_eq!(guide.tcs().disconnect_calls(), 1);
    assert!(!guide.tcs().is_connected());
}

#[test]
fn test_out_of_bound_offsets_are_not_sent() {
    init_logging();

    // The star sits about 0.5 arcsec off the reference
    let config = GuideConfig {
        safety_bound_arcsec: 0.1,
        ..test_config()
    };
    let camera = MockFrameSource::new(star_frames(3));
    let mut guide = GuideLoop::new(config, camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 3);
    assert_eq!(summary.skipped_out_of_bound, 3);
    assert_eq!(summary.commands_sent, 0);
    assert!(guide.tcs().sent().is_empty());
}

#[test]
fn test_blank_frames_are_low_confidence() {
    init_logging();

    let blank = Array2::<u16>::from_elem((400, 400), 100);
    let camera = MockFrameSource::new(vec![blank.clone(), blank]);
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(summary.skipped_low_confidence, 2);
    assert!(guide.tcs().sent().is_empty());
}

#[test]
fn test_telemetry_attached_to_report() {
    init_logging();

    let config = GuideConfig {
        fetch_telemetry: true,
        ..test_config()
    };
    let tcs = MockTcs::new().with_telemetry(MockTcs::sample_telemetry());
    let camera = MockFrameSource::new(star_frames(1));
    let mut guide = GuideLoop::new(config, camera, tcs).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.telemetry_failures, 0);
    let telemetry = guide
        .last_report()
        .and_then(|r| r.telemetry.as_ref())
        .expect("telemetry should be attached");
    assert_eq!(telemetry.target_name, "HD 189733");
}

#[test]
fn test_missing_telemetry_is_not_fatal() {
    init_logging();

    let config = GuideConfig {
        fetch_telemetry: true,
        ..test_config()
    };
    let camera = MockFrameSource::new(star_frames(2));
    let mut guide = GuideLoop::new(config, camera, MockTcs::new()).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(summary.commands_sent, 2);
    assert_eq!(summary.telemetry_failures, 2);
}

#[test]
fn test_cycle_log_has_one_row_per_cycle() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cycles.csv");

    let camera = MockFrameSource::new(star_frames(3));
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new())
        .unwrap()
        .with_cycle_log(CycleLog::create(&path).unwrap());
    guide.run().unwrap();
    drop(guide);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(&row[0], i.to_string().as_str());
        assert_eq!(&row[14], "sent");
    }
}

#[test]
fn test_offline_command_file() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let camera = MockFrameSource::new(star_frames(3));
    let mut guide =
        GuideLoop::new(test_config(), camera, CommandFileSink::in_dir(dir.path())).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.commands_sent, 3);
    assert_eq!(guide.tcs().commands_written(), 3);

    let written = std::fs::read_to_string(dir.path().join(DEFAULT_COMMAND_FILE)).unwrap();
    assert!(written.starts_with("PT -"));
    assert!(written.ends_with(" \r"));
}

#[test]
fn test_run_again_after_completion() {
    init_logging();

    let config = GuideConfig {
        max_cycles: Some(2),
        ..test_config()
    };
    let camera = MockFrameSource::new_repeating(star_frame(9));
    let mut guide = GuideLoop::new(config, camera, MockTcs::new()).unwrap();

    guide.run().unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 2);
    assert_eq!(guide.tcs().sent().len(), 4);
    assert_eq!(guide.tcs().connect_calls(), 2);
    assert_eq!(guide.tcs().disconnect_calls(), 2);
}

#[test]
fn test_watched_directory_to_command_file() {
    use image::{ImageBuffer, Luma};
    use shared::camera_interface::DirectoryFrameSource;

    init_logging();

    let frames_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let frame = star_frame(12);
    let (height, width) = frame.dim();
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            Luma([frame[[y as usize, x as usize]]])
        });
    img.save(frames_dir.path().join("exposure_0001.png")).unwrap();

    let config = GuideConfig {
        max_cycles: Some(1),
        ..test_config()
    };
    let camera = DirectoryFrameSource::new(frames_dir.path())
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(5));
    let tcs = CommandFileSink::in_dir(out_dir.path());

    let mut guide = GuideLoop::new(config, camera, tcs).unwrap();
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 1);
    assert_eq!(summary.commands_sent, 1);
    let written = std::fs::read_to_string(out_dir.path().join(DEFAULT_COMMAND_FILE)).unwrap();
    assert!(written.starts_with("PT -"));
}

#[test]
fn test_cycle_log_failure_keeps_guiding() {
    init_logging();

    let broken = Arc::new(AtomicBool::new(false));
    let log = CycleLog::from_writer(BreakableWriter {
        broken: broken.clone(),
    })
    .unwrap();
    broken.store(true, Ordering::SeqCst);

    let camera = MockFrameSource::new(star_frames(3));
    let mut guide = GuideLoop::new(test_config(), camera, MockTcs::new())
        .unwrap()
        .with_cycle_log(log);
    let summary = guide.run().unwrap();

    assert_eq!(summary.cycles_completed, 3);
    assert_eq!(summary.commands_sent, 3);
    assert_eq!(summary.cycle_log_failures, 3);
    assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
    assert_eq!(guide.tcs().sent().len(), 3);
}
