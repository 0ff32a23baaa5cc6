mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use voice_capture_core::processing::wav_format::{parse_wav_header, WAV_HEADER_SIZE};
use voice_capture_core::{
    read_metadata, CaptureError, CaptureSession, SessionConfig, SessionState, SessionStatus,
    StatusEvent, SyntheticCapture,
};

use common::{read_i16_samples, test_config, wav_files_in, ManualCapture, RecordingDelegate};

/// 10 ms at 16 kHz mono.
const BLOCK: usize = 160;
const BLOCK_SECS: f64 = 0.01;

#[test]
fn start_then_stop_without_frames_yields_header_only_file() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, _handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    let result = session.stop().unwrap().expect("stop after start returns a recording");

    let bytes = std::fs::read(&result.file_path).unwrap();
    assert_eq!(bytes.len(), WAV_HEADER_SIZE);
    let header = parse_wav_header(&bytes).unwrap();
    assert_eq!(header.format, session.format());
    assert_eq!(header.data_size, 0);
    assert_eq!(result.duration_secs, 0.0);
    assert_eq!(result.checksum.as_deref().map(str::len), Some(64));
}

#[test]
fn is_recording_follows_last_transition() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    assert!(!session.is_recording());
    session.start().unwrap();
    assert!(session.is_recording());
    assert!(handle.is_open());

    session.pause().unwrap();
    assert!(!session.is_recording());
    assert!(session.is_paused());
    assert!(!handle.is_open());

    session.resume().unwrap();
    assert!(session.is_recording());
    assert!(handle.is_open());
    assert_eq!(handle.open_count(), 2);

    session.stop().unwrap();
    assert!(!session.is_recording());
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!handle.is_open());
}

#[test]
fn invalid_transitions_change_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let delegate = Arc::new(RecordingDelegate::default());
    let session = CaptureSession::new(capture, test_config(dir.path()))
        .unwrap()
        .with_delegate(delegate.clone());

    assert_eq!(
        session.pause(),
        Err(CaptureError::InvalidTransition {
            action: "pause",
            state: SessionState::Idle
        })
    );
    assert!(matches!(session.resume(), Err(CaptureError::InvalidTransition { .. })));
    assert!(session.stop().unwrap().is_none());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(wav_files_in(dir.path()).is_empty());

    session.start().unwrap();
    assert_eq!(
        session.resume(),
        Err(CaptureError::InvalidTransition {
            action: "resume",
            state: SessionState::Recording
        })
    );
    assert_eq!(
        session.start(),
        Err(CaptureError::InvalidTransition {
            action: "start",
            state: SessionState::Recording
        })
    );
    assert!(session.is_recording());
    assert_eq!(handle.open_count(), 1);
    assert_eq!(wav_files_in(dir.path()).len(), 1);

    session.pause().unwrap();
    assert!(matches!(
        session.start(),
        Err(CaptureError::InvalidTransition {
            state: SessionState::Paused,
            ..
        })
    ));
    assert!(matches!(session.pause(), Err(CaptureError::InvalidTransition { .. })));
    assert!(session.is_paused());

    session.stop().unwrap();
    assert_eq!(
        *delegate.events.lock(),
        vec![StatusEvent::Started, StatusEvent::Paused, StatusEvent::Stopped]
    );
}

#[test]
fn frames_are_written_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    for value in 0..50i16 {
        assert!(handle.fire(&[value; BLOCK]));
    }
    let result = session.stop().unwrap().unwrap();

    let samples = read_i16_samples(&result.file_path);
    assert_eq!(samples.len(), 50 * BLOCK);
    let block_values: Vec<i16> = samples.chunks_exact(BLOCK).map(|b| b[0]).collect();
    assert!(block_values.windows(2).all(|w| w[0] < w[1]));
    assert!(samples.chunks_exact(BLOCK).all(|b| b.iter().all(|&s| s == b[0])));

    assert_eq!(result.stats.segments_written, 50);
    assert_eq!(result.stats.dropped_frames, 0);
    assert_eq!(result.stats.bytes_written, (50 * BLOCK * 2) as u64);
    assert_relative_eq!(result.duration_secs, 50.0 * BLOCK_SECS, epsilon = 1e-9);
}

#[test]
fn pause_resume_concatenates_segments() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    for _ in 0..5 {
        handle.fire(&[1; BLOCK]);
    }
    session.pause().unwrap();
    for _ in 0..3 {
        assert!(!handle.fire(&[9; BLOCK]), "closed stream must not deliver");
    }
    thread::sleep(Duration::from_millis(50));
    session.resume().unwrap();
    for _ in 0..4 {
        handle.fire(&[2; BLOCK]);
    }
    let result = session.stop().unwrap().unwrap();

    assert_eq!(wav_files_in(dir.path()), vec![result.file_path.clone()]);
    assert_eq!(result.stats.segments_written, 9);
    assert_relative_eq!(result.duration_secs, 9.0 * BLOCK_SECS, epsilon = 1e-9);

    let samples = read_i16_samples(&result.file_path);
    assert_eq!(samples.len(), 9 * BLOCK);
    assert!(samples[..5 * BLOCK].iter().all(|&s| s == 1));
    assert!(samples[5 * BLOCK..].iter().all(|&s| s == 2));

    // Wall-clock elapsed excludes the paused interval.
    assert!(result.stats.elapsed_secs < 1.0);
}

#[test]
fn stats_reflect_status_and_reset_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    handle.fire(&[0; BLOCK]);
    handle.fire(&[0; BLOCK]);
    assert_eq!(session.stats().status, SessionStatus::Recording);

    session.pause().unwrap();
    assert_eq!(session.stats().status, SessionStatus::Paused);

    session.stop().unwrap();
    let after_stop = session.stats();
    assert_eq!(after_stop.status, SessionStatus::Idle);
    assert_eq!(after_stop.segments_written, 2);
    assert_eq!(after_stop.queue_depth, 0);

    session.start().unwrap();
    let fresh = session.stats();
    assert_eq!(fresh.segments_written, 0);
    assert_eq!(fresh.dropped_frames, 0);
    assert_eq!(fresh.recorded_secs, 0.0);
    session.stop().unwrap();
}

#[test]
fn session_is_reusable() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    let mut paths = Vec::new();
    for round in 1..=3usize {
        session.start().unwrap();
        for _ in 0..round {
            handle.fire(&[0; BLOCK]);
        }
        let result = session.stop().unwrap().unwrap();
        assert_eq!(result.stats.segments_written, round as u64);
        paths.push(result.file_path);
    }

    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);
    assert!(paths.iter().all(|p| p.exists()));
}

#[test]
fn device_failure_at_start_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let delegate = Arc::new(RecordingDelegate::default());
    let session = CaptureSession::new(capture, test_config(dir.path()))
        .unwrap()
        .with_delegate(delegate.clone());

    handle.fail_next_open(CaptureError::DeviceNotAvailable);
    let err = session.start().unwrap_err();
    assert!(err.is_device_error());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(wav_files_in(dir.path()).is_empty(), "partial file must be deleted");
    assert!(delegate.events.lock().is_empty());

    // The failure is not sticky.
    session.start().unwrap();
    assert!(session.is_recording());
    session.stop().unwrap();
}

#[test]
fn missing_device_reports_device_error() {
    let dir = tempfile::tempdir().unwrap();
    let session =
        CaptureSession::new(SyntheticCapture::unavailable(), test_config(dir.path())).unwrap();

    assert_eq!(session.start(), Err(CaptureError::DeviceNotAvailable));
    assert!(!session.is_recording());
    assert!(wav_files_in(dir.path()).is_empty());
}

#[test]
fn unwritable_output_reports_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file-not-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let (capture, handle) = ManualCapture::new();
    let config = SessionConfig {
        output_directory: blocker.join("recordings"),
        ..test_config(dir.path())
    };
    let session = CaptureSession::new(capture, config).unwrap();

    assert!(matches!(session.start(), Err(CaptureError::Storage(_))));
    assert_eq!(handle.open_count(), 0, "device must not be opened");
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn delegate_sees_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let delegate = Arc::new(RecordingDelegate::default());
    let session = CaptureSession::new(capture, test_config(dir.path()))
        .unwrap()
        .with_delegate(delegate.clone());

    session.start().unwrap();
    handle.fire(&[0; BLOCK]);
    session.pause().unwrap();
    session.resume().unwrap();
    let result = session.stop().unwrap().unwrap();

    assert_eq!(
        *delegate.events.lock(),
        vec![
            StatusEvent::Started,
            StatusEvent::Paused,
            StatusEvent::Resumed,
            StatusEvent::Stopped
        ]
    );
    assert!(delegate.errors.lock().is_empty());
    assert_eq!(delegate.finished.lock().as_slice(), &[result]);
}

#[test]
fn resume_failure_keeps_session_paused() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    handle.fire(&[5; BLOCK]);
    session.pause().unwrap();

    handle.fail_next_open(CaptureError::Device("unplugged".into()));
    assert_eq!(session.resume(), Err(CaptureError::Device("unplugged".into())));
    assert!(session.is_paused());

    session.resume().unwrap();
    handle.fire(&[6; BLOCK]);
    let result = session.stop().unwrap().unwrap();
    assert_eq!(result.stats.segments_written, 2);
}

#[test]
fn metadata_sidecar_is_written_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let config = SessionConfig {
        write_metadata: true,
        ..test_config(dir.path())
    };
    let session = CaptureSession::new(capture, config).unwrap();

    session.start().unwrap();
    handle.fire(&[0; BLOCK]);
    let result = session.stop().unwrap().unwrap();

    let metadata = read_metadata(&result.file_path).unwrap();
    assert_eq!(metadata, result.metadata);
    assert_eq!(metadata.segments, 1);
    assert_eq!(metadata.sample_rate, 16_000);
    assert!(metadata.checksum.is_some());
    assert_eq!(metadata.checksum, result.checksum);
}

#[test]
fn dropping_an_active_session_removes_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = CaptureSession::new(capture, test_config(dir.path())).unwrap();

    session.start().unwrap();
    handle.fire(&[0; BLOCK]);
    assert_eq!(wav_files_in(dir.path()).len(), 1);

    drop(session);
    assert!(!handle.is_open());
    assert!(wav_files_in(dir.path()).is_empty());
}

#[test]
fn dropping_with_keep_abandoned_finalizes_file() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let config = SessionConfig {
        keep_abandoned_recordings: true,
        ..test_config(dir.path())
    };
    let session = CaptureSession::new(capture, config).unwrap();

    session.start().unwrap();
    handle.fire(&[3; BLOCK]);
    session.pause().unwrap();
    drop(session);

    let files = wav_files_in(dir.path());
    assert_eq!(files.len(), 1);
    let bytes = std::fs::read(&files[0]).unwrap();
    assert_eq!(parse_wav_header(&bytes).unwrap().data_size, (BLOCK * 2) as u32);
}

#[test]
fn lifecycle_calls_from_many_threads_do_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let (capture, handle) = ManualCapture::new();
    let session = Arc::new(CaptureSession::new(capture, test_config(dir.path())).unwrap());
    session.start().unwrap();

    let producer = {
        let handle = handle.clone();
        thread::spawn(move || {
            for i in 0..500 {
                handle.fire(&[(i % 100) as i16; BLOCK]);
                thread::yield_now();
            }
        })
    };
    let togglers: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = session.pause();
                    let _ = session.stats();
                    let _ = session.resume();
                }
            })
        })
        .collect();

    producer.join().unwrap();
    for t in togglers {
        t.join().unwrap();
    }

    let result = session.stop().unwrap().unwrap();
    let stats = &result.stats;
    assert_eq!(
        stats.segments_written * (BLOCK as u64 * 2),
        stats.bytes_written
    );
    assert_eq!(stats.callback_errors, 0);
    assert!(stats.segments_written + stats.dropped_frames <= 500);
}

#[test]
fn independent_sessions_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let (capture_a, handle_a) = ManualCapture::new();
    let (capture_b, handle_b) = ManualCapture::new();
    let a = CaptureSession::new(capture_a, test_config(dir.path())).unwrap();
    let b = CaptureSession::new(capture_b, test_config(dir.path())).unwrap();

    a.start().unwrap();
    b.start().unwrap();
    for _ in 0..3 {
        handle_a.fire(&[1; BLOCK]);
    }
    handle_b.fire(&[2; BLOCK]);
    b.pause().unwrap();

    assert!(a.is_recording());
    let result_a = a.stop().unwrap().unwrap();
    let result_b = b.stop().unwrap().unwrap();

    assert_ne!(result_a.file_path, result_b.file_path);
    assert_eq!(result_a.stats.segments_written, 3);
    assert_eq!(result_b.stats.segments_written, 1);
    assert!(read_i16_samples(&result_b.file_path).iter().all(|&s| s == 2));
}

#[test]
fn two_seconds_of_synthetic_silence() {
    let dir = tempfile::tempdir().unwrap();
    let session =
        CaptureSession::new(SyntheticCapture::silence(), test_config(dir.path())).unwrap();

    session.start().unwrap();
    thread::sleep(Duration::from_millis(2_000));
    let result = session.stop().unwrap().unwrap();

    // 2 s × 16000 samples/s × 2 bytes, within one 2048-frame block.
    let expected: i64 = 2 * 16_000 * 2;
    let block_bytes: i64 = 2048 * 2;
    let file_len = std::fs::metadata(&result.file_path).unwrap().len() as i64;
    let data_len = file_len - WAV_HEADER_SIZE as i64;
    assert!(
        (data_len - expected).abs() <= block_bytes,
        "data length {} not within one block of {}",
        data_len,
        expected
    );
    assert_eq!(result.stats.dropped_frames, 0);
    assert!(read_i16_samples(&result.file_path).iter().all(|&s| s == 0));

    let header = parse_wav_header(&std::fs::read(&result.file_path).unwrap()).unwrap();
    assert_eq!(header.data_size as i64, data_len);
}
