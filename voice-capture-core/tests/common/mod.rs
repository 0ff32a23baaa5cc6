#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use voice_capture_core::{
    AudioSource, CaptureDelegate, CaptureError, CaptureProvider, FrameCallback, RecordingResult,
    SampleSlice, SessionConfig, StatusEvent, StreamFormat,
};

/// Test-side control over a [`ManualCapture`]: fires frames synchronously
/// on the calling thread, standing in for the driver thread.
#[derive(Clone, Default)]
pub struct ManualHandle {
    callback: Arc<Mutex<Option<FrameCallback>>>,
    opens: Arc<AtomicUsize>,
    fail_next_open: Arc<Mutex<Option<CaptureError>>>,
}

impl ManualHandle {
    /// Deliver one chunk. Returns `false` when the stream is closed.
    pub fn fire(&self, samples: &[i16]) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(cb) => {
                cb(SampleSlice::Int16(samples));
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.callback.lock().is_some()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn fail_next_open(&self, error: CaptureError) {
        *self.fail_next_open.lock() = Some(error);
    }
}

pub struct ManualCapture {
    handle: ManualHandle,
}

impl ManualCapture {
    pub fn new() -> (Self, ManualHandle) {
        let handle = ManualHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl CaptureProvider for ManualCapture {
    fn is_available(&self) -> bool {
        true
    }

    fn open(&mut self, _format: &StreamFormat, on_frame: FrameCallback) -> Result<(), CaptureError> {
        if let Some(error) = self.handle.fail_next_open.lock().take() {
            return Err(error);
        }
        *self.handle.callback.lock() = Some(on_frame);
        self.handle.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.handle.callback.lock().take();
    }

    fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "manual".into(),
            name: "Manual test input".into(),
            is_default: false,
        }
    }
}

/// Delegate that records everything it is told.
#[derive(Default)]
pub struct RecordingDelegate {
    pub events: Mutex<Vec<StatusEvent>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub finished: Mutex<Vec<RecordingResult>>,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_status(&self, event: &StatusEvent) {
        self.events.lock().push(*event);
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }

    fn on_capture_finished(&self, result: &RecordingResult) {
        self.finished.lock().push(result.clone());
    }
}

pub fn test_config(dir: &Path) -> SessionConfig {
    SessionConfig {
        output_directory: dir.to_path_buf(),
        poll_interval_ms: 10,
        ..Default::default()
    }
}

/// Decode the 16-bit PCM payload of a canonical WAV file.
pub fn read_i16_samples(path: &Path) -> Vec<i16> {
    let data = std::fs::read(path).unwrap();
    data[44..]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

pub fn wav_files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "wav"))
        .collect()
}
