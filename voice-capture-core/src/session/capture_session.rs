use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::config::SessionConfig;
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::{SessionState, SessionStats, SessionStatus, StatusEvent};
use crate::processing::frame::{AudioFrame, SampleSlice};
use crate::processing::frame_queue::FrameQueue;
use crate::session::consumer::{ConsumerHandle, Release, SharedWriter, WriteCounters};
use crate::session::notifier::StatusNotifier;
use crate::storage::metadata;
use crate::storage::wav_writer::WavFileWriter;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_provider::{CaptureProvider, FrameCallback};

/// State shared with the producer callback. Read there without any lock.
///
/// The flags are relaxed atomics on purpose: the callback may observe a
/// transition one callback period late, which means at most one extra
/// frame after `pause` or one lost frame at `stop`.
#[derive(Debug, Default)]
struct ProducerState {
    recording: AtomicBool,
    paused: AtomicBool,
    sequence: AtomicU64,
    callback_errors: AtomicU64,
}

impl ProducerState {
    fn accepts_frames(&self) -> bool {
        self.recording.load(Ordering::Relaxed) && !self.paused.load(Ordering::Relaxed)
    }
}

/// Everything that exists between `start` and `stop`.
struct ActiveRecording {
    id: Uuid,
    created_at: DateTime<Utc>,
    file_path: PathBuf,
    queue: FrameQueue,
    writer: Arc<SharedWriter>,
    counters: Arc<WriteCounters>,
    producer: Arc<ProducerState>,
    consumer: Option<ConsumerHandle>,
    started_at: Instant,
    paused_total: Duration,
    paused_since: Option<Instant>,
}

impl ActiveRecording {
    /// Create the output file and a fresh queue. No threads yet.
    fn create(config: &SessionConfig, format: StreamFormat) -> Result<Self, CaptureError> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let short_id: String = id.simple().to_string().chars().take(8).collect();
        let file_name = format!(
            "{}_{}_{}.wav",
            config.file_prefix,
            created_at.format("%Y%m%d_%H%M%S"),
            short_id
        );
        let file_path = config.output_directory.join(file_name);

        let mut writer = WavFileWriter::new(file_path.clone(), format);
        writer.open()?;

        Ok(Self {
            id,
            created_at,
            file_path,
            queue: FrameQueue::new(config.queue_capacity),
            writer: Arc::new(SharedWriter::new(writer)),
            counters: Arc::new(WriteCounters::default()),
            producer: Arc::new(ProducerState::default()),
            consumer: None,
            started_at: Instant::now(),
            paused_total: Duration::ZERO,
            paused_since: None,
        })
    }

    /// Build the real-time callback handed to the capture provider.
    ///
    /// Per invocation: two relaxed loads, one copy of the driver buffer and
    /// one non-blocking push. Panics are caught here and only counted.
    fn frame_callback(&self, format: StreamFormat) -> FrameCallback {
        let producer = Arc::clone(&self.producer);
        let queue = self.queue.clone();

        Arc::new(move |slice: SampleSlice<'_>| {
            if !producer.accepts_frames() {
                return;
            }
            if slice.is_empty() {
                return;
            }
            let pushed = panic::catch_unwind(AssertUnwindSafe(|| {
                if slice.encoding() != format.encoding {
                    return false;
                }
                let sequence = producer.sequence.fetch_add(1, Ordering::Relaxed);
                // A full queue is backpressure, counted by the queue itself.
                queue.try_push(AudioFrame::copy_from(slice, &format, sequence));
                true
            }));
            if !matches!(pushed, Ok(true)) {
                producer.callback_errors.fetch_add(1, Ordering::Relaxed);
            }
        })
    }

    fn active_elapsed(&self) -> Duration {
        let mut paused = self.paused_total;
        if let Some(since) = self.paused_since {
            paused += since.elapsed();
        }
        self.started_at.elapsed().saturating_sub(paused)
    }

    fn stats(&self, status: SessionStatus, format: &StreamFormat) -> SessionStats {
        SessionStats {
            status,
            elapsed_secs: self.active_elapsed().as_secs_f64(),
            recorded_secs: self.counters.sample_frames() as f64 / format.sample_rate as f64,
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            dropped_frames: self.queue.dropped_frames(),
            segments_written: self.counters.segments(),
            bytes_written: self.counters.bytes(),
            callback_errors: self.producer.callback_errors.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors(),
        }
    }

    /// Stop accepting frames and wait (bounded) for the consumer to drain.
    /// Returns `false` on timeout.
    fn stop_consumer(&mut self, timeout: Duration) -> bool {
        self.producer.recording.store(false, Ordering::Relaxed);
        match self.consumer.take() {
            Some(consumer) => consumer.stop(timeout),
            None => true,
        }
    }

    /// Patch the header and checksum the file.
    ///
    /// If the consumer missed its stop deadline and is still running, the
    /// file is handed to it to finalize after its drain and `Ok(None)` is
    /// returned without waiting.
    fn finalize(&self, consumer_finished: bool) -> Result<Option<String>, CaptureError> {
        if !consumer_finished && self.writer.hand_off(Release::Finalize) {
            log::warn!(
                "Consumer still busy; it will finalize {} when it exits",
                self.file_path.display()
            );
            return Ok(None);
        }
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| CaptureError::Storage("output file already closed".into()))?;
        writer.close().map(Some)
    }

    /// Close and delete the output file, or have a busy consumer do it.
    fn discard(&self, consumer_finished: bool) {
        if !consumer_finished && self.writer.hand_off(Release::Discard) {
            return;
        }
        match self.writer.take() {
            Some(mut writer) => writer.discard(),
            None => {
                if let Err(e) = std::fs::remove_file(&self.file_path) {
                    log::warn!("Failed to remove {}: {}", self.file_path.display(), e);
                }
            }
        }
    }
}

struct SessionInner<P> {
    provider: P,
    state: SessionState,
    recording: Option<ActiveRecording>,
    /// Final counters of the last stopped session, kept until the next start.
    last_stats: Option<SessionStats>,
}

/// One encapsulated capture-to-disk pipeline.
///
/// Data flow:
/// ```text
/// [CaptureProvider callback] → copy → [FrameQueue] → [consumer thread] → [WavFileWriter]
/// ```
///
/// All lifecycle methods take `&self` and are serialized by one coarse
/// lifecycle lock, so a session can be shared via `Arc` between a UI
/// thread and a hotkey thread. The lock is never taken by the audio
/// callback. Sessions hold no global state; any number can coexist.
pub struct CaptureSession<P: CaptureProvider> {
    config: SessionConfig,
    format: StreamFormat,
    notifier: StatusNotifier,
    inner: Mutex<SessionInner<P>>,
}

impl<P: CaptureProvider> CaptureSession<P> {
    pub fn new(provider: P, config: SessionConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        Ok(Self {
            format: config.format(),
            config,
            notifier: StatusNotifier::default(),
            inner: Mutex::new(SessionInner {
                provider,
                state: SessionState::Idle,
                recording: None,
                last_stats: None,
            }),
        })
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn CaptureDelegate>) -> Self {
        self.set_delegate(delegate);
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.notifier.set_delegate(delegate);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn device_info(&self) -> AudioSource {
        self.inner.lock().provider.device_info()
    }

    /// Statistics snapshot, taken under the lifecycle lock.
    ///
    /// After `stop` the final counters of that session are reported with
    /// status `idle` until the next `start` resets them.
    pub fn stats(&self) -> SessionStats {
        let inner = self.inner.lock();
        match (&inner.recording, &inner.last_stats) {
            (Some(recording), _) => recording.stats(inner.state.status(), &self.format),
            (None, Some(last)) => last.clone(),
            (None, None) => SessionStats::idle(self.config.queue_capacity),
        }
    }

    /// Start a new recording. Transitions: idle/stopped → recording.
    ///
    /// The consumer is running before the device is opened, so the first
    /// frames always find a drained queue. Any setup failure releases
    /// everything acquired so far and deletes the partial file.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            return Err(CaptureError::InvalidTransition {
                action: "start",
                state: inner.state,
            });
        }

        let mut recording = ActiveRecording::create(&self.config, self.format).map_err(|e| {
            log::error!("Failed to create output file: {}", e);
            e
        })?;

        match ConsumerHandle::spawn(
            recording.queue.clone(),
            Arc::clone(&recording.writer),
            Arc::clone(&recording.counters),
            self.config.poll_interval(),
        ) {
            Ok(consumer) => recording.consumer = Some(consumer),
            Err(e) => {
                log::error!("Failed to start consumer: {}", e);
                recording.discard(true);
                return Err(e);
            }
        }

        recording.producer.recording.store(true, Ordering::Relaxed);
        let callback = recording.frame_callback(self.format);
        if let Err(e) = inner.provider.open(&self.format, callback) {
            log::error!("Failed to open input device ({}): {}", self.format, e);
            inner.provider.close();
            let finished = recording.stop_consumer(self.config.stop_timeout());
            recording.discard(finished);
            return Err(e);
        }

        log::info!(
            "Recording started: {} ({}, device: {})",
            recording.file_path.display(),
            self.format,
            inner.provider.device_info().name
        );
        inner.recording = Some(recording);
        inner.last_stats = None;
        inner.state = SessionState::Recording;
        self.notifier.status(StatusEvent::Started);
        Ok(())
    }

    /// Pause capture. Transitions: recording → paused.
    ///
    /// The device stream is closed; the file, queue and consumer stay up so
    /// buffered frames keep draining.
    pub fn pause(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            return Err(CaptureError::InvalidTransition {
                action: "pause",
                state: inner.state,
            });
        }

        let SessionInner {
            provider,
            state,
            recording,
            ..
        } = &mut *inner;

        if let Some(recording) = recording.as_mut() {
            recording.producer.paused.store(true, Ordering::Relaxed);
            recording.paused_since = Some(Instant::now());
        }
        provider.close();
        *state = SessionState::Paused;

        log::info!("Recording paused");
        self.notifier.status(StatusEvent::Paused);
        Ok(())
    }

    /// Resume capture into the same file. Transitions: paused → recording.
    ///
    /// If the device cannot be reopened the session stays paused.
    pub fn resume(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_paused() {
            return Err(CaptureError::InvalidTransition {
                action: "resume",
                state: inner.state,
            });
        }

        let SessionInner {
            provider,
            state,
            recording,
            ..
        } = &mut *inner;

        let Some(recording) = recording.as_mut() else {
            return Err(CaptureError::InvalidTransition {
                action: "resume",
                state: *state,
            });
        };

        recording.producer.paused.store(false, Ordering::Relaxed);
        if let Err(e) = provider.open(&self.format, recording.frame_callback(self.format)) {
            log::error!("Failed to reopen input device: {}", e);
            recording.producer.paused.store(true, Ordering::Relaxed);
            provider.close();
            return Err(e);
        }

        if let Some(since) = recording.paused_since.take() {
            recording.paused_total += since.elapsed();
        }
        *state = SessionState::Recording;

        log::info!("Recording resumed");
        self.notifier.status(StatusEvent::Resumed);
        Ok(())
    }

    /// Stop and finalize the recording. Transitions: recording/paused → stopped.
    ///
    /// Returns `Ok(None)` when no recording is active. Waits at most
    /// `stop_timeout` for the consumer. Past that deadline the result is
    /// returned anyway with `checksum: None`; the detached consumer writes
    /// what it still holds and finalizes the file when it exits. The
    /// reported statistics are those at the deadline.
    pub fn stop(&self) -> Result<Option<RecordingResult>, CaptureError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return Ok(None);
        }

        inner.provider.close();
        let Some(mut recording) = inner.recording.take() else {
            inner.state = SessionState::Stopped;
            return Ok(None);
        };
        if let Some(since) = recording.paused_since.take() {
            recording.paused_total += since.elapsed();
        }

        let consumer_finished = recording.stop_consumer(self.config.stop_timeout());
        if !consumer_finished {
            self.notifier.error(&CaptureError::ConsumerTimeout);
        }

        let mut stats = recording.stats(SessionStatus::Idle, &self.format);
        stats.queue_depth = 0;
        inner.last_stats = Some(stats.clone());
        inner.state = SessionState::Stopped;

        let finalized = recording.finalize(consumer_finished);
        self.notifier.status(StatusEvent::Stopped);
        let checksum = finalized.map_err(|e| {
            log::error!("Failed to finalize {}: {}", recording.file_path.display(), e);
            e
        })?;

        let file_path_str = recording.file_path.to_string_lossy().into_owned();
        let metadata = RecordingMetadata::new(
            recording.id.to_string(),
            recording.created_at.to_rfc3339(),
            &self.format,
            &file_path_str,
            checksum.as_deref(),
            &stats,
        );
        if self.config.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &recording.file_path) {
                log::warn!("Failed to write metadata sidecar: {}", e);
            }
        }

        log::info!(
            "Recording stopped: {} ({:.2}s, {} segments, {} dropped)",
            file_path_str,
            stats.recorded_secs,
            stats.segments_written,
            stats.dropped_frames
        );

        let result = RecordingResult {
            file_path: recording.file_path.clone(),
            duration_secs: stats.recorded_secs,
            checksum,
            stats,
            metadata,
        };
        self.notifier.finished(&result);
        Ok(Some(result))
    }
}

impl<P: CaptureProvider> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        let keep = self.config.keep_abandoned_recordings;
        let stop_timeout = self.config.stop_timeout();
        let inner = self.inner.get_mut();

        inner.provider.close();
        let Some(mut recording) = inner.recording.take() else {
            return;
        };

        log::warn!(
            "Capture session dropped while {}; releasing {}",
            inner.state,
            recording.file_path.display()
        );
        let finished = recording.stop_consumer(stop_timeout);
        if keep {
            if let Err(e) = recording.finalize(finished) {
                log::error!("Failed to finalize abandoned recording: {}", e);
            }
        } else {
            recording.discard(finished);
        }
    }
}
