//! Persistence consumer: drains the frame queue into the output file.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Mutex, MutexGuard};

use crate::models::error::CaptureError;
use crate::processing::frame::AudioFrame;
use crate::processing::frame_queue::FrameQueue;
use crate::storage::wav_writer::WavFileWriter;

const OWNED: u8 = 0;
const FINALIZE_ON_EXIT: u8 = 1;
const DISCARD_ON_EXIT: u8 = 2;
const CONSUMER_EXITED: u8 = 3;

/// What a consumer that outlived `stop` does with the file when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Finalize,
    Discard,
}

/// Output writer shared between the consumer and the session.
///
/// The slot is `None` once the file has been closed. Whoever closes it is
/// decided by a single compare-and-swap: the session hands the file off to
/// a consumer that is still running, or the consumer marks itself exited
/// and leaves the file to the session. Exactly one side wins.
pub struct SharedWriter {
    slot: Mutex<Option<WavFileWriter>>,
    handoff: AtomicU8,
}

impl SharedWriter {
    pub fn new(writer: WavFileWriter) -> Self {
        Self {
            slot: Mutex::new(Some(writer)),
            handoff: AtomicU8::new(OWNED),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Option<WavFileWriter>> {
        self.slot.lock()
    }

    /// Ask the consumer to release the file when it exits.
    ///
    /// Returns `false` if the consumer has already exited; the caller then
    /// owns the writer and must release it itself.
    pub fn hand_off(&self, release: Release) -> bool {
        let code = match release {
            Release::Finalize => FINALIZE_ON_EXIT,
            Release::Discard => DISCARD_ON_EXIT,
        };
        self.handoff
            .compare_exchange(OWNED, code, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the writer out of the slot.
    pub fn take(&self) -> Option<WavFileWriter> {
        self.slot.lock().take()
    }

    /// Called by the consumer as its last action.
    fn release_on_exit(&self) {
        let requested = match self.handoff.compare_exchange(
            OWNED,
            CONSUMER_EXITED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return,
            Err(code) => code,
        };

        let Some(mut writer) = self.take() else {
            return;
        };
        match requested {
            FINALIZE_ON_EXIT => match writer.close() {
                Ok(checksum) => log::info!(
                    "Finalized {} after stop (sha256 {})",
                    writer.file_path().display(),
                    checksum
                ),
                Err(e) => log::error!(
                    "Failed to finalize {} after stop: {}",
                    writer.file_path().display(),
                    e
                ),
            },
            _ => writer.discard(),
        }
    }
}

/// Counters updated by the consumer thread, read by stats snapshots.
#[derive(Debug, Default)]
pub struct WriteCounters {
    segments: AtomicU64,
    sample_frames: AtomicU64,
    bytes: AtomicU64,
    write_errors: AtomicU64,
}

impl WriteCounters {
    /// Frames appended to the file.
    pub fn segments(&self) -> u64 {
        self.segments.load(Ordering::Relaxed)
    }

    /// Interleaved sample frames appended to the file.
    pub fn sample_frames(&self) -> u64 {
        self.sample_frames.load(Ordering::Relaxed)
    }

    /// PCM bytes appended to the file.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }
}

/// Handle to a running consumer thread.
pub struct ConsumerHandle {
    running: Arc<AtomicBool>,
    done_rx: Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Spawn the consumer. It runs until [`ConsumerHandle::stop`].
    pub fn spawn(
        queue: FrameQueue,
        writer: Arc<SharedWriter>,
        counters: Arc<WriteCounters>,
        poll_interval: Duration,
    ) -> Result<Self, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let loop_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("capture-consumer".into())
            .spawn(move || {
                run_consumer(&loop_running, &queue, &writer, &counters, poll_interval);
                writer.release_on_exit();
                let _ = done_tx.send(());
            })
            .map_err(|e| CaptureError::Storage(format!("failed to spawn consumer thread: {}", e)))?;

        Ok(Self {
            running,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Signal the consumer to finish and wait up to `timeout` for it.
    ///
    /// Returns `false` if the deadline passed; the thread is then detached
    /// and may still be finishing its current write.
    pub fn stop(mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::Release);

        let finished = match self.done_rx.recv_timeout(timeout) {
            Ok(()) => true,
            // Sender dropped without a signal: the thread panicked.
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        if let Some(handle) = self.handle.take() {
            if finished {
                if handle.join().is_err() {
                    log::error!("Consumer thread panicked");
                }
            } else {
                log::error!(
                    "Consumer thread did not finish within {:?}; detaching it",
                    timeout
                );
            }
        }
        finished
    }
}

fn run_consumer(
    running: &AtomicBool,
    queue: &FrameQueue,
    writer: &SharedWriter,
    counters: &WriteCounters,
    poll_interval: Duration,
) {
    log::debug!("Consumer started (capacity {})", queue.capacity());
    let mut reported_drops = 0u64;

    while running.load(Ordering::Acquire) {
        if let Some(frame) = queue.pop(poll_interval) {
            write_frame(frame, writer, counters);
        }

        let dropped = queue.dropped_frames();
        if dropped > 0 && reported_drops == 0 {
            log::warn!("Frame queue full, dropping frames (consumer falling behind)");
        }
        reported_drops = dropped;
    }

    // Frames pushed just before stop are still written; once the file is
    // closed the rest are discarded.
    let mut drained = 0usize;
    let mut discarded = 0usize;
    while let Some(frame) = queue.try_pop() {
        if write_frame(frame, writer, counters) {
            drained += 1;
        } else {
            discarded += 1;
        }
    }
    log::debug!(
        "Consumer exiting: drained {} frames, discarded {}",
        drained,
        discarded
    );
}

/// Append one frame. Returns `false` if the file is already closed.
fn write_frame(frame: AudioFrame, writer: &SharedWriter, counters: &WriteCounters) -> bool {
    let mut guard = writer.lock();
    let Some(w) = guard.as_mut() else {
        return false;
    };

    match w.write_samples(frame.samples()) {
        Ok(written) => {
            counters.segments.fetch_add(1, Ordering::Relaxed);
            counters
                .sample_frames
                .fetch_add(frame.sample_frames() as u64, Ordering::Relaxed);
            counters.bytes.fetch_add(written as u64, Ordering::Relaxed);
        }
        Err(e) => {
            let errors = counters.write_errors.fetch_add(1, Ordering::Relaxed) + 1;
            if errors == 1 || errors % 100 == 0 {
                log::error!("Failed to write audio data ({} failures): {}", errors, e);
            }
        }
    }
    true
}
