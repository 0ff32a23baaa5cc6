use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::frame::AudioFrame;

/// Bounded FIFO between the producer callback and the persistence consumer.
///
/// Overflow behavior: the incoming frame is rejected and counted. The
/// producer never blocks and never learns about the rejection beyond the
/// boolean result. Slots are preallocated by the bounded channel, so a push
/// moves the frame without further allocation.
///
/// Clones share the same channel and dropped-frame counter.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    sender: Sender<AudioFrame>,
    receiver: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Push without blocking. Returns `false` and bumps the dropped-frame
    /// counter when the queue is full.
    pub fn try_push(&self, frame: AudioFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Wait up to `timeout` for the next frame.
    pub fn pop(&self, timeout: Duration) -> Option<AudioFrame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take the next frame if one is already queued.
    pub fn try_pop(&self) -> Option<AudioFrame> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sender.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames rejected because the queue was full. Only ever increases.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
