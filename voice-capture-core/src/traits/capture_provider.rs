use std::sync::Arc;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::error::CaptureError;
use crate::processing::frame::SampleSlice;

/// Callback invoked with each chunk the device delivers.
///
/// Runs on a thread owned by the audio subsystem. It must not block, take
/// locks other components can hold, perform I/O, or panic.
pub type FrameCallback = Arc<dyn Fn(SampleSlice<'_>) + Send + Sync + 'static>;

/// A hardware (or synthetic) input stream.
///
/// Implemented by:
/// - `CpalInputCapture` (voice-capture-cpal)
/// - `SyntheticCapture` (this crate)
pub trait CaptureProvider: Send {
    /// Whether a usable input device currently exists.
    fn is_available(&self) -> bool;

    /// Open the input stream and start delivering chunks to `on_frame`.
    ///
    /// Fails with `DeviceNotAvailable` when no device matches and with
    /// `UnsupportedFormat` when the device cannot deliver `format`.
    fn open(&mut self, format: &StreamFormat, on_frame: FrameCallback) -> Result<(), CaptureError>;

    /// Stop delivery and release the stream. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioSource;
}
