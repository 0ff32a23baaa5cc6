//! # voice-capture-core
//!
//! Device-agnostic capture-to-disk pipeline.
//!
//! Provides the bounded frame queue, the persistence consumer, WAV output
//! and the session lifecycle (start / pause / resume / stop). Device
//! backends implement the `CaptureProvider` trait and plug into the
//! generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! voice-capture-core (this crate)
//! ├── traits/       ← CaptureProvider, CaptureDelegate
//! ├── models/       ← CaptureError, SessionState, SessionConfig, StreamFormat, RecordingResult
//! ├── processing/   ← AudioFrame, FrameQueue, WAV header generation
//! ├── session/      ← CaptureSession, persistence consumer, StatusNotifier
//! ├── storage/      ← WavFileWriter, metadata sidecar
//! └── providers/    ← SyntheticCapture (device-free source)
//! ```
//!
//! ## Usage
//! ```no_run
//! use voice_capture_core::{CaptureSession, SessionConfig, SyntheticCapture};
//!
//! let session = CaptureSession::new(SyntheticCapture::silence(), SessionConfig::default())?;
//! session.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! if let Some(result) = session.stop()? {
//!     println!("wrote {}", result.file_path.display());
//! }
//! # Ok::<(), voice_capture_core::CaptureError>(())
//! ```

pub mod models;
pub mod processing;
pub mod providers;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioSource, SampleEncoding, StreamFormat};
pub use models::config::SessionConfig;
pub use models::error::CaptureError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{SessionState, SessionStats, SessionStatus, StatusEvent};
pub use processing::frame::{AudioFrame, SampleBuffer, SampleSlice};
pub use processing::frame_queue::FrameQueue;
pub use providers::synthetic::{SyntheticCapture, SyntheticSignal};
pub use session::capture_session::CaptureSession;
pub use session::notifier::StatusNotifier;
pub use storage::metadata::{read_metadata, write_metadata};
pub use storage::wav_writer::WavFileWriter;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_provider::{CaptureProvider, FrameCallback};
