//! # voice-capture-cpal
//!
//! cpal input backend for voice-capture.
//!
//! Provides:
//! - `CpalInputCapture`: default or named input device capture via cpal
//! - `DeviceEnumerator`: input device listing and format queries
//!
//! The `voice-capture` binary in this crate records to WAV from the command
//! line.
//!
//! ## Usage
//! ```no_run
//! use voice_capture_core::{CaptureSession, SessionConfig};
//! use voice_capture_cpal::CpalInputCapture;
//!
//! let session = CaptureSession::new(CpalInputCapture::default_device(), SessionConfig::default())?;
//! session.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! let result = session.stop()?;
//! # Ok::<(), voice_capture_core::CaptureError>(())
//! ```

pub mod cpal_input;
pub mod device_enumerator;

pub use cpal_input::CpalInputCapture;
pub use device_enumerator::{DeviceEnumerator, InputFormatRange};
