use thiserror::Error;

use super::state::SessionState;

/// Errors that can occur during capture operations.
///
/// Dropped frames are deliberately absent: a full queue is backpressure,
/// counted in [`SessionStats::dropped_frames`](super::state::SessionStats),
/// never an error value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no matching input device available")]
    DeviceNotAvailable,

    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("consumer thread did not finish within the stop timeout")]
    ConsumerTimeout,
}

impl CaptureError {
    /// Whether this error originates from the input device (no device,
    /// unsupported parameters, or a backend failure).
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotAvailable | Self::UnsupportedFormat(_) | Self::Device(_)
        )
    }
}
