use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::StatusEvent;

/// Receiver of session lifecycle notifications.
///
/// Methods are called synchronously from inside the lifecycle operation
/// that caused them, with the lifecycle lock held. Implementations must
/// return quickly and must not call back into the session.
pub trait CaptureDelegate: Send + Sync {
    /// Called once per successful transition.
    fn on_status(&self, event: &StatusEvent);

    /// Called for non-fatal problems such as a consumer stop timeout.
    fn on_error(&self, _error: &CaptureError) {}

    /// Called when a recording file has been finalized.
    fn on_capture_finished(&self, _result: &RecordingResult) {}
}

impl<F> CaptureDelegate for F
where
    F: Fn(&StatusEvent) + Send + Sync,
{
    fn on_status(&self, event: &StatusEvent) {
        self(event)
    }
}
