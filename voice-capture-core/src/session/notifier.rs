use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::StatusEvent;
use crate::traits::capture_delegate::CaptureDelegate;

/// Fire-and-forget dispatch to an optional [`CaptureDelegate`].
///
/// There is no queue and no backpressure: the delegate runs inline. A
/// panicking delegate is caught and logged so it cannot unwind through a
/// half-finished lifecycle transition.
#[derive(Clone, Default)]
pub struct StatusNotifier {
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl StatusNotifier {
    pub fn new(delegate: Arc<dyn CaptureDelegate>) -> Self {
        Self {
            delegate: Some(delegate),
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn status(&self, event: StatusEvent) {
        self.dispatch("on_status", |d| d.on_status(&event));
    }

    pub fn error(&self, error: &CaptureError) {
        self.dispatch("on_error", |d| d.on_error(error));
    }

    pub fn finished(&self, result: &RecordingResult) {
        self.dispatch("on_capture_finished", |d| d.on_capture_finished(result));
    }

    fn dispatch(&self, method: &str, call: impl FnOnce(&dyn CaptureDelegate)) {
        let Some(ref delegate) = self.delegate else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| call(&**delegate))).is_err() {
            log::error!("Capture delegate panicked in {}", method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn closure_delegate_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let notifier = StatusNotifier::new(Arc::new(move |event: &StatusEvent| {
            sink.lock().push(*event);
        }));

        notifier.status(StatusEvent::Started);
        notifier.status(StatusEvent::Stopped);
        notifier.error(&CaptureError::ConsumerTimeout);

        assert_eq!(*seen.lock(), vec![StatusEvent::Started, StatusEvent::Stopped]);
    }

    #[test]
    fn panicking_delegate_is_contained() {
        let notifier = StatusNotifier::new(Arc::new(|_: &StatusEvent| panic!("ui went away")));
        notifier.status(StatusEvent::Paused);
    }

    #[test]
    fn no_delegate_is_a_no_op() {
        let notifier = StatusNotifier::default();
        assert!(!notifier.has_delegate());
        notifier.status(StatusEvent::Started);
    }
}
