use std::fmt;

use serde::{Deserialize, Serialize};

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording ⇄ paused
///            ↓          ↓
///          stopped ← ───┘
/// ```
/// `Stopped` is terminal for one recording but the session is reusable:
/// `start` accepts it exactly like `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Recording or paused: a file, queue and consumer exist.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Recording => SessionStatus::Recording,
            Self::Paused => SessionStatus::Paused,
            Self::Idle | Self::Stopped => SessionStatus::Idle,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Coarse status reported to UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Recording,
    Paused,
}

/// Lifecycle notification emitted once per successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
    Started,
    Paused,
    Resumed,
    Stopped,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time statistics for a session.
///
/// Callers should watch `dropped_frames` over time: a growing count means
/// the consumer cannot keep up with the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub status: SessionStatus,
    /// Wall-clock time since `start`, excluding paused intervals.
    pub elapsed_secs: f64,
    /// Duration of the audio actually written to the file.
    pub recorded_secs: f64,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub dropped_frames: u64,
    pub segments_written: u64,
    pub bytes_written: u64,
    pub callback_errors: u64,
    pub write_errors: u64,
}

impl SessionStats {
    pub fn idle(queue_capacity: usize) -> Self {
        Self {
            status: SessionStatus::Idle,
            elapsed_secs: 0.0,
            recorded_secs: 0.0,
            queue_depth: 0,
            queue_capacity,
            dropped_frames: 0,
            segments_written: 0,
            bytes_written: 0,
            callback_errors: 0,
            write_errors: 0,
        }
    }
}
