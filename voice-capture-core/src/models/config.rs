use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{SampleEncoding, StreamFormat};
use super::error::CaptureError;

/// Queue slots; at 2048-frame blocks and 16 kHz this is roughly 25 seconds
/// of audio, bounding memory during a disk stall.
pub const DEFAULT_QUEUE_CAPACITY: usize = 200;

/// Configuration for a capture session. Fixed for the lifetime of a
/// `CaptureSession`.
///
/// Every field has a default, so partial JSON documents are accepted:
/// ```json
/// { "sample_rate": 48000, "channels": 2, "output_directory": "/tmp/rec" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sample rate in Hz (default: 16000).
    pub sample_rate: u32,

    /// Interleaved channel count (default: 1).
    pub channels: u16,

    /// Sample encoding requested from the device and written to disk
    /// (default: 16-bit signed).
    pub encoding: SampleEncoding,

    /// Frame queue slots before frames are dropped.
    pub queue_capacity: usize,

    /// Directory where recording files are written (default: system temp dir).
    pub output_directory: PathBuf,

    /// File name prefix, followed by a timestamp and short id.
    pub file_prefix: String,

    /// Consumer pop timeout in milliseconds.
    pub poll_interval_ms: u64,

    /// Upper bound on how long `stop` waits for the consumer.
    pub stop_timeout_ms: u64,

    /// Write a `.metadata.json` sidecar next to each finished recording.
    pub write_metadata: bool,

    /// Keep the file of a session dropped without `stop` instead of deleting it.
    pub keep_abandoned_recordings: bool,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        if !(1..=8).contains(&self.channels) {
            return Err(CaptureError::InvalidConfiguration(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        if self.queue_capacity == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "poll interval must be positive".into(),
            ));
        }
        if self.stop_timeout_ms == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "stop timeout must be positive".into(),
            ));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(CaptureError::InvalidConfiguration(
                "file prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            encoding: self.encoding,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfiguration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::InvalidConfiguration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            encoding: SampleEncoding::Int16,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_directory: std::env::temp_dir(),
            file_prefix: "recording".into(),
            poll_interval_ms: 100,
            stop_timeout_ms: 2_000,
            write_metadata: false,
            keep_abandoned_recordings: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.format(), StreamFormat::default());
        assert_eq!(config.stop_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = SessionConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_bad_channels_and_rate() {
        let no_channels = SessionConfig {
            channels: 0,
            ..Default::default()
        };
        assert!(no_channels.validate().is_err());

        let no_rate = SessionConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(no_rate.validate().is_err());
    }

    #[test]
    fn rejects_zero_stop_timeout() {
        let config = SessionConfig {
            stop_timeout_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            CaptureError::InvalidConfiguration("stop timeout must be positive".into())
        );

        let err = SessionConfig::from_json_str(r#"{ "stop_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{ "sample_rate": 48000, "encoding": "float32" }"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.encoding, SampleEncoding::Float32);
        assert_eq!(config.channels, 1);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        let err = SessionConfig::from_json_str(r#"{ "queue_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));

        let err = SessionConfig::from_json_str("not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
