use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::{SampleEncoding, StreamFormat};
use super::state::SessionStats;

/// Result returned when a capture session stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    /// `None` when the consumer finalizes the file after `stop` returned.
    pub checksum: Option<String>,
    pub stats: SessionStats,
    pub metadata: RecordingMetadata,
}

/// Metadata stored alongside a recording.
///
/// Serializable for JSON export to downstream consumers (transcription,
/// history storage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
    pub segments: u64,
    pub dropped_frames: u64,
}

impl RecordingMetadata {
    pub fn new(
        id: String,
        created_at: String,
        format: &StreamFormat,
        file_path: &str,
        checksum: Option<&str>,
        stats: &SessionStats,
    ) -> Self {
        Self {
            id,
            created_at,
            duration_secs: stats.recorded_secs,
            file_path: file_path.to_string(),
            checksum: checksum.map(str::to_string),
            sample_rate: format.sample_rate,
            channels: format.channels,
            encoding: format.encoding,
            segments: stats.segments_written,
            dropped_frames: stats.dropped_frames,
        }
    }
}
