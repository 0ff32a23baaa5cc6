//! WAV file format utilities.
//!
//! Generates the canonical 44-byte RIFF header for linear PCM (integer or
//! IEEE float) and patches its size fields once a recording is finalized.

use crate::models::audio_models::{SampleEncoding, StreamFormat};

/// Size of the canonical WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Generate a 44-byte WAV RIFF header.
///
/// Layout (all fields little-endian):
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (fmt chunk size)
/// [20-21]  format tag (1 = PCM, 3 = IEEE float)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits / 8
/// [32-33]  block_align = channels * bits / 8
/// [34-35]  bits per sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &StreamFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let bit_depth = format.encoding.bits_per_sample();
    let block_align = format.channels * bit_depth / 8;
    let byte_rate = format.sample_rate * block_align as u32;
    let chunk_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_SIZE];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format.encoding.wav_format_tag().to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Patch the RIFF chunk size at offset 4 (total file size - 8).
pub fn patch_file_size(header: &mut [u8], total_file_size: u64) {
    let chunk_size = clamp_u32(total_file_size.saturating_sub(8));
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
}

/// Patch the data chunk size at offset 40.
pub fn patch_data_size(header: &mut [u8], data_size: u64) {
    header[40..44].copy_from_slice(&clamp_u32(data_size).to_le_bytes());
}

/// RIFF sizes are 32-bit; recordings beyond 4 GiB saturate rather than wrap.
pub(crate) fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

/// Fields decoded from a canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeaderInfo {
    pub format: StreamFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    pub riff_size: u32,
    pub data_size: u32,
}

/// Parse a canonical header as produced by [`generate_wav_header`].
///
/// Returns `None` for anything that is not a 44-byte PCM/float RIFF header.
pub fn parse_wav_header(bytes: &[u8]) -> Option<WavHeaderInfo> {
    if bytes.len() < WAV_HEADER_SIZE
        || &bytes[0..4] != b"RIFF"
        || &bytes[8..12] != b"WAVE"
        || &bytes[12..16] != b"fmt "
        || &bytes[36..40] != b"data"
    {
        return None;
    }

    let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

    let encoding = match (u16_at(20), u16_at(34)) {
        (1, 16) => SampleEncoding::Int16,
        (1, 32) => SampleEncoding::Int32,
        (3, 32) => SampleEncoding::Float32,
        _ => return None,
    };

    Some(WavHeaderInfo {
        format: StreamFormat {
            sample_rate: u32_at(24),
            channels: u16_at(22),
            encoding,
        },
        byte_rate: u32_at(28),
        block_align: u16_at(32),
        riff_size: u32_at(4),
        data_size: u32_at(40),
    })
}
