use std::fmt;

use serde::{Deserialize, Serialize};

/// Sample encoding of the linear PCM stream delivered by the device and
/// written to disk unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Signed 16-bit integer (`PCM_16`).
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// 32-bit IEEE float.
    Float32,
}

impl SampleEncoding {
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            Self::Int16 => 16,
            Self::Int32 | Self::Float32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    /// WAVE `fmt ` format tag: 1 = integer PCM, 3 = IEEE float.
    pub fn wav_format_tag(&self) -> u16 {
        match self {
            Self::Int16 | Self::Int32 => 1,
            Self::Float32 => 3,
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Float32 => "f32",
        };
        f.write_str(name)
    }
}

/// Parameters a capture provider is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding: SampleEncoding,
}

impl StreamFormat {
    /// Bytes per interleaved sample frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.bytes_per_frame() as u32
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            encoding: SampleEncoding::Int16,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch, {}", self.sample_rate, self.channels, self.encoding)
    }
}

/// An input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}
