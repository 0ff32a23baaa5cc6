use std::io::{self, Write};
use std::time::Instant;

use crate::models::audio_models::{SampleEncoding, StreamFormat};

/// Interleaved samples borrowed from the driver for the duration of one
/// callback. The driver reuses this memory on its next delivery.
#[derive(Debug, Clone, Copy)]
pub enum SampleSlice<'a> {
    Int16(&'a [i16]),
    Int32(&'a [i32]),
    Float32(&'a [f32]),
}

impl SampleSlice<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Int16(s) => s.len(),
            Self::Int32(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoding(&self) -> SampleEncoding {
        match self {
            Self::Int16(_) => SampleEncoding::Int16,
            Self::Int32(_) => SampleEncoding::Int32,
            Self::Float32(_) => SampleEncoding::Float32,
        }
    }

    /// Deep copy into an owned buffer. This is the single allocation made
    /// on the callback path.
    pub fn to_buffer(&self) -> SampleBuffer {
        match self {
            Self::Int16(s) => SampleBuffer::Int16(s.to_vec()),
            Self::Int32(s) => SampleBuffer::Int32(s.to_vec()),
            Self::Float32(s) => SampleBuffer::Float32(s.to_vec()),
        }
    }
}

/// Owned interleaved samples.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::Int16(s) => s.len(),
            Self::Int32(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoding(&self) -> SampleEncoding {
        match self {
            Self::Int16(_) => SampleEncoding::Int16,
            Self::Int32(_) => SampleEncoding::Int32,
            Self::Float32(_) => SampleEncoding::Float32,
        }
    }

    /// Serialized size in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.encoding().bytes_per_sample()
    }

    /// Serialize as little-endian linear PCM, as stored in a WAV `data`
    /// chunk. Meant for a buffered writer.
    pub fn write_le<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Self::Int16(s) => s.iter().try_for_each(|v| out.write_all(&v.to_le_bytes())),
            Self::Int32(s) => s.iter().try_for_each(|v| out.write_all(&v.to_le_bytes())),
            Self::Float32(s) => s.iter().try_for_each(|v| out.write_all(&v.to_le_bytes())),
        }
    }
}

/// One driver-delivered chunk of audio, copied out of driver memory.
///
/// Immutable once created: the queue slot owns it until the consumer pops
/// it, then the consumer owns it until it is written.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: SampleBuffer,
    channels: u16,
    captured_at: Instant,
    sequence: u64,
    duration_secs: f64,
}

impl AudioFrame {
    pub fn new(samples: SampleBuffer, format: &StreamFormat, sequence: u64) -> Self {
        let channels = format.channels.max(1);
        let sample_frames = samples.len() / channels as usize;
        let duration_secs = sample_frames as f64 / format.sample_rate as f64;
        Self {
            samples,
            channels,
            captured_at: Instant::now(),
            sequence,
            duration_secs,
        }
    }

    /// Copy borrowed driver data into a new frame.
    pub fn copy_from(slice: SampleSlice<'_>, format: &StreamFormat, sequence: u64) -> Self {
        Self::new(slice.to_buffer(), format, sequence)
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Arrival order within the session, assigned by the producer callback.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Interleaved frames (one sample per channel) in this chunk.
    pub fn sample_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn duration_from_sample_count() {
        let format = StreamFormat::default();
        let frame = AudioFrame::new(SampleBuffer::Int16(vec![0; 2048]), &format, 0);
        assert_eq!(frame.sample_frames(), 2048);
        assert_relative_eq!(frame.duration_secs(), 0.128);
    }

    #[test]
    fn stereo_duration_counts_frames_not_samples() {
        let format = StreamFormat {
            sample_rate: 48_000,
            channels: 2,
            encoding: SampleEncoding::Float32,
        };
        let frame = AudioFrame::new(SampleBuffer::Float32(vec![0.0; 960]), &format, 3);
        assert_eq!(frame.sample_frames(), 480);
        assert_relative_eq!(frame.duration_secs(), 0.01);
        assert_eq!(frame.sequence(), 3);
    }

    #[test]
    fn copy_is_independent_of_driver_memory() {
        let format = StreamFormat::default();
        let mut driver = vec![1i16, 2, 3];
        let frame = AudioFrame::copy_from(SampleSlice::Int16(&driver), &format, 0);
        driver.iter_mut().for_each(|s| *s = 0);
        assert_eq!(frame.samples(), &SampleBuffer::Int16(vec![1, 2, 3]));
    }

    #[test]
    fn little_endian_serialization() {
        let buf = SampleBuffer::Int16(vec![1, -2]);
        assert_eq!(buf.byte_len(), 4);
        let mut out = Vec::new();
        buf.write_le(&mut out).unwrap();
        assert_eq!(out, vec![0x01, 0x00, 0xFE, 0xFF]);

        let float = SampleBuffer::Float32(vec![1.0]);
        let mut out = Vec::new();
        float.write_le(&mut out).unwrap();
        assert_eq!(out, 1.0f32.to_le_bytes().to_vec());
    }
}
