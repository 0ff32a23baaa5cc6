use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::StreamFormat;
use crate::models::error::CaptureError;
use crate::processing::frame::SampleBuffer;
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};

/// Streaming WAV file writer.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes zero until close]
/// [little-endian PCM data...]
/// ```
///
/// The header is written on `open` so that even a session stopped before
/// any frame arrives produces a readable file.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: StreamFormat,
    file: Option<BufWriter<File>>,
    total_bytes_written: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, format: StreamFormat) -> Self {
        Self {
            file_path,
            format,
            file: None,
            total_bytes_written: 0,
        }
    }

    /// Create the file and write the placeholder header.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| CaptureError::Storage(format!("failed to create file: {}", e)))?;
        self.file = Some(BufWriter::new(file));
        self.total_bytes_written = 0;

        let header = wav_format::generate_wav_header(&self.format, 0);
        self.write_raw(&header)
    }

    /// Append PCM data.
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        if self.file.is_none() {
            return Err(CaptureError::Storage("file is not open for writing".into()));
        }
        self.write_raw(data)
    }

    /// Append samples as little-endian PCM without an intermediate byte
    /// buffer. Returns the number of bytes written.
    pub fn write_samples(&mut self, samples: &SampleBuffer) -> Result<usize, CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::Storage("file is not open for writing".into()))?;
        samples
            .write_le(file)
            .map_err(|e| CaptureError::Storage(format!("write failed: {}", e)))?;
        let written = samples.byte_len();
        self.total_bytes_written += written as u64;
        Ok(written)
    }

    /// Finalize the file: patch RIFF and data sizes, flush, and return the
    /// SHA-256 checksum of the completed file.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        let writer = self
            .file
            .take()
            .ok_or_else(|| CaptureError::Storage("file is not open".into()))?;

        let mut file = writer
            .into_inner()
            .map_err(|e| CaptureError::Storage(format!("flush failed: {}", e.error())))?;

        let data_size = self.data_bytes_written();
        let riff_size = wav_format::clamp_u32(self.total_bytes_written.saturating_sub(8));
        let storage_err = |e: io::Error| CaptureError::Storage(e.to_string());

        file.seek(SeekFrom::Start(4)).map_err(storage_err)?;
        file.write_all(&riff_size.to_le_bytes()).map_err(storage_err)?;
        file.seek(SeekFrom::Start(40)).map_err(storage_err)?;
        file.write_all(&wav_format::clamp_u32(data_size).to_le_bytes())
            .map_err(storage_err)?;
        file.sync_all().map_err(storage_err)?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Close without finalizing and remove the file from disk.
    pub fn discard(&mut self) {
        self.file = None;
        if let Err(e) = fs::remove_file(&self.file_path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {}", self.file_path.display(), e);
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    /// PCM bytes written so far (excluding WAV header).
    pub fn data_bytes_written(&self) -> u64 {
        self.total_bytes_written.saturating_sub(WAV_HEADER_SIZE as u64)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::Storage("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::Storage(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Compute the SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)
        .map_err(|e| CaptureError::Storage(format!("failed to open file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::Storage(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
