//! Input device enumeration via the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};

use voice_capture_core::models::audio_models::{AudioSource, SampleEncoding};
use voice_capture_core::models::error::CaptureError;

/// One supported configuration range of an input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFormatRange {
    pub channels: u16,
    pub min_sample_rate: u32,
    pub max_sample_rate: u32,
    /// `None` when the device format has no linear PCM counterpart here.
    pub encoding: Option<SampleEncoding>,
}

/// Lists and resolves input devices on the default host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List input devices. The default device is flagged.
    pub fn list_input_devices(&self) -> Result<Vec<AudioSource>, CaptureError> {
        let default_name = self.default_input_device_name();
        let devices = self
            .host
            .input_devices()
            .map_err(|e| CaptureError::Device(format!("failed to enumerate input devices: {}", e)))?;

        Ok(devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioSource {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect())
    }

    pub fn default_input_device_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Resolve a device by name, or the default input device for `None`.
    pub fn find_input_device(&self, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
        match name {
            Some(name) => self
                .host
                .input_devices()
                .map_err(|e| CaptureError::Device(format!("failed to enumerate input devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or(CaptureError::DeviceNotAvailable),
            None => self
                .host
                .default_input_device()
                .ok_or(CaptureError::DeviceNotAvailable),
        }
    }

    /// Supported configuration ranges of a device.
    pub fn supported_input_formats(&self, name: Option<&str>) -> Result<Vec<InputFormatRange>, CaptureError> {
        let device = self.find_input_device(name)?;
        let configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::Device(format!("failed to query input configs: {}", e)))?;

        Ok(configs
            .map(|range| InputFormatRange {
                channels: range.channels(),
                min_sample_rate: range.min_sample_rate().0,
                max_sample_rate: range.max_sample_rate().0,
                encoding: encoding_for(range.sample_format()),
            })
            .collect())
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

/// cpal sample format for a stream encoding.
pub fn sample_format_for(encoding: SampleEncoding) -> cpal::SampleFormat {
    match encoding {
        SampleEncoding::Int16 => cpal::SampleFormat::I16,
        SampleEncoding::Int32 => cpal::SampleFormat::I32,
        SampleEncoding::Float32 => cpal::SampleFormat::F32,
    }
}

pub fn encoding_for(format: cpal::SampleFormat) -> Option<SampleEncoding> {
    match format {
        cpal::SampleFormat::I16 => Some(SampleEncoding::Int16),
        cpal::SampleFormat::I32 => Some(SampleEncoding::Int32),
        cpal::SampleFormat::F32 => Some(SampleEncoding::Float32),
        _ => None,
    }
}
