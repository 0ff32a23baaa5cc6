//! cpal input capture provider.
//!
//! Opens an input stream on the default (or a named) device in the exact
//! format the session asks for and forwards every driver buffer to the
//! session's frame callback.

use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SizedSample, StreamConfig};
use crossbeam_channel::Sender;

use voice_capture_core::models::audio_models::{AudioSource, SampleEncoding, StreamFormat};
use voice_capture_core::models::error::CaptureError;
use voice_capture_core::processing::frame::SampleSlice;
use voice_capture_core::traits::capture_provider::{CaptureProvider, FrameCallback};

use crate::device_enumerator::{sample_format_for, DeviceEnumerator};

/// Input capture through cpal.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream is built,
/// played and dropped on a dedicated holder thread. `open` blocks until
/// that thread reports whether the stream started; `close` signals it and
/// joins.
pub struct CpalInputCapture {
    device_name: Option<String>,
    buffer_frames: Option<u32>,
    stop_tx: Option<Sender<()>>,
    holder: Option<thread::JoinHandle<()>>,
}

impl CpalInputCapture {
    /// Capture from the system default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            buffer_frames: None,
            stop_tx: None,
            holder: None,
        }
    }

    /// Capture from the input device with this exact name.
    pub fn with_device(name: impl Into<String>) -> Self {
        let mut capture = Self::default_device();
        capture.device_name = Some(name.into());
        capture
    }

    /// Request a fixed driver buffer size in frames instead of the host default.
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = Some(frames);
        self
    }
}

impl CaptureProvider for CpalInputCapture {
    fn is_available(&self) -> bool {
        DeviceEnumerator::new()
            .find_input_device(self.device_name.as_deref())
            .is_ok()
    }

    fn open(&mut self, format: &StreamFormat, on_frame: FrameCallback) -> Result<(), CaptureError> {
        if self.holder.is_some() {
            return Err(CaptureError::Device("input stream already open".into()));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), CaptureError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let device_name = self.device_name.clone();
        let buffer_frames = self.buffer_frames;
        let format = *format;

        let holder = thread::Builder::new()
            .name("cpal-input-capture".into())
            .spawn(move || {
                let stream = match start_stream(device_name.as_deref(), &format, buffer_frames, on_frame) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Park until close() sends or drops the stop sender.
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    log::debug!("Failed to pause input stream before drop: {}", e);
                }
                drop(stream);
            })
            .map_err(|e| CaptureError::Device(format!("failed to spawn capture thread: {}", e)))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Device("capture thread exited during setup".into())));

        match started {
            Ok(()) => {
                self.stop_tx = Some(stop_tx);
                self.holder = Some(holder);
                Ok(())
            }
            Err(e) => {
                if holder.join().is_err() {
                    log::error!("Capture thread panicked during setup");
                }
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(holder) = self.holder.take() {
            if holder.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.holder.is_some()
    }

    fn device_info(&self) -> AudioSource {
        match self.device_name {
            Some(ref name) => AudioSource {
                id: name.clone(),
                name: name.clone(),
                is_default: false,
            },
            None => AudioSource {
                id: "default-input".into(),
                name: DeviceEnumerator::new()
                    .default_input_device_name()
                    .unwrap_or_else(|| "Default Input".into()),
                is_default: true,
            },
        }
    }
}

impl Drop for CpalInputCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the device, pick a matching config, build and play the stream.
fn start_stream(
    device_name: Option<&str>,
    format: &StreamFormat,
    buffer_frames: Option<u32>,
    on_frame: FrameCallback,
) -> Result<cpal::Stream, CaptureError> {
    let device = DeviceEnumerator::new().find_input_device(device_name)?;
    let name = device.name().unwrap_or_else(|_| "unknown".into());
    let config = select_config(&device, &name, format, buffer_frames)?;

    log::info!("Opening input device '{}' at {}", name, format);

    let stream = match format.encoding {
        SampleEncoding::Int16 => build_stream::<i16>(&device, &config, on_frame)?,
        SampleEncoding::Int32 => build_stream::<i32>(&device, &config, on_frame)?,
        SampleEncoding::Float32 => build_stream::<f32>(&device, &config, on_frame)?,
    };

    stream
        .play()
        .map_err(|e| CaptureError::Device(format!("failed to start input stream: {}", e)))?;
    Ok(stream)
}

/// Find a supported input configuration with exactly the requested
/// channels, sample format and sample rate. No conversion is attempted.
fn select_config(
    device: &cpal::Device,
    name: &str,
    format: &StreamFormat,
    buffer_frames: Option<u32>,
) -> Result<StreamConfig, CaptureError> {
    let wanted = sample_format_for(format.encoding);
    let rate = format.sample_rate;

    let range = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Device(format!("failed to query input configs: {}", e)))?
        .find(|r| {
            r.channels() == format.channels
                && r.sample_format() == wanted
                && r.min_sample_rate().0 <= rate
                && rate <= r.max_sample_rate().0
        })
        .ok_or_else(|| CaptureError::UnsupportedFormat(format!("{} not supported by '{}'", format, name)))?;

    let mut config: StreamConfig = range.with_sample_rate(cpal::SampleRate(rate)).config();
    if let Some(frames) = buffer_frames {
        config.buffer_size = cpal::BufferSize::Fixed(frames);
    }
    Ok(config)
}

/// Sample types the stream can deliver, tied to their borrowed slice form.
trait CaptureSample: SizedSample + Send + 'static {
    fn slice(data: &[Self]) -> SampleSlice<'_>;
}

impl CaptureSample for i16 {
    fn slice(data: &[Self]) -> SampleSlice<'_> {
        SampleSlice::Int16(data)
    }
}

impl CaptureSample for i32 {
    fn slice(data: &[Self]) -> SampleSlice<'_> {
        SampleSlice::Int32(data)
    }
}

impl CaptureSample for f32 {
    fn slice(data: &[Self]) -> SampleSlice<'_> {
        SampleSlice::Float32(data)
    }
}

fn build_stream<T: CaptureSample>(
    device: &cpal::Device,
    config: &StreamConfig,
    on_frame: FrameCallback,
) -> Result<cpal::Stream, CaptureError> {
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| on_frame(T::slice(data)),
            |err| log::error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
            cpal::BuildStreamError::StreamConfigNotSupported => {
                CaptureError::UnsupportedFormat(format!("{:?}", config))
            }
            other => CaptureError::Device(format!("failed to build input stream: {}", other)),
        })
}
