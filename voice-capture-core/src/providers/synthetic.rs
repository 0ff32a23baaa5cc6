//! Device-free capture source.
//!
//! Generates blocks of silence or a sine tone at real-time pace on its own
//! thread, exercising the same callback contract as a hardware stream.
//! Used for headless runs and tests.

use std::f32::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::models::audio_models::{AudioSource, SampleEncoding, StreamFormat};
use crate::models::error::CaptureError;
use crate::processing::frame::SampleSlice;
use crate::traits::capture_provider::{CaptureProvider, FrameCallback};

/// Frames per delivered block, matching a typical driver block size.
pub const DEFAULT_BLOCK_FRAMES: usize = 2048;

/// Waveform produced by [`SyntheticCapture`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticSignal {
    Silence,
    Sine { frequency_hz: f32, amplitude: f32 },
}

pub struct SyntheticCapture {
    signal: SyntheticSignal,
    block_frames: usize,
    available: bool,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SyntheticCapture {
    pub fn silence() -> Self {
        Self::new(SyntheticSignal::Silence)
    }

    pub fn sine(frequency_hz: f32, amplitude: f32) -> Self {
        Self::new(SyntheticSignal::Sine {
            frequency_hz,
            amplitude: amplitude.clamp(0.0, 1.0),
        })
    }

    /// A source whose device is missing: `open` fails with `DeviceNotAvailable`.
    pub fn unavailable() -> Self {
        let mut capture = Self::silence();
        capture.available = false;
        capture
    }

    pub fn with_block_frames(mut self, block_frames: usize) -> Self {
        self.block_frames = block_frames.max(1);
        self
    }

    fn new(signal: SyntheticSignal) -> Self {
        Self {
            signal,
            block_frames: DEFAULT_BLOCK_FRAMES,
            available: true,
            stop_tx: None,
            handle: None,
        }
    }
}

impl CaptureProvider for SyntheticCapture {
    fn is_available(&self) -> bool {
        self.available
    }

    fn open(&mut self, format: &StreamFormat, on_frame: FrameCallback) -> Result<(), CaptureError> {
        if !self.available {
            return Err(CaptureError::DeviceNotAvailable);
        }
        if self.handle.is_some() {
            return Err(CaptureError::Device("synthetic capture already open".into()));
        }
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(CaptureError::UnsupportedFormat(format.to_string()));
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let mut generator = BlockGenerator::new(self.signal, *format, self.block_frames);
        let block_duration =
            Duration::from_secs_f64(self.block_frames as f64 / format.sample_rate as f64);

        let handle = thread::Builder::new()
            .name("synthetic-capture".into())
            .spawn(move || {
                let started = Instant::now();
                let mut delivered: u32 = 0;
                loop {
                    // A block is delivered once it has been "captured", so the
                    // first one arrives one block period after open.
                    let deadline = started + block_duration * (delivered + 1);
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    on_frame(generator.next_block());
                    delivered += 1;
                }
            })
            .map_err(|e| CaptureError::Device(format!("failed to spawn synthetic thread: {}", e)))?;

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Synthetic capture thread panicked");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "synthetic".into(),
            name: match self.signal {
                SyntheticSignal::Silence => "Synthetic silence".into(),
                SyntheticSignal::Sine { frequency_hz, .. } => format!("Synthetic {} Hz tone", frequency_hz),
            },
            is_default: false,
        }
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fills one reusable buffer per encoding so steady-state delivery does not
/// allocate.
struct BlockGenerator {
    signal: SyntheticSignal,
    format: StreamFormat,
    phase: f32,
    int16: Vec<i16>,
    int32: Vec<i32>,
    float32: Vec<f32>,
}

impl BlockGenerator {
    fn new(signal: SyntheticSignal, format: StreamFormat, block_frames: usize) -> Self {
        let len = block_frames * format.channels as usize;
        let (int16, int32, float32) = match format.encoding {
            SampleEncoding::Int16 => (vec![0; len], Vec::new(), Vec::new()),
            SampleEncoding::Int32 => (Vec::new(), vec![0; len], Vec::new()),
            SampleEncoding::Float32 => (Vec::new(), Vec::new(), vec![0.0; len]),
        };
        Self {
            signal,
            format,
            phase: 0.0,
            int16,
            int32,
            float32,
        }
    }

    fn next_block(&mut self) -> SampleSlice<'_> {
        let channels = self.format.channels as usize;
        let encoding = self.format.encoding;
        let block_frames = match encoding {
            SampleEncoding::Int16 => self.int16.len(),
            SampleEncoding::Int32 => self.int32.len(),
            SampleEncoding::Float32 => self.float32.len(),
        } / channels;

        for frame in 0..block_frames {
            let value = self.next_value();
            for ch in 0..channels {
                let i = frame * channels + ch;
                match encoding {
                    SampleEncoding::Int16 => self.int16[i] = (value * i16::MAX as f32) as i16,
                    SampleEncoding::Int32 => self.int32[i] = (value as f64 * i32::MAX as f64) as i32,
                    SampleEncoding::Float32 => self.float32[i] = value,
                }
            }
        }

        match encoding {
            SampleEncoding::Int16 => SampleSlice::Int16(&self.int16),
            SampleEncoding::Int32 => SampleSlice::Int32(&self.int32),
            SampleEncoding::Float32 => SampleSlice::Float32(&self.float32),
        }
    }

    fn next_value(&mut self) -> f32 {
        match self.signal {
            SyntheticSignal::Silence => 0.0,
            SyntheticSignal::Sine {
                frequency_hz,
                amplitude,
            } => {
                let value = amplitude * (self.phase * TAU).sin();
                self.phase = (self.phase + frequency_hz / self.format.sample_rate as f32).fract();
                value
            }
        }
    }
}
