//! voice-capture - record an input device to WAV
//!
//! Subcommands:
//! - `voice-capture record` - Capture to a file for a fixed duration or until Enter
//! - `voice-capture devices` - List input devices and their formats

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use voice_capture_core::{
    CaptureError, CaptureProvider, CaptureSession, SampleEncoding, SessionConfig, StatusEvent,
    SyntheticCapture,
};
use voice_capture_cpal::{CpalInputCapture, DeviceEnumerator};

#[derive(Parser)]
#[command(name = "voice-capture")]
#[command(about = "Record live audio input to WAV files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record from an input device
    Record(RecordArgs),

    /// List input devices
    Devices {
        /// Also print the supported format ranges of each device
        #[arg(short, long)]
        formats: bool,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// Recording length in seconds (omit to record until Enter)
    #[arg(short, long)]
    seconds: Option<f64>,

    /// JSON session config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the output file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Interleaved channel count
    #[arg(long)]
    channels: Option<u16>,

    /// Sample encoding requested from the device
    #[arg(short, long, value_enum)]
    encoding: Option<EncodingArg>,

    /// Frame queue slots before frames are dropped
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Input device name (default device if omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// Fixed driver buffer size in frames
    #[arg(long)]
    buffer_frames: Option<u32>,

    /// Write a .metadata.json sidecar next to the recording
    #[arg(long)]
    metadata: bool,

    /// Record a generated sine tone instead of a device
    #[arg(long)]
    synthetic: bool,

    /// Pause after this many seconds of recording
    #[arg(long, requires = "seconds")]
    pause_after: Option<f64>,

    /// How long to stay paused
    #[arg(long, default_value = "2.0")]
    pause_for: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    I16,
    I32,
    F32,
}

impl From<EncodingArg> for SampleEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::I16 => SampleEncoding::Int16,
            EncodingArg::I32 => SampleEncoding::Int32,
            EncodingArg::F32 => SampleEncoding::Float32,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to read stdin: {0}")]
    Stdin(#[from] io::Error),

    #[error("invalid duration: {0}")]
    InvalidDuration(f64),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Record(args) => record(args),
        Commands::Devices { formats } => list_devices(formats),
    };

    if let Err(e) = outcome {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn record(args: RecordArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;

    if args.synthetic {
        return run_session(SyntheticCapture::sine(440.0, 0.3), config, &args);
    }

    let mut capture = match args.device {
        Some(ref name) => CpalInputCapture::with_device(name.clone()),
        None => CpalInputCapture::default_device(),
    };
    if let Some(frames) = args.buffer_frames {
        capture = capture.with_buffer_frames(frames);
    }
    run_session(capture, config, &args)
}

fn build_config(args: &RecordArgs) -> Result<SessionConfig, CliError> {
    let mut config = match args.config {
        Some(ref path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };

    if let Some(ref dir) = args.output_dir {
        config.output_directory = dir.clone();
    }
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(channels) = args.channels {
        config.channels = channels;
    }
    if let Some(encoding) = args.encoding {
        config.encoding = encoding.into();
    }
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
    }
    if args.metadata {
        config.write_metadata = true;
    }
    config.validate()?;
    Ok(config)
}

fn run_session<P: CaptureProvider>(
    provider: P,
    config: SessionConfig,
    args: &RecordArgs,
) -> Result<(), CliError> {
    let session = CaptureSession::new(provider, config)?
        .with_delegate(Arc::new(|event: &StatusEvent| log::info!("Status: {}", event)));

    log::info!(
        "Recording from '{}' at {}",
        session.device_info().name,
        session.format()
    );
    session.start()?;

    let waited = match args.seconds {
        Some(seconds) => record_for(&session, seconds, args.pause_after, args.pause_for),
        None => wait_for_enter(),
    };
    if let Err(e) = waited {
        return Err(abort_session(&session, e));
    }

    match session.stop()? {
        Some(result) => {
            println!("file:      {}", result.file_path.display());
            println!("duration:  {:.2} s", result.duration_secs);
            match result.checksum {
                Some(ref checksum) => println!("sha256:    {}", checksum),
                None => println!("sha256:    pending (file finalized in background)"),
            }
            println!("segments:  {}", result.stats.segments_written);
            println!("dropped:   {}", result.stats.dropped_frames);
        }
        None => log::warn!("Session was not active at stop"),
    }
    Ok(())
}

/// Stop after a failure mid-recording so what was captured so far is
/// still finalized. Returns the original failure.
fn abort_session<P: CaptureProvider>(session: &CaptureSession<P>, cause: CliError) -> CliError {
    match session.stop() {
        Ok(Some(result)) => log::warn!("Recording cut short: {}", result.file_path.display()),
        Ok(None) => {}
        Err(e) => log::error!("Failed to finalize recording: {}", e),
    }
    cause
}

fn record_for<P: CaptureProvider>(
    session: &CaptureSession<P>,
    seconds: f64,
    pause_after: Option<f64>,
    pause_for: f64,
) -> Result<(), CliError> {
    let total = to_duration(seconds)?;

    match pause_after {
        Some(after) if after < seconds => {
            let before_pause = to_duration(after)?;
            thread::sleep(before_pause);

            session.pause()?;
            thread::sleep(to_duration(pause_for)?);
            session.resume()?;

            thread::sleep(total.saturating_sub(before_pause));
        }
        _ => thread::sleep(total),
    }
    Ok(())
}

fn wait_for_enter() -> Result<(), CliError> {
    println!("Recording... press Enter to stop.");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

fn to_duration(seconds: f64) -> Result<Duration, CliError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| CliError::InvalidDuration(seconds))
}

fn list_devices(formats: bool) -> Result<(), CliError> {
    let enumerator = DeviceEnumerator::new();
    let devices = enumerator.list_input_devices()?;

    if devices.is_empty() {
        println!("No input devices found.");
        return Ok(());
    }

    for device in devices {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("{}{}", device.name, marker);

        if !formats {
            continue;
        }
        match enumerator.supported_input_formats(Some(&device.name)) {
            Ok(ranges) => {
                for range in ranges {
                    let encoding = range
                        .encoding
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "other".into());
                    println!(
                        "    {} ch, {}-{} Hz, {}",
                        range.channels, range.min_sample_rate, range.max_sample_rate, encoding
                    );
                }
            }
            Err(e) => println!("    formats unavailable: {}", e),
        }
    }
    Ok(())
}
