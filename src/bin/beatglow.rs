use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use beatglow::analysis::{BeatDetector, OnsetEvent};
use beatglow::audio::CaptureEngine;
use beatglow::config::DetectorConfig;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "beatglow",
    about = "Real-time bass / clap / hi-hat onset detection"
)]
struct Cli {
    /// Path to a JSON detector config (defaults otherwise)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen on the default input device and print onsets as they happen
    Live {
        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Emit events as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run detection over a WAV file
    Analyze {
        /// Input WAV file
        input: PathBuf,
        /// Emit events as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => DetectorConfig::load_from_file(path),
        None => DetectorConfig::default(),
    };

    match cli.command {
        Commands::Live {
            duration_secs,
            json,
        } => run_live(config, duration_secs, json),
        Commands::Analyze { input, json } => run_analyze(config, &input, json),
    }
}

fn run_live(config: DetectorConfig, duration_secs: Option<u64>, json: bool) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let mut engine = CaptureEngine::new(config);
        let mut events = engine.subscribe();
        engine.start().context("starting capture")?;

        let deadline = duration_secs.map(Duration::from_secs);
        let listen = async {
            loop {
                match events.recv().await {
                    Ok(event) => emit_event(&event, json)?,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Dropped {} events, consumer too slow", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            anyhow::Ok(())
        };

        match deadline {
            Some(limit) => {
                tokio::select! {
                    result = listen => result?,
                    _ = tokio::time::sleep(limit) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                tokio::select! {
                    result = listen => result?,
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
        }

        engine.stop().context("stopping capture")?;
        anyhow::Ok(())
    })?;

    Ok(ExitCode::from(0))
}

fn run_analyze(config: DetectorConfig, input: &PathBuf, json: bool) -> Result<ExitCode> {
    let samples = read_wav_mono(input)?;
    let frame_size = config.audio.frame_size;
    let mut detector = BeatDetector::new(&config);

    let mut event_count = 0usize;
    for frame in samples.chunks(frame_size) {
        // Trailing partial frame is dropped, same as live capture would
        if frame.len() < frame_size {
            break;
        }
        for event in detector.process_frame(frame) {
            emit_event(&event, json)?;
            event_count += 1;
        }
    }

    if !json {
        println!("{} onsets in {}", event_count, input.display());
    }
    Ok(ExitCode::from(0))
}

/// Decode a WAV file to f32, taking the first channel
fn read_wav_mono(path: &PathBuf) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .collect::<Result<_, _>>()
            .context("decoding float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .step_by(channels)
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("decoding integer samples")?
        }
    };

    Ok(samples)
}

fn emit_event(event: &OnsetEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        let name = event.instrument.to_string();
        match event.hihat_steady {
            Some(steady) => println!(
                "frame {:>8}  {:<5} energy {:.3}  pattern {}",
                event.frame_index,
                name,
                event.energy,
                if steady { "steady" } else { "loose" }
            ),
            None => println!(
                "frame {:>8}  {:<5} energy {:.3}",
                event.frame_index, name, event.energy
            ),
        }
    }
    Ok(())
}
