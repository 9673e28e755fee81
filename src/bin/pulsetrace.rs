//! Pulsetrace CLI - Command-line interface for the ECG detection core
//!
//! Commands:
//! - detect: Run QRS detection over a sample stream (one value per line)
//! - constants: Print the per-rate derived constants

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pulsetrace::detector::{AdaptiveThresholdDetector, REFRACTORY_SECS, WARMUP_SAMPLES};
use pulsetrace::filters::FilterCascade;
use pulsetrace::{DetectionMode, EcgProcessor, PULSETRACE_VERSION};

/// Pulsetrace - real-time ECG QRS detection and heart-rate derivation
#[derive(Parser)]
#[command(name = "pulsetrace")]
#[command(version = PULSETRACE_VERSION)]
#[command(about = "Detect heartbeats in streaming ECG samples", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run QRS detection over a sample stream
    Detect {
        /// Input file with one raw sample per line (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Sampling rate of the input signal in Hz
        #[arg(short, long, default_value = "860")]
        rate: f64,

        /// Detection mode
        #[arg(long, default_value = "adaptive")]
        mode: CliMode,

        /// Emit only the final summary, not per-peak records
        #[arg(long)]
        summary_only: bool,
    },

    /// Print the constants derived from a sampling rate
    Constants {
        /// Sampling rate in Hz
        #[arg(short, long, default_value = "860")]
        rate: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliMode {
    /// Full filter cascade with adaptive thresholding
    Adaptive,
    /// Running-statistics path on the smoothed signal
    Fast,
}

impl From<CliMode> for DetectionMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Adaptive => DetectionMode::Adaptive,
            CliMode::Fast => DetectionMode::Fast,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pulsetrace: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Detect {
            input,
            output,
            rate,
            mode,
            summary_only,
        } => cmd_detect(&input, &output, rate, mode.into(), summary_only),
        Commands::Constants { rate } => cmd_constants(rate),
    }
}

fn cmd_detect(
    input: &Path,
    output: &Path,
    rate: f64,
    mode: DetectionMode,
    summary_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut writer: BufWriter<Box<dyn Write>> = if output.to_string_lossy() == "-" {
        BufWriter::new(Box::new(io::stdout()))
    } else {
        BufWriter::new(Box::new(fs::File::create(output)?))
    };

    let mut processor = EcgProcessor::with_mode(rate, mode)?;
    let mut skipped = 0_usize;

    for line in input_data.as_bytes().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // The transport layer's job of filtering garbage falls to the CLI
        // here: non-numeric lines are dropped, not fed to the core
        let Ok(raw) = trimmed.parse::<f64>() else {
            skipped += 1;
            continue;
        };

        let (_, is_peak) = processor.process_sample(raw);
        if is_peak && !summary_only {
            if let Some(peak) = processor.recent_peaks(1).first() {
                writeln!(writer, "{}", serde_json::to_string(peak)?)?;
            }
        }
    }

    writeln!(
        writer,
        "{}",
        serde_json::to_string(&processor.session_summary())?
    )?;
    writer.flush()?;

    if skipped > 0 {
        eprintln!("pulsetrace: skipped {skipped} non-numeric input lines");
    }

    Ok(())
}

fn cmd_constants(rate: f64) -> Result<(), Box<dyn std::error::Error>> {
    let detector = AdaptiveThresholdDetector::new(rate);
    let cascade = FilterCascade::new(rate);

    let constants = serde_json::json!({
        "sampling_rate_hz": rate,
        "warmup_samples": WARMUP_SAMPLES,
        "refractory_secs": REFRACTORY_SECS,
        "refractory_samples": detector.refractory_samples(),
        "integration_window_samples": cascade.integration_window(),
    });
    println!("{}", serde_json::to_string_pretty(&constants)?);
    Ok(())
}
