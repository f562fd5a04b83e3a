//! Stepsense replay tool
//!
//! Replays a recorded accelerometer stream through the step detector and
//! prints every accepted step followed by the final diagnostic snapshot.
//!
//! Input is CSV, one sample per record: `timestamp_ms,x,y,z`, with a header
//! row unless `--no-header` is given. Blank lines and `#` comments are
//! skipped; malformed records are counted and skipped.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use stepsense::{AccelSample, ActivityMode, DetectorConfig, StepDetector};

#[derive(Parser, Debug)]
#[command(name = "stepsense-replay")]
#[command(about = "Replay an accelerometer recording through the step detector")]
struct Args {
    /// CSV recording (reads stdin if omitted)
    input: Option<PathBuf>,

    /// Activity mode: walking, running, hiking or default
    #[arg(long)]
    mode: Option<String>,

    /// TOML detector configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// The recording has no `timestamp_ms,x,y,z` header row
    #[arg(long, default_value = "false")]
    no_header: bool,

    /// Print the final stats as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

/// CSV reader for recordings. With a header, columns are matched by name;
/// without one, by position.
fn sample_reader<R: Read>(input: R, has_headers: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn load_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            DetectorConfig::from_toml_str(&source)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };
    if let Some(mode) = &args.mode {
        config.activity_mode = mode.parse::<ActivityMode>().context("Invalid --mode")?;
    }
    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let mut detector = StepDetector::new(config);

    let input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };
    let mut reader = sample_reader(input, !args.no_header);

    let mut skipped = 0usize;
    for record in reader.deserialize::<AccelSample>() {
        let sample = match record {
            Ok(sample) => sample,
            Err(err) if !err.is_io_error() => {
                log::debug!("skipping record: {err}");
                skipped += 1;
                continue;
            }
            Err(err) => return Err(err).context("Failed to read recording"),
        };
        if let Some(step) = detector.process(&sample) {
            println!(
                "step {:>5} at {:>8}ms  peak={:.3}  streak={}",
                step.step_count, step.timestamp_ms, step.peak_magnitude, step.consecutive_peaks
            );
        }
    }

    if skipped > 0 {
        log::info!("skipped {skipped} unparseable records");
    }

    let stats = detector.stats();
    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to encode stats")?;
        println!("{json}");
    } else {
        println!("\n=== Summary ===");
        println!("Total steps: {}", stats.total_steps);
        println!("Phase: {:?}", stats.phase);
        println!("Baseline: {:.4} m/s²", stats.baseline_acceleration);
        println!("Threshold: {:.4}", stats.threshold);
        println!("Mode: {}", stats.activity_mode);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    run(Args::parse())
}
