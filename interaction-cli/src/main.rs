//! Interaction Tracker CLI Application
//!
//! Replays a recorded JSON Lines trace of page signals through the
//! interaction-tracker library and writes the resulting analytics events.
//! - Field interaction events (debounced)
//! - Scroll depth milestones
//! - Native form submits and cross-origin form completion
//!
//! Trace timestamps are offsets added to `--start-ms`.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod replay;
mod report;

use config::AppConfig;
use report::Summary;

/// Interaction Tracker - Replay page signal traces into analytics events
#[derive(Parser, Debug)]
#[command(name = "interaction-cli")]
#[command(about = "Replay recorded page signals into analytics events", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the JSON Lines signal trace
    #[arg(short, long, value_name = "FILE")]
    trace: PathBuf,

    /// Path to configuration file (tracking.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for emitted events (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Epoch milliseconds the trace starts at (default: now)
    #[arg(long, value_name = "EPOCH_MS")]
    start_ms: Option<u64>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Interaction Tracker CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using tracker library v{}", interaction_tracker::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let start_ms = args.start_ms.unwrap_or_else(now_ms);
    let records = replay::load_trace(&args.trace)?;
    let outcome = replay::replay(&config.tracker, records, start_ms)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
            report::write_events(&mut BufWriter::new(file), &outcome.sink.events, config.output.format)?;
            log::info!("Wrote {} events to {:?}", outcome.sink.events.len(), path);
        }
        None => {
            let stdout = io::stdout();
            report::write_events(&mut stdout.lock(), &outcome.sink.events, config.output.format)?;
        }
    }

    if config.output.include_summary && !args.quiet {
        let summary = Summary::from_sink(outcome.records, &outcome.sink, outcome.completed_embeds);
        let mut stderr = io::stderr().lock();
        write!(stderr, "{}", summary)?;
    }

    Ok(())
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["interaction-cli", "--trace", "page.jsonl", "--start-ms", "1000", "-vv"]).unwrap();
        assert_eq!(args.trace, PathBuf::from("page.jsonl"));
        assert_eq!(args.start_ms, Some(1000));
        assert_eq!(args.verbose, 2);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_trace_is_required() {
        assert!(Args::try_parse_from(["interaction-cli"]).is_err());
    }
}
