//! Zero Log Decoder CLI Application
//!
//! This is the command-line interface for the Zero motorcycle log decoder.
//! It uses the zero-log-decoder library and adds:
//! - File selection (arguments or config.toml)
//! - Parallel decoding of every input file
//! - Merging of the decoded logs into one timeline
//! - JSON output

use anyhow::{bail, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;
use zero_log_decoder::{merge_all, Decoder};

mod config;
mod report;

use config::AppConfig;
use report::{FileDiagnostics, Report};

/// Zero Log Decoder - Decode and merge Zero motorcycle MBB/BMS logs
#[derive(Parser, Debug)]
#[command(name = "zero-log-cli")]
#[command(about = "Decode and merge Zero motorcycle MBB/BMS logs", long_about = None)]
#[command(version)]
struct Args {
    /// Log files to decode (merged in the order given)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Timezone offset in hours, e.g. -7 or 5.5
    #[arg(short = 't', long, value_name = "HOURS", allow_negative_numbers = true)]
    timezone: Option<f64>,

    /// Output file for the JSON timeline (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Attach the payload hex of every binary entry
    #[arg(long)]
    raw: bool,

    /// Keep missing timestamps missing instead of interpolating them
    #[arg(long)]
    no_interpolate: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Zero Log Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", zero_log_decoder::VERSION);

    let config = resolve_config(&args)?;
    if config.input.files.is_empty() {
        bail!("No input files given (pass them as arguments or under [input] in a config file)");
    }

    run(&config)
}

/// Config file (if any) with command-line flags applied on top
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if !args.files.is_empty() {
        config.input.files = args.files.clone();
    }
    if let Some(hours) = args.timezone {
        config.decoder = config.decoder.with_timezone_hours(hours);
    }
    if args.raw {
        config.decoder = config.decoder.with_raw_payload(true);
    }
    if args.no_interpolate {
        config.decoder = config.decoder.with_interpolation(false);
    }
    if args.output.is_some() {
        config.output.path = args.output.clone();
    }
    if args.pretty {
        config.output.pretty = true;
    }

    Ok(config)
}

/// Decode every file in parallel, merge in input order, write the result
fn run(config: &AppConfig) -> Result<()> {
    let decoder = Decoder::with_config(config.decoder.clone());
    let report = build_report(&decoder, &config.input.files)?;

    log::info!(
        "Timeline for VIN {}: {} records from {} files",
        report.log.vin(),
        report.log.len(),
        config.input.files.len() - report.skipped.len()
    );

    report::write_report(&report, config.output.path.as_deref(), config.output.pretty)
}

fn build_report(decoder: &Decoder, files: &[PathBuf]) -> Result<Report> {
    let results: Vec<_> = files
        .par_iter()
        .map(|path| (path, decoder.decode_file(path)))
        .collect();

    let mut logs = Vec::new();
    let mut diagnostics = Vec::new();
    let mut skipped = Vec::new();
    for (path, result) in results {
        match result {
            Ok(decoded) => {
                if !decoded.diagnostics.is_empty() {
                    log::warn!(
                        "{:?}: {} anomalies recovered while decoding",
                        path,
                        decoded.diagnostics.len()
                    );
                }
                diagnostics.push(FileDiagnostics {
                    source: decoded.log.source.clone(),
                    diagnostics: decoded.diagnostics,
                });
                logs.push(decoded.log);
            }
            Err(e) => {
                log::error!("Failed to decode {:?}: {}", path, e);
                skipped.push(path.display().to_string());
            }
        }
    }

    let (timeline, mismatched) = merge_all(logs)?;
    for error in &mismatched {
        log::warn!("{}", error);
    }
    skipped.extend(mismatched.iter().map(|e| e.to_string()));

    Ok(Report {
        decoder_version: zero_log_decoder::VERSION,
        log: timeline,
        skipped,
        diagnostics: diagnostics
            .into_iter()
            .filter(|d| !d.diagnostics.is_empty())
            .collect(),
    })
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
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
