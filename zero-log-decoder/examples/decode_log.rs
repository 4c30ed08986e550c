//! Standalone Zero log decoder tool
//!
//! This tool decodes one MBB/BMS log file and prints the header, the event
//! timeline and a short summary of what was decoded.
//!
//! Usage:
//!   decode_log <log_file.bin> [--tz <hours>] [--limit <count>]
//!
//! Example:
//!   decode_log 538SD1Z27JCG01234_MBB_2020-09-13.bin --tz -7 --limit 100

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use zero_log_decoder::{DecodeReport, Decoder, DecoderConfig, DiagnosticKind};

struct DecoderStats {
    records: usize,
    with_fields: usize,
    interpolated: usize,
    missing_time: usize,
    events: HashMap<String, usize>,
}

impl DecoderStats {
    fn collect(report: &DecodeReport) -> Self {
        let mut stats = Self {
            records: report.log.len(),
            with_fields: 0,
            interpolated: 0,
            missing_time: 0,
            events: HashMap::new(),
        };
        for record in &report.log.records {
            if record.has_structured_data() {
                stats.with_fields += 1;
            }
            if record.interpolated {
                stats.interpolated += 1;
            }
            if record.timestamp.is_none() {
                stats.missing_time += 1;
            }
            *stats.events.entry(record.event.clone()).or_insert(0) += 1;
        }
        stats
    }

    fn print_summary(&self, report: &DecodeReport) {
        println!("\n=== DECODING SUMMARY ===");
        println!("Records decoded: {}", self.records);
        println!("Records with structured fields: {}", self.with_fields);
        println!("Interpolated timestamps: {}", self.interpolated);
        println!("Records without a time: {}", self.missing_time);
        println!("Diagnostics recorded: {}", report.diagnostics.len());
        println!(
            "Decode failures: {}",
            report
                .diagnostics
                .iter()
                .filter(|d| matches!(d.kind, DiagnosticKind::DecodeFailure { .. }))
                .count()
        );

        if !self.events.is_empty() {
            println!("\nTop 10 Most Frequent Events:");
            let mut sorted: Vec<_> = self.events.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (name, count) in sorted.iter().take(10) {
                println!("  {}: {} times", name, count);
            }
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <log_file.bin> [--tz <hours>] [--limit <count>]", args[0]);
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let mut timezone_hours = 0.0;
    let mut limit = usize::MAX;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--tz" if i + 1 < args.len() => {
                timezone_hours = args[i + 1].parse().unwrap_or(0.0);
                i += 2;
            }
            "--limit" if i + 1 < args.len() => {
                limit = args[i + 1].parse().unwrap_or(usize::MAX);
                i += 2;
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
                i += 1;
            }
        }
    }

    let config = DecoderConfig::new().with_timezone_hours(timezone_hours);
    let report = match Decoder::with_config(config).decode_file(&path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Failed to decode {:?}: {}", path, e);
            std::process::exit(1);
        }
    };

    let log = &report.log;
    println!("{} {} log: {}", log.unit_type, log.revision, log.source);
    for (field, value) in log.header.iter() {
        println!("  {:<20} {}", field.label(), value);
    }

    println!("\n{:>5}  {:<19}  {:<40}  Conditions", "Entry", "Time", "Event");
    for record in log.records.iter().take(limit) {
        println!(
            "{:>5}  {:<19}  {:<40}  {}",
            record.entry_number(),
            record.time_text,
            record.event,
            record.conditions.as_deref().unwrap_or("")
        );
    }

    DecoderStats::collect(&report).print_summary(&report);
}
