//! JSON output of the merged timeline

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use zero_log_decoder::{DecodedLog, Diagnostics};

/// Diagnostics of one input file
#[derive(Debug, Serialize)]
pub struct FileDiagnostics {
    pub source: String,
    pub diagnostics: Diagnostics,
}

/// Everything written for one run
#[derive(Debug, Serialize)]
pub struct Report {
    pub decoder_version: &'static str,
    pub log: DecodedLog,
    /// Inputs that were decoded but left out of the merge
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<FileDiagnostics>,
}

/// Serialize a report to `writer`
pub fn write_json<W: Write>(report: &Report, writer: W, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }
    Ok(())
}

/// Write a report to a file, or stdout when no path is given
pub fn write_report(report: &Report, path: Option<&Path>, pretty: bool) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            let mut writer = BufWriter::new(file);
            write_json(report, &mut writer, pretty)?;
            writer.flush()?;
            log::info!("Wrote {} records to {:?}", report.log.len(), path);
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_json(report, &mut writer, pretty)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zero_log_decoder::{Decoder, LogBuffer};

    fn sample_report() -> Report {
        let data = vec![0xB2, 0x08, 0x09, 0x00, 0x10, 0x5E, 0x5F, 0x01];
        let decoded = Decoder::new().decode(&LogBuffer::new(data, "bike_MBB.bin"));
        Report {
            decoder_version: zero_log_decoder::VERSION,
            log: decoded.log,
            skipped: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_report_json_shape() {
        let mut out = Vec::new();
        write_json(&sample_report(), &mut out, false).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["log"]["unit_type"], "MainBoard");
        assert_eq!(value["log"]["revision"], "Rev3");
        assert_eq!(value["log"]["records"][0]["event"], "Key On ");
        assert_eq!(value["log"]["records"][0]["time_text"], "2020-09-13 12:26:40");
        assert!(value.get("skipped").is_none());
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        write_report(&sample_report(), Some(&path), true).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"log\""));
    }
}
