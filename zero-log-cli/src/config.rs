//! Configuration loading and parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zero_log_decoder::DecoderConfig;

/// Main application configuration (loaded from config.toml)
///
/// Every section is optional; command-line flags override what is set here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InputConfig {
    /// Log files to decode and merge, in merge order
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Where to write the JSON timeline (default: stdout)
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub pretty: bool,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            files = ["538SD1Z27JCG01234_MBB.bin", "538SD1Z27JCG01234_BMS0.bin"]

            [decoder]
            timezone_offset_secs = -25200
            keep_raw_payload = true

            [output]
            path = "timeline.json"
            pretty = true
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.files.len(), 2);
        assert_eq!(config.decoder.timezone_offset_secs, -25200);
        assert!(config.decoder.interpolate_timestamps);
        assert!(config.decoder.keep_raw_payload);
        assert_eq!(config.output.path, Some(PathBuf::from("timeline.json")));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config_reports_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input]\nfiles = 3").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
