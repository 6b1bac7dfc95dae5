//! Configuration loading and parsing

use anyhow::{Context, Result};
use interaction_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from config.toml)
///
/// Tracker sections (`[field]`, `[scroll]`, `[page]`, `[[embeds]]`) sit at
/// the top level next to `[output]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub include_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            include_summary: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One compact JSON object per line
    #[default]
    Jsonl,
    /// Pretty-printed JSON objects
    Pretty,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .tracker
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [field]
            debounce_delay_ms = 1000
            extra_sensitive_terms = ["address"]

            [scroll]
            coalesce_ms = 50

            [page]
            url = "https://example.com/data-voucher"
            title = "Data voucher"

            [[embeds]]
            id = "salesmap"
            expected_origin = "salesmap.kr"
            form_source = "salesmap"

            [output]
            format = "pretty"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.tracker.field.debounce_delay_ms, 1000);
        assert_eq!(config.tracker.scroll.coalesce_ms, 50);
        assert_eq!(config.tracker.embeds.len(), 1);
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert!(config.output.include_summary);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[embeds]]\nid = \"salesmap\"\nexpected_origin = \"salesmap.kr\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tracker.embeds[0].id, "salesmap");
        assert_eq!(config.output.format, OutputFormat::Jsonl);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[field]\nlength_bucket = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/tracking.toml")).is_err());
    }
}
