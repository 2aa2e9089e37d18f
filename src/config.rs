//! Configuration file handling.
//!
//! Settings live in `dsa-dashboard.toml`. Every section is optional; a
//! missing file means defaults everywhere.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::Granularity;

/// File name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dsa-dashboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Mapping from logical fields to input column headers.
///
/// Candidate lists are tried in order; header matching ignores case and
/// surrounding whitespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_agent_columns")]
    pub agent_columns: Vec<String>,

    #[serde(default = "default_date_columns")]
    pub date_columns: Vec<String>,

    /// Extra `chrono` formats tried after ISO-8601.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Keep only the last N digits of the agent identifier (mobile numbers).
    #[serde(default)]
    pub agent_digits: Option<usize>,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricColumn>,
}

/// One reported metric and the headers it may appear under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricColumn {
    pub name: String,
    pub columns: Vec<String>,
}

impl MetricColumn {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            agent_columns: default_agent_columns(),
            date_columns: default_date_columns(),
            date_formats: default_date_formats(),
            agent_digits: None,
            metrics: default_metrics(),
        }
    }
}

fn default_agent_columns() -> Vec<String> {
    [
        "agent",
        "agent_id",
        "dsa_mobile",
        "Agent Mobile",
        "Customer Referrer Mobile",
        "Created By",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_date_columns() -> Vec<String> {
    ["date", "created_at", "Created At", "Transaction Date"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_date_formats() -> Vec<String> {
    ["%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d", "%d %b %Y"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_metrics() -> Vec<MetricColumn> {
    vec![
        MetricColumn::new("amount", &["amount", "Amount", "disbursed_amount"]),
        MetricColumn::new("cases", &["cases", "case_count", "Deposit Count"]),
    ]
}

/// Report and chart defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub granularity: Granularity,

    /// Number of agents shown in ranked bar charts.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Flat payout per qualifying record, used for the headline estimate.
    #[serde(default)]
    pub payout_per_record: Option<f64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            top_n: default_top_n(),
            payout_per_record: None,
        }
    }
}

fn default_top_n() -> usize {
    10
}

/// Export writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Largest table, in data rows, any export may contain.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_delimiter")]
    pub csv_delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            csv_delimiter: default_delimiter(),
        }
    }
}

fn default_max_rows() -> usize {
    1_048_575 // Excel sheet limit minus the header row
}

fn default_delimiter() -> char {
    ','
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `dsa-dashboard.toml` from the working directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.schema.metrics.is_empty() {
            anyhow::bail!("schema.metrics must name at least one metric");
        }
        let mut seen = std::collections::BTreeSet::new();
        for metric in &self.schema.metrics {
            if metric.name.trim().is_empty() {
                anyhow::bail!("schema.metrics contains an empty metric name");
            }
            if !seen.insert(metric.name.as_str()) {
                anyhow::bail!("metric '{}' is configured twice", metric.name);
            }
        }
        if !self.export.csv_delimiter.is_ascii() {
            anyhow::bail!(
                "export.csv_delimiter must be an ASCII character, got '{}'",
                self.export.csv_delimiter
            );
        }
        if self.schema.agent_digits == Some(0) {
            anyhow::bail!("schema.agent_digits must be at least 1");
        }
        Ok(())
    }

    /// Names of the configured metrics, in report column order.
    pub fn metric_names(&self) -> Vec<String> {
        self.schema.metrics.iter().map(|m| m.name.clone()).collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.report.granularity, Granularity::Month);
        assert_eq!(config.report.top_n, 10);
        assert_eq!(config.export.max_rows, 1_048_575);
        assert_eq!(config.metric_names(), vec!["amount", "cases"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[schema]
agent_columns = ["DSA"]
agent_digits = 7

[[schema.metrics]]
name = "disbursed"
columns = ["Disbursed Amount"]

[report]
granularity = "week"
payout_per_record = 40.0

[export]
max_rows = 500
csv_delimiter = "\t"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.schema.agent_columns, vec!["DSA"]);
        assert_eq!(config.schema.agent_digits, Some(7));
        assert_eq!(config.metric_names(), vec!["disbursed"]);
        // Untouched lists keep their defaults.
        assert!(config.schema.date_columns.contains(&"date".to_string()));
        assert_eq!(config.report.granularity, Granularity::Week);
        assert_eq!(config.report.payout_per_record, Some(40.0));
        assert_eq!(config.export.max_rows, 500);
        assert_eq!(config.export.csv_delimiter, '\t');
    }

    #[test]
    fn test_validate_rejects_duplicate_metrics() {
        let mut config = Config::default();
        config.schema.metrics.push(MetricColumn::new("amount", &["x"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_metrics() {
        let mut config = Config::default();
        config.schema.metrics.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[schema]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[export]"));
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.metric_names(), Config::default().metric_names());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[report]\ntop_n = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.report.top_n, 3);
    }
}
