use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("healthcare.db"),
        }
    }
}

/// Where the hospital CSV comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Read an existing CSV file
    Csv,
    /// Page through the CMS datastore API and snapshot it to CSV
    Api,
    /// Generate a seeded sample dataset and snapshot it to CSV
    Sample,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Input file for the `csv` source
    pub csv_path: PathBuf,
    /// Where `api` and `sample` sources write the CSV they acquire
    pub snapshot_path: PathBuf,
    pub api_url: String,
    pub batch_size: usize,
    pub max_records: Option<usize>,
    pub page_delay_ms: u64,
    pub timeout_seconds: u64,
    pub timeout_retries: u32,
    pub fallback_to_sample: bool,
    pub sample_size: usize,
    pub sample_seed: u64,
}

impl SourceConfig {
    /// The CSV the load step reads for this source kind.
    pub fn load_path(&self) -> &Path {
        match self.kind {
            SourceKind::Csv => &self.csv_path,
            SourceKind::Api | SourceKind::Sample => &self.snapshot_path,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Csv,
            csv_path: PathBuf::from("data/hospitals.csv"),
            snapshot_path: PathBuf::from("data/snapshot.csv"),
            api_url: crate::constants::CMS_API_URL.to_string(),
            batch_size: 500,
            max_records: Some(2000),
            page_delay_ms: 500,
            timeout_seconds: 30,
            timeout_retries: 2,
            fallback_to_sample: true,
            sample_size: 4000,
            sample_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub docs_dir: PathBuf,
    pub top_states: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            docs_dir: PathBuf::from("target/docs"),
            top_states: 15,
        }
    }
}

impl Config {
    /// Load the config file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.batch_size == 0 {
            return Err(PipelineError::Config("source.batch_size must be greater than 0".into()));
        }
        if self.source.kind == SourceKind::Sample && self.source.sample_size == 0 {
            return Err(PipelineError::Config("source.sample_size must be greater than 0".into()));
        }
        if self.output.top_states == 0 {
            return Err(PipelineError::Config("output.top_states must be greater than 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config.source.kind, SourceKind::Csv);
        assert_eq!(config.warehouse.path, PathBuf::from("healthcare.db"));
        assert_eq!(config.output.top_states, 15);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [source]
            kind = "sample"
            sample_size = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.source.kind, SourceKind::Sample);
        assert_eq!(config.source.sample_size, 100);
        assert_eq!(config.source.sample_seed, 42);
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn test_acquired_sources_never_write_the_input_csv() {
        let mut source = SourceConfig::default();
        assert_eq!(source.load_path(), Path::new("data/hospitals.csv"));
        for kind in [SourceKind::Api, SourceKind::Sample] {
            source.kind = kind;
            assert_eq!(source.load_path(), Path::new("data/snapshot.csv"));
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.source.batch_size = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
