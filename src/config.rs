use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_OUTPUT_PREFIX: &str = "outputs";

/// What to do with a non-numeric count in a documents-issued export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// Treat the count as zero and log a warning.
    #[default]
    Zero,
    /// Fail the file; the run skips it and continues.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default = "RunConfig::default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub count_policy: CountPolicy,
    #[serde(default = "RunConfig::default_output_prefix")]
    pub output_prefix: String,
    /// YAML `code: description` map replacing the built-in master table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_codes: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            count_policy: CountPolicy::default(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            master_codes: None,
        }
    }
}

impl RunConfig {
    fn default_threshold() -> f64 {
        DEFAULT_SIMILARITY_THRESHOLD
    }

    fn default_output_prefix() -> String {
        DEFAULT_OUTPUT_PREFIX.to_string()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: RunConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.similarity_threshold),
            "similarity_threshold must be within 0..=1 (found {})",
            self.similarity_threshold
        );
        ensure!(
            !self.output_prefix.trim().is_empty(),
            "output_prefix cannot be empty"
        );
        Ok(())
    }
}
