use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::store::RecoveryPolicy;

/// Optional settings file looked up in the working directory (any format `config` understands).
const SETTINGS_FILE: &str = "eval_digest";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub results_file: String,
    pub snapshot_file: String,
    pub concurrency: usize,
    pub strict_store: bool,
}

impl Settings {
    /// Defaults, then `eval_digest.toml`, then `EVAL_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::builder()?
            .add_source(File::with_name(SETTINGS_FILE).required(false))
            .add_source(Environment::with_prefix("EVAL"))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("output_dir", "outputs")?
            .set_default("results_file", "results.json")?
            .set_default("snapshot_file", "results_updated.json")?
            .set_default("concurrency", 2)?
            .set_default("strict_store", false)?)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(&self.results_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(&self.snapshot_file)
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        if self.strict_store {
            RecoveryPolicy::Strict
        } else {
            RecoveryPolicy::StartFresh
        }
    }
}
