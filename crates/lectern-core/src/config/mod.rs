mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunker.validate().context("invalid [chunker] section")?;
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            bail!("retrieval.alpha must be within 0..=1, got {}", self.retrieval.alpha);
        }
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be positive");
        }
        for (name, value) in [
            ("gate.min_score", self.gate.min_score),
            ("gate.min_similarity", self.gate.min_similarity),
            ("gate.min_overlap", self.gate.min_overlap),
        ] {
            if value.is_nan() || value < 0.0 {
                bail!("{name} must be a non-negative number, got {value}");
            }
        }
        Ok(())
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn index(&self) -> Duration {
        Duration::from_secs(self.index_seconds)
    }

    #[must_use]
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_seconds)
    }
}
