use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CryptsecError, CryptsecResult};

/// Top-level configuration (loaded from config.toml)
///
/// Key derivation parameters are deliberately absent: they are fixed policy
/// in `cryptsec-crypto` and not tunable per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptsecConfig {
    pub run: RunConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrent workers for directory runs (clamped to the file count)
    pub workers: usize,
    /// Overwrite passes before deleting plaintext (0 = plain delete)
    pub passes: u32,
    /// Glob patterns matched against file names; matches are not enumerated
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 30,
            passes: 0,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl CryptsecConfig {
    /// Parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CryptsecResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| CryptsecError::io(path, e))?;
        Self::parse(&content)
            .map_err(|e| CryptsecError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        match self.log.format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("log.format must be \"json\" or \"text\", got {other:?}"),
        }
        Ok(())
    }
}
