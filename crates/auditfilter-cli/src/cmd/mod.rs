pub mod definition;
pub mod filter;
pub mod user;

use crate::output::OutputMode;
use anyhow::{Context as _, Result};
use auditfilter_core::SqliteStore;
use auditfilter_core::config::EffectiveConfig;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved settings every command runs with.
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputMode,
    pub store_path: PathBuf,
    pub busy_timeout: Duration,
}

impl From<EffectiveConfig> for Context {
    fn from(config: EffectiveConfig) -> Self {
        Self {
            output: config.output.into(),
            store_path: config.store_path,
            busy_timeout: config.busy_timeout,
        }
    }
}

impl Context {
    pub fn open_store(&self) -> Result<SqliteStore> {
        tracing::debug!(path = %self.store_path.display(), "opening filter store");
        SqliteStore::open(&self.store_path, self.busy_timeout)
    }
}

/// Read a definition from `path`, or from stdin when `path` is `-`.
pub fn read_definition(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read definition from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
