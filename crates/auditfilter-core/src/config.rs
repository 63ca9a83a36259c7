use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "auditfilter.toml";

/// Environment variable overriding `[store] path`.
pub const STORE_ENV: &str = "AUDITFILTER_STORE";

/// Environment variable overriding `[output] format`.
pub const OUTPUT_ENV: &str = "AUDITFILTER_OUTPUT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Option<String>,
}

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Parse a user-supplied format name; `None` for anything unknown.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "human" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// Values given on the command line, which win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub json: bool,
}

/// Configuration after applying flag > env > file > default precedence.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config: ControllerConfig,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
    pub store_path: PathBuf,
    pub busy_timeout: Duration,
    pub output: OutputFormat,
}

/// Read a config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML for
/// [`ControllerConfig`].
pub fn load_config_file(path: &Path) -> Result<ControllerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ControllerConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Locate and load the configuration.
///
/// Lookup order: `explicit` (must exist), `<cwd>/auditfilter.toml`, then
/// `<config dir>/auditfilter/config.toml`. Falls back to defaults when none
/// exists.
///
/// # Errors
///
/// Returns an error if `explicit` is missing or any found file fails to load.
pub fn load_config(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(ControllerConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = load_config_file(path)?;
        return Ok((config, Some(path.to_path_buf())));
    }

    let candidates = std::iter::once(cwd.join(CONFIG_FILE_NAME))
        .chain(dirs::config_dir().map(|dir| dir.join("auditfilter/config.toml")));

    for path in candidates {
        if path.is_file() {
            let config = load_config_file(&path)?;
            return Ok((config, Some(path)));
        }
    }

    Ok((ControllerConfig::default(), None))
}

/// Load configuration and apply environment and CLI overrides.
///
/// # Errors
///
/// Returns an error if a config file fails to load.
pub fn resolve_config(cwd: &Path, cli: &CliOverrides) -> Result<EffectiveConfig> {
    let (config, source) = load_config(cli.config.as_deref(), cwd)?;
    Ok(resolve_with_env(config, source, cwd, cli, |key| env::var(key).ok()))
}

fn resolve_with_env(
    config: ControllerConfig,
    source: Option<PathBuf>,
    cwd: &Path,
    cli: &CliOverrides,
    env_var: impl Fn(&str) -> Option<String>,
) -> EffectiveConfig {
    let store_path = cli
        .store
        .clone()
        .or_else(|| env_var(STORE_ENV).filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| config.store.path.clone());
    let store_path = cwd.join(store_path);

    let output = if cli.json {
        OutputFormat::Json
    } else {
        env_var(OUTPUT_ENV)
            .as_deref()
            .and_then(OutputFormat::parse)
            .or_else(|| config.output.format.as_deref().and_then(OutputFormat::parse))
            .unwrap_or_default()
    };

    EffectiveConfig {
        busy_timeout: config.store.busy_timeout(),
        config,
        source,
        store_path,
        output,
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".auditfilter/store.sqlite3")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}
