//! Configuration module
//!
//! Sources the run configuration. Precedence, lowest first: defaults,
//! config file, `TST_*` environment, command-line flags.

pub mod env;
pub mod file;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::executor::{RunOptions, DEFAULT_TIMEOUT_MS};
use crate::isolate::{Isolation, ProcessIsolation};
use crate::output::OutputFormat;
use env::EnvConfig;

/// Which isolation backend fork tests use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    #[default]
    Thread,
    Process,
}

impl FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(IsolationMode::Thread),
            "process" => Ok(IsolationMode::Process),
            other => Err(format!("Unknown isolation mode: {other}")),
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationMode::Thread => f.write_str("thread"),
            IsolationMode::Process => f.write_str("process"),
        }
    }
}

/// Unresolved run configuration, as written in files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Per-test timeout in milliseconds
    pub timeout_ms: u64,

    /// Test name pattern (case-insensitive regex)
    pub grep: Option<String>,

    /// Stop after the first counted failure
    pub bail: bool,

    /// Suppress per-test output
    pub mute: bool,

    pub format: OutputFormat,

    pub isolation: IsolationMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            grep: None,
            bail: false,
            mute: false,
            format: OutputFormat::default(),
            isolation: IsolationMode::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from the first standard location that exists, else defaults
    pub fn load_default() -> Result<Self> {
        match file::find() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than zero");
        }
        if let Some(grep) = &self.grep {
            RegexBuilder::new(grep)
                .build()
                .with_context(|| format!("Invalid grep pattern: {grep}"))?;
        }
        Ok(())
    }

    /// Apply `TST_*` environment overrides
    pub fn merge_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(timeout) = env.timeout {
            self.timeout_ms = timeout;
        }
        if let Some(grep) = &env.grep {
            self.grep = Some(grep.clone());
        }
        if let Some(bail) = env.bail {
            self.bail = bail;
        }
        if let Some(mute) = env.mute {
            self.mute = mute;
        }
        if let Some(format) = &env.format {
            self.format = format.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(isolation) = &env.isolation {
            self.isolation = isolation.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }

    /// Produce the options the scheduler runs with
    pub fn resolve(&self) -> Result<RunOptions> {
        self.validate()?;

        let mut options = RunOptions::new()
            .timeout_ms(self.timeout_ms)
            .bail(self.bail)
            .mute(self.mute);
        if let Some(grep) = &self.grep {
            options = options
                .pattern(grep)
                .with_context(|| format!("Invalid grep pattern: {grep}"))?;
        }

        let isolation = match self.isolation {
            IsolationMode::Thread => Isolation::Thread,
            IsolationMode::Process => Isolation::Process(
                ProcessIsolation::current_exe()
                    .context("Failed to locate the current executable for process isolation")?,
            ),
        };
        Ok(options.isolation(isolation))
    }
}
