//! Environment variable configuration
//!
//! `TST_*` overrides for the run configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TST";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Name pattern from TST_GREP
    pub grep: Option<String>,
    /// Bail from TST_BAIL
    pub bail: Option<bool>,
    /// Mute from TST_MUTE
    pub mute: Option<bool>,
    /// Output format from TST_FORMAT
    pub format: Option<String>,
    /// Timeout in milliseconds from TST_TIMEOUT
    pub timeout: Option<u64>,
    /// Isolation backend from TST_ISOLATION
    pub isolation: Option<String>,
    /// Config file from TST_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            grep: get_env("GREP"),
            bail: get_env_bool("BAIL"),
            mute: get_env_bool("MUTE"),
            format: get_env("FORMAT"),
            timeout: get_env_parse("TIMEOUT"),
            isolation: get_env("ISOLATION"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.grep.is_some()
            || self.bail.is_some()
            || self.mute.is_some()
            || self.format.is_some()
            || self.timeout.is_some()
            || self.isolation.is_some()
            || self.config_file.is_some()
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grep(mut self, pattern: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_GREP"), pattern.into()));
        self
    }

    pub fn bail(mut self, bail: bool) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_BAIL"), bail.to_string()));
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_MUTE"), mute.to_string()));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_FORMAT"), format.into()));
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_TIMEOUT"), ms.to_string()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all TST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_GREP        Only run tests whose name matches (case-insensitive regex)");
    println!("  {ENV_PREFIX}_BAIL        Stop after the first failure (true/false)");
    println!("  {ENV_PREFIX}_MUTE        Suppress per-test output (true/false)");
    println!("  {ENV_PREFIX}_FORMAT      Output format (pretty, tap)");
    println!("  {ENV_PREFIX}_TIMEOUT     Default per-test timeout in milliseconds");
    println!("  {ENV_PREFIX}_ISOLATION   Fork test backend (thread, process)");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_GREP='^fork'");
    println!("  tst run --format tap");
}
