//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::RunConfig;

/// Minimal test runner with isolated fork tests
#[derive(Parser, Debug)]
#[command(name = "tst")]
#[command(version = "0.1.0")]
#[command(about = "Run the bundled test suite and report as pretty text or TAP")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the test suite
    Run(RunArgs),

    /// List registered tests
    List(ListArgs),

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Only run tests whose name matches this pattern (case-insensitive)
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Stop after the first failure
    #[arg(short, long)]
    pub bail: bool,

    /// Suppress per-test output
    #[arg(short, long)]
    pub mute: bool,

    /// Output format (pretty, tap)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Default per-test timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Fork test backend (thread, process)
    #[arg(short, long)]
    pub isolation: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Start once registration settles instead of immediately
    #[arg(long)]
    pub autorun: bool,
}

impl RunArgs {
    /// Apply flags on top of `config`; flags win
    pub fn apply(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(grep) = &self.grep {
            config.grep = Some(grep.clone());
        }
        if self.bail {
            config.bail = true;
        }
        if self.mute {
            config.mute = true;
        }
        if let Some(format) = &self.format {
            config.format = format.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if let Some(isolation) = &self.isolation {
            config.isolation = isolation.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a configuration file with defaults
    Init {
        /// Output path
        #[arg(short, long, default_value = "tst.yaml")]
        output: String,
    },

    /// Describe the TST_* environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IsolationMode;
    use crate::output::OutputFormat;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["tst", "list", "--json"]);
        match args.command {
            Command::List(list_args) => {
                assert!(list_args.json);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "tst",
            "run",
            "--grep",
            "^fork",
            "--bail",
            "--format",
            "tap",
            "--timeout",
            "250",
            "--isolation",
            "process",
        ]);
        match args.command {
            Command::Run(run_args) => {
                assert_eq!(run_args.grep.as_deref(), Some("^fork"));
                assert!(run_args.bail);
                assert!(!run_args.mute);

                let mut config = RunConfig::default();
                run_args.apply(&mut config).unwrap();
                assert_eq!(config.format, OutputFormat::Tap);
                assert_eq!(config.timeout_ms, 250);
                assert_eq!(config.isolation, IsolationMode::Process);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = RunConfig {
            grep: Some("from file".to_string()),
            timeout_ms: 100,
            ..RunConfig::default()
        };
        let run_args = RunArgs {
            grep: Some("from flag".to_string()),
            ..RunArgs::default()
        };
        run_args.apply(&mut config).unwrap();

        assert_eq!(config.grep.as_deref(), Some("from flag"));
        assert_eq!(config.timeout_ms, 100);

        let bad = RunArgs {
            format: Some("junit".to_string()),
            ..RunArgs::default()
        };
        assert!(bad.apply(&mut config).is_err());
    }
}
