//! tst - run the bundled test suite
//!
//! ## Usage
//!
//! ```bash
//! # Run everything with pretty output
//! tst run
//!
//! # Only fork tests, TAP output, fork tests in child processes
//! tst run --grep '^fork' --format tap --isolation process
//!
//! # List registered tests
//! tst list --json
//!
//! # Write a default config file
//! tst config init --output tst.yaml
//! ```
//!
//! Launched with `TST_ISOLATE` set, the binary serves a single fork test
//! request on stdin instead.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tst_engine::cli::{self, Args, ConfigAction, ListArgs, RunArgs};
use tst_engine::config::env::{print_env_help, EnvConfig};
use tst_engine::config::{file, RunConfig};
use tst_engine::isolate::is_isolate_child;
use tst_engine::utils::{init_logger, LogLevel};
use tst_engine::{demo, Session, Stabilizer};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    if is_isolate_child() {
        init_logger(LogLevel::Warn);
        let session = Session::default();
        demo::register(&session);
        return Ok(session.serve_isolate().await);
    }

    let args = Args::parse();
    init_logger(if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    });

    match args.command {
        cli::Command::Run(run_args) => run_suite(run_args).await,
        cli::Command::List(list_args) => {
            list_tests(list_args)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Config { action } => {
            manage_config(action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then file, then environment
fn load_config(path: Option<&str>) -> Result<RunConfig> {
    let env = EnvConfig::load();
    let path = path.map(str::to_string).or_else(|| env.config_file.clone());

    let mut config = match path {
        Some(path) => RunConfig::load(file::expand_path(&path))?,
        None => RunConfig::load_default()?,
    };
    config
        .merge_env(&env)
        .context("Invalid TST_* environment override")?;
    Ok(config)
}

async fn run_suite(run_args: RunArgs) -> Result<ExitCode> {
    let mut config = load_config(run_args.config.as_deref())?;
    run_args.apply(&mut config)?;
    let options = config.resolve()?;
    info!(
        "Running with timeout {}ms, format {:?}, isolation {}",
        config.timeout_ms, config.format, config.isolation
    );

    let session = Session::new(options);
    demo::register(&session);

    let mut reporter = config.format.reporter(!run_args.no_color);
    let state = if run_args.autorun {
        match session
            .auto_run(reporter.as_mut(), &Stabilizer::default())
            .await
        {
            Some(state) => state,
            None => {
                warn!("No tests registered, nothing to run");
                return Ok(ExitCode::SUCCESS);
            }
        }
    } else {
        session.run(reporter.as_mut()).await
    };

    Ok(state.exit_code())
}

fn list_tests(args: ListArgs) -> Result<()> {
    let session = Session::default();
    demo::register(&session);
    let listing = session.list();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("Registered tests:");
    println!();
    for entry in &listing {
        println!("  {:>3}  {:<6}  {}", entry.index, entry.kind, entry.name);
    }
    println!();
    println!("Total: {} tests", listing.len());
    Ok(())
}

fn manage_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigAction::Init { output } => {
            RunConfig::default().save(&output)?;
            println!("Wrote default configuration to {output}");
        }
        ConfigAction::Env => print_env_help(),
    }
    Ok(())
}
