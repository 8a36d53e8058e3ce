//! tally CLI
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use tally::{Cli, Commands, commands};
use tally_core::config::{Config, ConfigLoader};
use tracing::debug;

mod observability;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    let cwd = working_dir(&cli)?;
    let config = load_config(&cli, &cwd)?;

    let log_dir = config.log_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf());
    let filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(
        &observability::ObservabilityConfig::from_env(log_dir),
        filter,
    )
    .context("failed to initialize logging")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let result = run(cli, &config, &cwd).await;
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

async fn run(cli: Cli, config: &Config, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    match cli.command {
        Commands::Rank(args) => commands::rank::cmd_rank(args, cli.json, config).await,
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, cwd),
        Commands::Info(args) => commands::info::cmd_info(args, cli.json, config, cwd),
    }
}

/// Apply `-C` and return the directory config discovery starts from.
fn working_dir(cli: &Cli) -> anyhow::Result<Utf8PathBuf> {
    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    utf8(cwd, "current directory")
}

fn load_config(cli: &Cli, cwd: &camino::Utf8Path) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(ref path) = cli.config {
        loader = loader.with_file(&utf8(path.clone(), "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| anyhow::anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display()))
}
