//! Doctor command: diagnose configuration and environment.

use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tally_core::config;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to the project config file, if any
    file: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: Option<String>,
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    /// Whether the variable is set at all.
    set: bool,
    /// The value, for variables that are safe to show.
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn shown(name: &'static str, description: &'static str) -> Self {
        let value = std::env::var(name).ok();
        Self {
            name,
            set: value.is_some(),
            value,
            description,
        }
    }

    fn secret(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            set: std::env::var_os(name).is_some(),
            value: None,
            description,
        }
    }
}

impl DoctorReport {
    fn gather(cwd: &camino::Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                env_vars: vec![
                    EnvVar::secret("GITHUB_TOKEN", "Token for authenticated API requests"),
                    EnvVar::shown("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::shown("XDG_DATA_HOME", "Override data directory"),
                    EnvVar::shown("RUST_LOG", "Log filter directive"),
                    EnvVar::shown("TALLY_LOG_PATH", "Explicit log file path"),
                    EnvVar::shown("TALLY_LOG_DIR", "Log directory"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let report = DoctorReport::gather(cwd);
    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    match report.config.file {
        Some(ref file) => println!("  {} Config file: {}", "✓".green(), file.cyan()),
        None => {
            println!("  {} No config file found", "○".yellow());
            offer_config_creation()?;
        }
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    for var in &report.environment.env_vars {
        match (var.set, var.value.as_deref()) {
            (true, Some(value)) => println!("  {}: {}", var.name.dimmed(), value.cyan()),
            (true, None) => println!("  {}: {}", var.name.dimmed(), "set".green()),
            (false, _) if var.name == "GITHUB_TOKEN" => println!(
                "  {} {} not set; API requests will be rate limited",
                "○".yellow(),
                var.name
            ),
            (false, _) => {}
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yaml");

    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) || config_path.exists() {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted prompts leave things as they are.
    if let Ok(true) = create {
        std::fs::create_dir_all(&config_dir)?;
        let yaml = serde_saphyr::to_string(&config::Config::default())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
