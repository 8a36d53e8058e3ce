//! Rank command: fetch and rank the contributors of a repository or an
//! organization.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{ArgGroup, Args};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument, warn};

use tally_core::config::{Config, GitHubConfig};
use tally_core::{Contributor, RepoOperation, RequestParams, TrueContributors};

use crate::github::HttpGitHub;

/// Arguments for the `rank` subcommand.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["org", "repo"])))]
pub struct RankArgs {
    /// What to count
    #[arg(value_enum)]
    pub operation: RepoOperation,

    /// Rank across every repository of this organization
    #[arg(long, value_name = "ORG")]
    pub org: Option<String>,

    /// Rank a single repository
    #[arg(long, value_name = "OWNER/REPO")]
    pub repo: Option<RepoSlug>,

    /// Only count activity at or after this ISO 8601 timestamp
    #[arg(long, value_name = "TIMESTAMP")]
    pub since: Option<String>,

    /// Only count commits before this ISO 8601 timestamp
    #[arg(long, value_name = "TIMESTAMP")]
    pub until: Option<String>,

    /// Branch name or commit SHA to list commits from
    #[arg(long, value_name = "REF")]
    pub sha: Option<String>,

    /// Only count commits touching this path
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Organization repository type (all, public, private, forks, sources, member)
    #[arg(long = "type", value_name = "TYPE", requires = "org")]
    pub repo_type: Option<String>,

    /// Show at most N contributors
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Also write the full ranking as JSON to FILE
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// GitHub token (overrides config)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API root (overrides config)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,
}

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    /// Account that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(format!("expected OWNER/REPO, got `{s}`")),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl RankArgs {
    /// Translate the flags into engine parameters. Only flags that were given
    /// are set.
    pub fn request_params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        if let Some(ref org) = self.org {
            params.insert("org", org.as_str());
        }
        if let Some(ref repo) = self.repo {
            params.insert("owner", repo.owner.as_str());
            params.insert("repo", repo.name.as_str());
        }
        let optional = [
            ("since", &self.since),
            ("until", &self.until),
            ("sha", &self.sha),
            ("path", &self.path),
            ("type", &self.repo_type),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params.insert(key, value.as_str());
            }
        }
        params
    }

    fn target(&self) -> String {
        match (&self.org, &self.repo) {
            (Some(org), _) => format!("organization {org}"),
            (None, Some(repo)) => repo.to_string(),
            (None, None) => "nothing".to_string(),
        }
    }
}

/// Fetch, rank, and print contributors.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
#[instrument(name = "cmd_rank", skip_all, fields(operation = %args.operation))]
pub async fn cmd_rank(args: RankArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let params = args.request_params();
    let target = args.target();
    debug!(json_output = global_json, %target, "executing rank command");

    let mut config = config.clone();
    if let Some(ref api_url) = args.api_url {
        config
            .github
            .get_or_insert_with(GitHubConfig::default)
            .api_url = Some(api_url.clone());
    }
    let client = HttpGitHub::from_config(&config, args.token.clone())
        .context("failed to build GitHub client")?;
    if !client.is_authenticated() {
        warn!("no GitHub token configured; requests are unauthenticated and heavily rate limited");
    }
    let tally = TrueContributors::new(client);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(format!("Counting {} for {target}...", args.operation));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let result = if args.org.is_some() {
        tally.list_for_org(args.operation, &params).await
    } else {
        tally.list_for_repo(args.operation, &params).await
    };
    spinner.finish_and_clear();
    let ranked = result.with_context(|| format!("failed to rank {target}"))?;
    info!(contributors = ranked.len(), "ranking complete");

    if let Some(ref path) = args.output {
        let pretty = config
            .output
            .as_ref()
            .and_then(|o| o.pretty)
            .unwrap_or(true);
        write_ranking(path, &ranked, pretty)?;
        info!(path = %path.display(), "ranking written");
    }

    let shown = limited(&ranked, args.limit.or(config.limit()));
    if global_json {
        println!("{}", serde_json::to_string_pretty(shown)?);
    } else {
        print_table(shown, ranked.len(), &args.operation, &target);
        if let Some(ref path) = args.output {
            println!();
            println!("  {} Wrote {}", "✓".green(), path.display().cyan());
        }
    }

    Ok(())
}

fn limited(ranked: &[Contributor], limit: Option<usize>) -> &[Contributor] {
    match limit {
        Some(n) => &ranked[..n.min(ranked.len())],
        None => ranked,
    }
}

fn write_ranking(path: &Path, ranked: &[Contributor], pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(ranked)?
    } else {
        serde_json::to_string(ranked)?
    };
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}

fn print_table(shown: &[Contributor], total: usize, operation: &RepoOperation, target: &str) {
    println!(
        "{} {}",
        format!("Top contributors by {operation}").bold().underline(),
        format!("({target})").dimmed()
    );
    if shown.is_empty() {
        println!("  {} No contributors found", "○".yellow());
        return;
    }

    let width = shown
        .iter()
        .map(|c| display_name(c).len())
        .max()
        .unwrap_or(0);
    for (position, contributor) in shown.iter().enumerate() {
        println!(
            "  {:>4}  {:<width$}  {}",
            format!("{}.", position + 1).dimmed(),
            display_name(contributor).cyan(),
            contributor.contributions.green(),
        );
    }
    if shown.len() < total {
        println!(
            "  {}",
            format!("... and {} more", total - shown.len()).dimmed()
        );
    }
}

fn display_name(contributor: &Contributor) -> String {
    contributor
        .login()
        .map_or_else(|| format!("#{}", contributor.key()), str::to_string)
}
