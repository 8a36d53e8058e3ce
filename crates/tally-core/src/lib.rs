//! Core library for tally.
//!
//! Ranks GitHub contributors by everything they do (commits, issue comments,
//! and GitHub's own contributor counts) rather than by commits alone, for a
//! single repository or across an organization.
//!
//! # Modules
//!
//! - [`aggregate`] - Folding contributions into a tally and ranking it
//! - [`config`] - Configuration loading and management
//! - [`contributor`] - The contributor record
//! - [`contributors`] - Per-repository fetchers and organization fan-out
//! - [`error`] - Error types and result aliases
//! - [`github`] - The API collaborator interface
//! - [`params`] - Request parameters and whitelist projection
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run(api: impl tally_core::GitHubApi) -> Result<(), tally_core::ContributorError> {
//! use tally_core::{RequestParams, TrueContributors};
//!
//! let tally = TrueContributors::new(api);
//! let params = RequestParams::new().with("org", "rust-lang");
//! for contributor in tally.list_commit_comment_contributors_for_org(&params).await? {
//!     println!("{} {}", contributor.key(), contributor.contributions);
//! }
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod aggregate;

pub mod config;

pub mod contributor;

pub mod contributors;

pub mod error;

pub mod github;

pub mod params;

pub use aggregate::{Tally, aggregate_contributions, aggregate_contributors, rank};
pub use config::{Config, ConfigLoader, LogLevel};
pub use contributor::Contributor;
pub use contributors::{RepoOperation, TrueContributors};
pub use error::{ConfigError, ConfigResult, ContributorError, ContributorResult};
pub use github::{ApiError, ApiResponse, Endpoint, GitHubApi};
pub use params::{RequestParams, filter_params};
