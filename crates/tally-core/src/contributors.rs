//! Per-repository and organization-wide contributor rankings.
//!
//! [`TrueContributors`] wraps a [`GitHubApi`] and turns its raw listings into
//! ranked [`Contributor`] lists. Every fetch is awaited before the next one
//! starts, and every combined result is re-folded from the union of its
//! inputs.
//!
//! Two listings misbehave on empty repositories and are recovered locally:
//!
//! - commit pagination fails with `409 Git Repository is empty.`
//! - contributor pagination fails outright; a single probe request that
//!   answers `204 No Content` confirms the repository is empty.
//!
//! Every other collaborator error propagates unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::aggregate::{aggregate_contributions, aggregate_contributors, rank_contributors};
use crate::contributor::Contributor;
use crate::error::{ContributorError, ContributorResult};
use crate::github::{Endpoint, GitHubApi};
use crate::params::RequestParams;

/// Parameters forwarded to the commit listing.
pub const COMMIT_PARAMS: &[&str] = &["owner", "repo", "sha", "path", "since", "until"];

/// Parameters forwarded to the issue comment listing.
pub const COMMENT_PARAMS: &[&str] = &["owner", "repo", "since"];

/// Parameters forwarded to the native contributor listing.
pub const CONTRIBUTOR_PARAMS: &[&str] = &["owner", "repo"];

/// Parameters forwarded by the combined commit + comment ranking.
pub const COMMIT_COMMENT_PARAMS: &[&str] = &["owner", "repo", "since"];

/// Parameters forwarded to the organization repository listing.
pub const ORG_PARAMS: &[&str] = &["org", "type"];

/// Field naming the contributor on a commit.
pub const COMMIT_IDENTIFIER: &str = "author";

/// Field naming the contributor on an issue comment.
pub const COMMENT_IDENTIFIER: &str = "user";

/// A per-repository ranking that can be fanned out across an organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum RepoOperation {
    /// Rank by commits authored.
    Commits,
    /// Rank by issue comments written.
    Comments,
    /// GitHub's own contributor list.
    Contributors,
    /// Commits (or the contributor list) plus issue comments.
    CommitComments,
}

impl RepoOperation {
    /// Every operation, in display order.
    pub const ALL: [Self; 4] = [
        Self::Commits,
        Self::Comments,
        Self::Contributors,
        Self::CommitComments,
    ];

    /// Stable kebab-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::Comments => "comments",
            Self::Contributors => "contributors",
            Self::CommitComments => "commit-comments",
        }
    }
}

impl fmt::Display for RepoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoOperation {
    type Err = ContributorError;

    /// Accepts the kebab-case names and the historical method names
    /// (`listCommitContributors`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commits" | "listCommitContributors" => Ok(Self::Commits),
            "comments" | "listCommentContributors" => Ok(Self::Comments),
            "contributors" | "listContributors" => Ok(Self::Contributors),
            "commit-comments" | "listCommitCommentContributors" => Ok(Self::CommitComments),
            other => Err(ContributorError::UnexpectedOperation(other.to_string())),
        }
    }
}

/// Contributor rankings computed over a [`GitHubApi`].
#[derive(Debug, Clone)]
pub struct TrueContributors<A> {
    api: A,
}

impl<A: GitHubApi> TrueContributors<A> {
    /// Wrap an API collaborator.
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    /// Borrow the wrapped collaborator.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Rank a repository's contributors by commits authored.
    ///
    /// Forwards `owner`, `repo`, `sha`, `path`, `since`, `until`. Commits whose
    /// author has no GitHub account are not counted. An empty repository
    /// yields an empty ranking.
    #[instrument(skip_all, fields(owner = params.get_str("owner"), repo = params.get_str("repo")))]
    pub async fn list_commit_contributors(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        let params = params.filter(COMMIT_PARAMS);
        let commits = match self.api.paginate(Endpoint::ListCommits, &params).await {
            Ok(commits) => commits,
            Err(err) if err.is_empty_repository() => {
                debug!("repository is empty, no commits to count");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };
        debug!(commits = commits.len(), "fetched commits");
        Ok(aggregate_contributions(&commits, COMMIT_IDENTIFIER)?.rank())
    }

    /// Rank a repository's contributors by issue comments written.
    ///
    /// Forwards `owner`, `repo`, `since`.
    #[instrument(skip_all, fields(owner = params.get_str("owner"), repo = params.get_str("repo")))]
    pub async fn list_comment_contributors(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        let params = params.filter(COMMENT_PARAMS);
        let comments = self
            .api
            .paginate(Endpoint::ListIssueComments, &params)
            .await?;
        debug!(comments = comments.len(), "fetched issue comments");
        Ok(aggregate_contributions(&comments, COMMENT_IDENTIFIER)?.rank())
    }

    /// GitHub's native contributor list for a repository, ranked.
    ///
    /// Forwards `owner` and `repo`. If pagination fails, a single probe
    /// request decides: `204 No Content` means the repository is empty,
    /// anything else re-raises the pagination error. So does a failed probe;
    /// its own error is only logged.
    #[instrument(skip_all, fields(owner = params.get_str("owner"), repo = params.get_str("repo")))]
    pub async fn list_contributors(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        let params = params.filter(CONTRIBUTOR_PARAMS);
        let records = match self
            .api
            .paginate(Endpoint::ListRepoContributors, &params)
            .await
        {
            Ok(records) => records,
            Err(err) => match self
                .api
                .request(Endpoint::ListRepoContributors, &params)
                .await
            {
                Ok(probe) if probe.is_no_content() => {
                    debug!("repository is empty, no contributors listed");
                    Vec::new()
                }
                Ok(_) => return Err(err.into()),
                Err(check_err) => {
                    debug!(error = %check_err, "empty-repository check failed");
                    return Err(err.into());
                }
            },
        };
        debug!(records = records.len(), "fetched contributor list");
        Ok(aggregate_contributors(&records)?.rank())
    }

    /// Rank a repository's contributors by commits plus issue comments.
    ///
    /// With `since`, commits are counted from history (the contributor
    /// endpoint cannot filter by time). Without it, GitHub's contributor list
    /// is used instead, which is much cheaper.
    #[instrument(skip_all, fields(owner = params.get_str("owner"), repo = params.get_str("repo")))]
    pub async fn list_commit_comment_contributors(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        let params = params.filter(COMMIT_COMMENT_PARAMS);
        let committers = if params.contains_key("since") {
            self.list_commit_contributors(&params).await?
        } else {
            self.list_contributors(&params).await?
        };
        let commenters = self.list_comment_contributors(&params).await?;
        Ok(rank_contributors(committers.into_iter().chain(commenters)))
    }

    /// Run one per-repository operation.
    pub async fn list_for_repo(
        &self,
        operation: RepoOperation,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        match operation {
            RepoOperation::Commits => self.list_commit_contributors(params).await,
            RepoOperation::Comments => self.list_comment_contributors(params).await,
            RepoOperation::Contributors => self.list_contributors(params).await,
            RepoOperation::CommitComments => self.list_commit_comment_contributors(params).await,
        }
    }

    /// Run `operation` on every repository of `params["org"]` and merge the
    /// results into one ranking.
    ///
    /// The organization listing receives `org` and `type`. Each repository
    /// call receives `owner` and `repo` from the listing overlaid with all of
    /// `params`, so an explicit `owner`/`repo` in `params` wins.
    #[instrument(skip_all, fields(operation = %operation, org = params.get_str("org")))]
    pub async fn list_for_org(
        &self,
        operation: RepoOperation,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        let repos = self
            .api
            .paginate(Endpoint::ListOrgRepos, &params.filter(ORG_PARAMS))
            .await?;
        info!(repositories = repos.len(), "listed organization repositories");

        let mut contributors = Vec::new();
        for repo in &repos {
            let (owner, name) = repo_coordinates(repo)?;
            let mut repo_params = RequestParams::new().with("owner", owner).with("repo", name);
            repo_params.extend(params.clone());

            let span = info_span!("repository", owner, name);
            let ranked = self
                .list_for_repo(operation, &repo_params)
                .instrument(span)
                .await?;
            info!(owner, name, contributors = ranked.len(), "repository ranked");
            contributors.extend(ranked);
        }

        let ranked = rank_contributors(contributors);
        if ranked.is_empty() && !repos.is_empty() {
            warn!("organization repositories produced no contributors");
        }
        Ok(ranked)
    }

    /// [`list_for_org`](Self::list_for_org) with [`RepoOperation::Commits`].
    pub async fn list_commit_contributors_for_org(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        self.list_for_org(RepoOperation::Commits, params).await
    }

    /// [`list_for_org`](Self::list_for_org) with [`RepoOperation::Comments`].
    pub async fn list_comment_contributors_for_org(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        self.list_for_org(RepoOperation::Comments, params).await
    }

    /// [`list_for_org`](Self::list_for_org) with [`RepoOperation::Contributors`].
    pub async fn list_contributors_for_org(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        self.list_for_org(RepoOperation::Contributors, params).await
    }

    /// [`list_for_org`](Self::list_for_org) with [`RepoOperation::CommitComments`].
    pub async fn list_commit_comment_contributors_for_org(
        &self,
        params: &RequestParams,
    ) -> ContributorResult<Vec<Contributor>> {
        self.list_for_org(RepoOperation::CommitComments, params)
            .await
    }
}

fn repo_coordinates(repo: &Value) -> ContributorResult<(&str, &str)> {
    let malformed = |field| ContributorError::MalformedRepository {
        field,
        record: repo.to_string(),
    };
    let owner = repo
        .pointer("/owner/login")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("owner.login"))?;
    let name = repo
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("name"))?;
    Ok((owner, name))
}
