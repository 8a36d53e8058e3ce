//! The GitHub API surface the engine depends on.
//!
//! tally-core never speaks HTTP itself. Callers supply a [`GitHubApi`]
//! implementation that can list every page of an endpoint and make a single
//! unpaginated probe request. The CLI ships a `reqwest`-backed one; tests use
//! in-memory fakes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::params::RequestParams;

/// Message GitHub returns when commits are listed on a repository with no commits.
pub const EMPTY_REPOSITORY_MESSAGE: &str = "Git Repository is empty.";

/// Status GitHub returns alongside [`EMPTY_REPOSITORY_MESSAGE`].
pub const EMPTY_REPOSITORY_STATUS: u16 = 409;

/// Status line reported by the contributor endpoint for an empty repository.
pub const NO_CONTENT_STATUS_LINE: &str = "204 No Content";

/// A listing endpoint the engine knows how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /repos/{owner}/{repo}/commits`
    ListCommits,
    /// `GET /repos/{owner}/{repo}/issues/comments`
    ListIssueComments,
    /// `GET /repos/{owner}/{repo}/contributors`
    ListRepoContributors,
    /// `GET /orgs/{org}/repos`
    ListOrgRepos,
}

impl Endpoint {
    /// Path segments that are substituted from request parameters.
    pub const fn path_params(self) -> &'static [&'static str] {
        match self {
            Self::ListCommits | Self::ListIssueComments | Self::ListRepoContributors => {
                &["owner", "repo"]
            }
            Self::ListOrgRepos => &["org"],
        }
    }

    /// Build the request path and the remaining query parameters.
    ///
    /// Path parameters are removed from the returned parameter set. A missing
    /// path parameter is rendered empty; GitHub answers such requests with 404.
    pub fn resolve(self, params: &RequestParams) -> (String, RequestParams) {
        let mut query = params.clone();
        let mut take = |key: &str| query.take_str(key).unwrap_or_default();
        let path = match self {
            Self::ListCommits => format!("/repos/{}/{}/commits", take("owner"), take("repo")),
            Self::ListIssueComments => {
                format!("/repos/{}/{}/issues/comments", take("owner"), take("repo"))
            }
            Self::ListRepoContributors => {
                format!("/repos/{}/{}/contributors", take("owner"), take("repo"))
            }
            Self::ListOrgRepos => format!("/orgs/{}/repos", take("org")),
        };
        (path, query)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListCommits => "list-commits",
            Self::ListIssueComments => "list-issue-comments",
            Self::ListRepoContributors => "list-repo-contributors",
            Self::ListOrgRepos => "list-org-repos",
        };
        f.write_str(name)
    }
}

/// An error reported by the API collaborator.
///
/// The engine never rewrites these: status and message reach the caller
/// exactly as the collaborator produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Error message (GitHub's `message` field, or a transport description).
    pub message: String,
}

impl ApiError {
    /// An error carrying an HTTP status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// An error with no HTTP status (connection failures, bad payloads).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Whether this is the spurious 409 raised when paginating commits of an
    /// empty repository.
    pub fn is_empty_repository(&self) -> bool {
        self.status == Some(EMPTY_REPOSITORY_STATUS) && self.message == EMPTY_REPOSITORY_MESSAGE
    }
}

/// Response metadata from a single unpaginated request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    /// Whether the response is the `204 No Content` an empty repository
    /// produces on the contributor endpoint.
    pub fn is_no_content(&self) -> bool {
        self.status == 204
            && self.headers.get("status").map(String::as_str) == Some(NO_CONTENT_STATUS_LINE)
    }
}

/// Paginated and single-shot access to GitHub listing endpoints.
///
/// Calls are awaited one at a time; implementations need no internal
/// synchronization.
pub trait GitHubApi {
    /// Fetch every page of `endpoint` and return the concatenated records.
    fn paginate(
        &self,
        endpoint: Endpoint,
        params: &RequestParams,
    ) -> impl Future<Output = Result<Vec<Value>, ApiError>>;

    /// Make one unpaginated request and report its status and headers.
    fn request(
        &self,
        endpoint: Endpoint,
        params: &RequestParams,
    ) -> impl Future<Output = Result<ApiResponse, ApiError>>;
}
