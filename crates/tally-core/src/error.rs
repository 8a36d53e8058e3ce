//! Error types for tally-core

use thiserror::Error;

use crate::github::ApiError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from contribution aggregation, ranking, and the fetchers built on them.
#[derive(Error, Debug)]
pub enum ContributorError {
    /// Aggregation was asked to fold events without naming the field that
    /// holds the contributor.
    #[error("no contribution identifier was given")]
    MissingIdentifierField,

    /// A contribution event lacks the identifier field entirely.
    #[error("contribution {record} has no property {field}")]
    MissingField {
        /// The identifier field that was expected.
        field: String,
        /// The offending event, serialized as JSON.
        record: String,
    },

    /// A contributor record has no usable `contributions` count.
    #[error("contributor {record} has no property contributions")]
    MissingContributions {
        /// The offending record, serialized as JSON.
        record: String,
    },

    /// A contributor record has no usable `id`.
    #[error("contributor {record} has no property id")]
    MissingId {
        /// The offending record, serialized as JSON.
        record: String,
    },

    /// An organization fan-out was requested for an operation tally does not know.
    #[error("unexpected operation {0} provided")]
    UnexpectedOperation(String),

    /// The organization repository listing returned a record without
    /// `name` or `owner.login`.
    #[error("repository {record} is missing {field}")]
    MalformedRepository {
        /// The missing field (`name` or `owner.login`).
        field: &'static str,
        /// The offending repository record, serialized as JSON.
        record: String,
    },

    /// Error surfaced unchanged from the GitHub API collaborator.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type alias using [`ContributorError`].
pub type ContributorResult<T> = Result<T, ContributorError>;
