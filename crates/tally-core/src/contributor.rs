//! The [`Contributor`] record.
//!
//! GitHub hands back users, commit authors, and contributor-list entries as
//! loosely shaped JSON objects. A `Contributor` keeps the two fields the
//! engine relies on (`id`, `contributions`) typed and carries every other
//! field through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContributorError, ContributorResult};

const ID: &str = "id";
const CONTRIBUTIONS: &str = "contributions";

/// A person credited with a number of contributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Contributor {
    /// Opaque identifier. Always a JSON number or string.
    id: Value,
    /// Total contributions credited so far.
    pub contributions: u64,
    /// Pass-through fields (`login`, `avatar_url`, ...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Contributor {
    /// Create a contributor with no extra metadata.
    ///
    /// # Errors
    ///
    /// [`ContributorError::MissingId`] if `id` is not a number or string.
    pub fn new(id: impl Into<Value>, contributions: u64) -> ContributorResult<Self> {
        let id = id.into();
        if id_key(&id).is_none() {
            return Err(missing_id(&id));
        }
        Ok(Self {
            id,
            contributions,
            metadata: Map::new(),
        })
    }

    /// The contributor's identifier as it appeared in the source record.
    pub const fn id(&self) -> &Value {
        &self.id
    }

    /// Builder-style metadata insert.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The identity key used to fold records together.
    ///
    /// Numbers and strings compare by their text, so `1`, `1.0` and `"1"` are
    /// the same contributor.
    pub fn key(&self) -> String {
        id_key(&self.id).unwrap_or_default()
    }

    /// The `login` field, if the record carries one.
    pub fn login(&self) -> Option<&str> {
        self.metadata.get("login").and_then(Value::as_str)
    }

    /// Parse a pre-counted contributor record.
    ///
    /// The record must carry a non-negative integer `contributions` and a
    /// number or string `id`. The input is not modified.
    pub fn from_record(record: &Value) -> ContributorResult<Self> {
        let Some(object) = record.as_object() else {
            return Err(missing_contributions(record));
        };

        let contributions = object
            .get(CONTRIBUTIONS)
            .and_then(Value::as_u64)
            .ok_or_else(|| missing_contributions(record))?;

        let id = object
            .get(ID)
            .filter(|id| id_key(id).is_some())
            .cloned()
            .ok_or_else(|| missing_id(record))?;

        Ok(Self {
            id,
            contributions,
            metadata: metadata_without_counted_fields(object),
        })
    }

    /// Build a single-contribution record from the user object nested in an
    /// event (`commit.author`, `comment.user`).
    ///
    /// Any `contributions` field already on the user is replaced by `1`.
    pub fn from_identity(user: &Value) -> ContributorResult<Self> {
        let id = user
            .as_object()
            .and_then(|object| object.get(ID))
            .filter(|id| id_key(id).is_some())
            .cloned()
            .ok_or_else(|| missing_id(user))?;

        let metadata = user
            .as_object()
            .map(metadata_without_counted_fields)
            .unwrap_or_default();

        Ok(Self {
            id,
            contributions: 1,
            metadata,
        })
    }
}

impl TryFrom<Value> for Contributor {
    type Error = ContributorError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_record(&value)
    }
}

fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match n.as_f64() {
            // `1.0` renders as "1", matching the integer form
            Some(float) if n.is_f64() => float.to_string(),
            _ => n.to_string(),
        }),
        _ => None,
    }
}

fn metadata_without_counted_fields(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| key.as_str() != ID && key.as_str() != CONTRIBUTIONS)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn missing_contributions(record: &Value) -> ContributorError {
    ContributorError::MissingContributions {
        record: record.to_string(),
    }
}

fn missing_id(record: &Value) -> ContributorError {
    ContributorError::MissingId {
        record: record.to_string(),
    }
}
