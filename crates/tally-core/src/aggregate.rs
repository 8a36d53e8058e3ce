//! Contribution aggregation and ranking.
//!
//! Raw events and pre-counted records are folded into a [`Tally`] keyed by
//! contributor identity, then ranked by total contributions. Aggregation and
//! ranking are separate steps: nothing here sorts until [`Tally::rank`] is
//! called.
//!
//! ```
//! use serde_json::json;
//! use tally_core::aggregate::aggregate_contributions;
//!
//! let comments = vec![
//!     json!({ "user": { "id": 1 } }),
//!     json!({ "user": { "id": 1 } }),
//!     json!({ "user": null }),
//!     json!({ "user": { "id": 2 } }),
//! ];
//! let ranked = aggregate_contributions(&comments, "user").unwrap().rank();
//! assert_eq!(ranked[0].contributions, 2);
//! assert_eq!(ranked.len(), 2);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tracing::{instrument, trace};

use crate::contributor::Contributor;
use crate::error::{ContributorError, ContributorResult};

/// Contributors folded by identity.
///
/// The first record seen for an identity is kept as the base; later records
/// for the same identity only add to its count. Iteration and ranking ties
/// follow first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    entries: Vec<Contributor>,
    index: HashMap<String, usize>,
}

impl Tally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one contributor into the tally.
    pub fn add(&mut self, contributor: Contributor) {
        let key = contributor.key();
        match self.index.get(&key) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                entry.contributions = entry.contributions.saturating_add(contributor.contributions);
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(contributor);
            }
        }
    }

    /// Look up a contributor by identity key (see [`Contributor::key`]).
    pub fn get(&self, key: &str) -> Option<&Contributor> {
        self.index.get(key).map(|&slot| &self.entries[slot])
    }

    /// Number of distinct contributors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no contributor has been folded in.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contributors in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &Contributor> {
        self.entries.iter()
    }

    /// Consume the tally into contributors sorted by contributions, descending.
    pub fn rank(self) -> Vec<Contributor> {
        rank(self)
    }
}

impl Extend<Contributor> for Tally {
    fn extend<I: IntoIterator<Item = Contributor>>(&mut self, iter: I) {
        for contributor in iter {
            self.add(contributor);
        }
    }
}

impl FromIterator<Contributor> for Tally {
    fn from_iter<I: IntoIterator<Item = Contributor>>(iter: I) -> Self {
        let mut tally = Self::new();
        tally.extend(iter);
        tally
    }
}

/// Turn one raw event into a single-contribution record.
///
/// Returns `Ok(None)` when `event[field]` is `null` (a deleted or anonymous
/// account), and [`ContributorError::MissingField`] when the key is absent.
pub fn normalize_event(event: &Value, field: &str) -> ContributorResult<Option<Contributor>> {
    let Some(user) = event.as_object().and_then(|object| object.get(field)) else {
        return Err(ContributorError::MissingField {
            field: field.to_string(),
            record: event.to_string(),
        });
    };

    if user.is_null() {
        trace!(field, "skipping event with null contributor");
        return Ok(None);
    }

    Contributor::from_identity(user).map(Some)
}

/// Fold raw events into a tally, crediting one contribution per event to the
/// user found under `field`.
///
/// # Errors
///
/// - [`ContributorError::MissingIdentifierField`] if `field` is empty.
/// - [`ContributorError::MissingField`] if an event lacks `field`.
/// - [`ContributorError::MissingId`] if the nested user has no `id`.
#[instrument(skip(events), fields(events = events.len()))]
pub fn aggregate_contributions(events: &[Value], field: &str) -> ContributorResult<Tally> {
    if field.is_empty() {
        return Err(ContributorError::MissingIdentifierField);
    }

    let mut tally = Tally::new();
    for event in events {
        if let Some(contributor) = normalize_event(event, field)? {
            tally.add(contributor);
        }
    }
    trace!(contributors = tally.len(), "aggregated contributions");
    Ok(tally)
}

/// Fold pre-counted contributor records into a tally, summing counts per `id`.
///
/// # Errors
///
/// [`ContributorError::MissingContributions`] or [`ContributorError::MissingId`]
/// for the first malformed record. No partial tally is returned.
#[instrument(skip(records), fields(records = records.len()))]
pub fn aggregate_contributors(records: &[Value]) -> ContributorResult<Tally> {
    records.iter().map(Contributor::from_record).collect()
}

/// Sort a tally's contributors by contributions, descending.
///
/// The sort is stable, so equal totals keep first-seen order.
pub fn rank(tally: Tally) -> Vec<Contributor> {
    let mut ranked = tally.entries;
    ranked.sort_by(by_contributions);
    ranked
}

/// Re-fold and rank contributors that may repeat across lists.
///
/// Concatenating per-source rankings and passing them here re-derives every
/// total from scratch.
pub fn rank_contributors<I>(contributors: I) -> Vec<Contributor>
where
    I: IntoIterator<Item = Contributor>,
{
    contributors.into_iter().collect::<Tally>().rank()
}

/// Descending comparator on `contributions`.
pub fn by_contributions(a: &Contributor, b: &Contributor) -> Ordering {
    b.contributions.cmp(&a.contributions)
}

/// Descending comparator on the `contributions` field of raw JSON records.
///
/// # Errors
///
/// [`ContributorError::MissingContributions`] if either record lacks a
/// numeric `contributions` field.
pub fn compare_records(a: &Value, b: &Value) -> ContributorResult<Ordering> {
    let count = |record: &Value| {
        record
            .get("contributions")
            .and_then(Value::as_u64)
            .ok_or_else(|| ContributorError::MissingContributions {
                record: record.to_string(),
            })
    };
    Ok(count(b)?.cmp(&count(a)?))
}
