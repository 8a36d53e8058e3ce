//! Request parameters and whitelist projection.
//!
//! Callers hand every operation one free-form [`RequestParams`] object. Each
//! operation forwards only the keys its endpoint understands, using
//! [`filter_params`]. A key counts as set whenever it is present in the map:
//! falsy values such as `0`, `""`, `false`, and `null` are still forwarded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A free-form bag of request parameters (`owner`, `repo`, `org`, `since`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(Map<String, Value>);

impl RequestParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value, returning the previous one for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a value that is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether `key` is present (with any value, including `null`).
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of keys present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no keys are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Project onto `keys`. See [`filter_params`].
    #[must_use]
    pub fn filter(&self, keys: &[&str]) -> Self {
        filter_params(keys, self)
    }

    /// Remove and return a value that is a JSON string.
    ///
    /// Used by collaborators to consume path segments (`owner`, `repo`, `org`)
    /// before the remainder becomes the query string.
    pub fn take_str(&mut self, key: &str) -> Option<String> {
        match self.0.remove(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Render the parameters as query-string pairs.
    ///
    /// Strings are emitted verbatim, `null` as an empty value, and every other
    /// JSON value in its compact JSON form.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, Value)> for RequestParams {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for RequestParams {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Project `source` down to the keys in `desired`.
///
/// A key is copied iff it is present in `source`. Neither argument is
/// modified; the result is a fresh map.
pub fn filter_params(desired: &[&str], source: &RequestParams) -> RequestParams {
    desired
        .iter()
        .filter_map(|key| {
            source
                .get(key)
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> RequestParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_source_yields_empty_result() {
        let result = filter_params(&["owner", "repo"], &RequestParams::new());
        assert!(result.is_empty());
    }

    #[test]
    fn empty_key_list_yields_empty_result() {
        let source = params(json!({ "owner": "octocat", "repo": "hello" }));
        assert!(filter_params(&[], &source).is_empty());
    }

    #[test]
    fn no_matching_keys_yields_empty_result() {
        let source = params(json!({ "owner": "octocat" }));
        assert!(filter_params(&["org", "type"], &source).is_empty());
    }

    #[test]
    fn projects_only_desired_keys() {
        let source = params(json!({ "a": "v1", "c": "v3" }));
        let result = filter_params(&["a", "b"], &source);
        assert_eq!(result, params(json!({ "a": "v1" })));
    }

    #[test]
    fn leaves_source_unchanged() {
        let source = params(json!({ "a": "v1", "c": "v3" }));
        let before = source.clone();
        let _ = source.filter(&["a", "b"]);
        assert_eq!(source, before);
    }

    #[test]
    fn forwards_falsy_but_present_values() {
        let source = params(json!({ "page": 0, "path": "", "flag": false, "sha": null }));
        let result = filter_params(&["page", "path", "flag", "sha"], &source);
        assert_eq!(result.len(), 4);
        assert_eq!(result.get("page"), Some(&json!(0)));
        assert_eq!(result.get("path"), Some(&json!("")));
        assert_eq!(result.get("flag"), Some(&json!(false)));
        assert_eq!(result.get("sha"), Some(&Value::Null));
    }

    #[test]
    fn extend_overrides_earlier_values() {
        let mut base = RequestParams::new().with("owner", "from-repo").with("repo", "r");
        base.extend(RequestParams::new().with("owner", "explicit"));
        assert_eq!(base.get_str("owner"), Some("explicit"));
        assert_eq!(base.get_str("repo"), Some("r"));
    }

    #[test]
    fn query_pairs_render_strings_verbatim() {
        let source = RequestParams::new()
            .with("since", "2020-09-11T11:01:06Z")
            .with("per_page", 100);
        let pairs = source.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("per_page".to_string(), "100".to_string()),
                ("since".to_string(), "2020-09-11T11:01:06Z".to_string()),
            ]
        );
    }

    #[test]
    fn take_str_removes_key() {
        let mut source = RequestParams::new().with("owner", "octocat").with("page", 2);
        assert_eq!(source.take_str("owner").as_deref(), Some("octocat"));
        assert!(!source.contains_key("owner"));
        assert_eq!(source.take_str("page").as_deref(), Some("2"));
        assert_eq!(source.take_str("missing"), None);
    }
}
