//! Accumulated invocation state.
//!
//! [`State`] is the string-keyed map a graph invocation builds up as it
//! runs. Each node returns a [`StateDelta`] (a subset of keys) that the
//! engine merges into the state before routing, so later nodes always see
//! everything earlier nodes wrote. The `serde_json::Value`-based wire type
//! allows heterogeneous workflows where each node produces a different shape.

use crate::error::Result;
use crate::GraphError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// The partial state a node handler returns — only the keys it wants to
/// write or overwrite.
pub type StateDelta = Map<String, Value>;

/// Build a [`StateDelta`] from a `json!` object literal.
///
/// Non-object values produce an empty delta (a node that has nothing to
/// record returns no keys).
///
/// # Example
///
/// ```
/// use agent_graph::state::delta;
/// use serde_json::json;
///
/// let d = delta(json!({"tasks": ["build", "test"], "status": "planned"}));
/// assert_eq!(d.len(), 2);
/// ```
pub fn delta(value: Value) -> StateDelta {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The accumulated state of one graph invocation.
///
/// Created fresh per invocation and discarded when `run` returns.
/// Accumulation is monotonic: a key written by one node stays visible to
/// every later node unless another node explicitly overwrites it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State(Map<String, Value>);

impl State {
    /// Create an empty state.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Create a state from a `json!` object literal. Non-object values
    /// produce an empty state.
    pub fn from_value(value: Value) -> Self {
        Self(delta(value))
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a string value by key. `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up a boolean value by key. `None` if absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Look up an integer value by key. `None` if absent or not an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Deserialize the value under `key` into a typed `T`.
    ///
    /// This is the primary way to extract typed data at workflow edges.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| GraphError::Other(format!("state has no key '{}'", key)))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            GraphError::Other(format!("state key '{}' failed to deserialize: {}", key, e))
        })
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether a key is present with a non-null, non-empty value.
    ///
    /// Routing functions use this to distinguish a usable payload from an
    /// error/empty marker: `null`, `""`, `[]`, and `{}` all count as empty.
    pub fn has_payload(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(m)) => !m.is_empty(),
            Some(_) => true,
        }
    }

    /// Insert a single key, overwriting any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Merge a node's delta into this state. Later keys overwrite earlier
    /// ones of the same name; all other keys are preserved.
    pub fn merge(&mut self, delta: StateDelta) {
        for (key, value) in delta {
            self.0.insert(key, value);
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the state has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Consume the state and return it as a JSON object value, for handing
    /// back to the surrounding request layer.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_same_key() {
        let mut state = State::from_value(json!({"a": 1, "b": "old"}));
        state.merge(delta(json!({"b": "new", "c": true})));

        assert_eq!(state.get("a"), Some(&json!(1)));
        assert_eq!(state.get_str("b"), Some("new"));
        assert_eq!(state.get_bool("c"), Some(true));
    }

    #[test]
    fn merge_preserves_untouched_keys() {
        let mut state = State::from_value(json!({"x": 1}));
        state.merge(delta(json!({"y": 2})));
        state.merge(delta(json!({"z": 3})));

        // x written first remains visible unchanged after later merges
        assert_eq!(state.get("x"), Some(&json!(1)));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn delta_from_non_object_is_empty() {
        assert!(delta(json!("just a string")).is_empty());
        assert!(delta(json!([1, 2, 3])).is_empty());
        assert!(delta(json!(null)).is_empty());
    }

    #[test]
    fn get_as_typed() {
        #[derive(serde::Deserialize)]
        struct Task {
            name: String,
        }

        let state = State::from_value(json!({"task": {"name": "deploy"}}));
        let task: Task = state.get_as("task").unwrap();
        assert_eq!(task.name, "deploy");
    }

    #[test]
    fn get_as_missing_key_fails() {
        let state = State::new();
        let result: Result<String> = state.get_as("absent");
        assert!(result.is_err());
    }

    #[test]
    fn has_payload_empty_markers() {
        let state = State::from_value(json!({
            "null": null,
            "empty_str": "",
            "empty_arr": [],
            "empty_obj": {},
            "zero": 0,
            "full": "yes"
        }));

        assert!(!state.has_payload("missing"));
        assert!(!state.has_payload("null"));
        assert!(!state.has_payload("empty_str"));
        assert!(!state.has_payload("empty_arr"));
        assert!(!state.has_payload("empty_obj"));
        assert!(state.has_payload("zero"));
        assert!(state.has_payload("full"));
    }

    #[test]
    fn into_value_round_trip() {
        let state = State::from_value(json!({"k": "v"}));
        assert_eq!(state.into_value(), json!({"k": "v"}));
    }
}
