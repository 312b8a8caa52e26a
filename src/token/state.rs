//! Step state carried inside a token

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key/value state for one wizard step.
///
/// Keys are kept sorted so the same state always encodes to the same token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepState(Map<String, Value>);

impl StepState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// String list stored under `key`; missing or malformed yields empty.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a platform identifier in its most compact flat form: a number
    /// when it prints back unchanged, text otherwise.
    pub fn insert_id(&mut self, key: impl Into<String>, id: &str) {
        match id.parse::<i64>() {
            Ok(n) if n.to_string() == id => self.insert(key, n),
            _ => self.insert(key, id),
        }
    }

    /// Identifier stored by [`insert_id`](Self::insert_id).
    pub fn get_id(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => n.as_i64().map(|n| n.to_string()),
            _ => None,
        }
    }

    /// Store identifiers comma-joined, which keeps them in the flat form.
    /// An empty list removes the key.
    pub fn insert_ids(&mut self, key: impl Into<String>, ids: &[String]) {
        let key = key.into();
        match ids {
            [] => {
                self.0.remove(&key);
            }
            [id] => self.insert_id(key, id),
            ids => self.insert(key, ids.join(",")),
        }
    }

    /// Identifiers stored by [`insert_ids`](Self::insert_ids). A JSON list
    /// of strings is also accepted.
    pub fn get_ids(&self, key: &str) -> Vec<String> {
        if matches!(self.0.get(key), Some(Value::Array(_))) {
            return self.get_strings(key);
        }
        self.get_id(key)
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Subset of this state containing only `keys`.
    ///
    /// Used to rebuild a parent step's token for "back" controls.
    #[must_use]
    pub fn project(&self, keys: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Merge raw modal field values. Values arrive as text and stay text.
    pub fn merge_fields(&mut self, fields: &BTreeMap<String, String>) {
        for (key, value) in fields {
            self.0.insert(key.clone(), Value::String(value.clone()));
        }
    }

    pub(crate) fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_keeps_only_named_keys() {
        let state = StepState::new().with("f", "all").with("a", 50).with("c", "here");
        let parent = state.project(&["f"]);
        assert_eq!(parent, StepState::new().with("f", "all"));
        assert_eq!(parent.len(), 1);
    }

    #[test]
    fn merge_fields_overrides_existing() {
        let mut state = StepState::new().with("m", "prefix").with("p", "old");
        let mut fields = BTreeMap::new();
        fields.insert("p".to_string(), "temp-".to_string());
        state.merge_fields(&fields);
        assert_eq!(state.get_str("p"), Some("temp-"));
        assert_eq!(state.get_str("m"), Some("prefix"));
    }

    #[test]
    fn numeric_ids_are_stored_as_numbers() {
        let mut state = StepState::new();
        state.insert_id("c", "1180000000000000001");
        state.insert_id("d", "0042");
        state.insert_id("e", "general");
        assert_eq!(state.get("c"), Some(&json!(1_180_000_000_000_000_001_i64)));
        assert_eq!(state.get_id("c").as_deref(), Some("1180000000000000001"));
        assert_eq!(state.get_id("d").as_deref(), Some("0042"));
        assert_eq!(state.get_id("e").as_deref(), Some("general"));
        assert_eq!(state.get_id("missing"), None);
    }

    #[test]
    fn id_lists_are_comma_joined() {
        let ids = vec![
            "1180000000000000001".to_string(),
            "1180000000000000002".to_string(),
        ];
        let mut state = StepState::new();
        state.insert_ids("x", &ids);
        assert_eq!(
            state.get_str("x"),
            Some("1180000000000000001,1180000000000000002")
        );
        assert_eq!(state.get_ids("x"), ids);

        state.insert_ids("x", &ids[..1]);
        assert_eq!(state.get_ids("x"), ids[..1].to_vec());

        state.insert_ids("x", &[]);
        assert!(!state.contains_key("x"));
        assert!(state.get_ids("x").is_empty());

        let listed = StepState::new().with("x", json!(["a", "b"]));
        assert_eq!(listed.get_ids("x"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn get_strings_tolerates_bad_shapes() {
        let state = StepState::new()
            .with("x", json!(["1", 2, "3"]))
            .with("y", "not a list");
        assert_eq!(state.get_strings("x"), vec!["1".to_string(), "3".to_string()]);
        assert!(state.get_strings("y").is_empty());
        assert!(state.get_strings("missing").is_empty());
    }
}
