//! Deterministic cache keys.
//!
//! A key is `<endpoint>:<base64(canonical JSON of params)>`. Top-level `null`
//! members are dropped and object members are emitted in lexicographic order,
//! so field order and optional-field absence never split a key.

use std::{collections::BTreeMap, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn encode(endpoint: &str, params: &Map<String, Value>) -> Self {
        let normalized = normalize_params(params);
        // Serializing a `Value` cannot fail: keys are strings and numbers are finite.
        let text = serde_json::to_string(&normalized).unwrap_or_else(|_| "{}".to_string());
        Self(format!("{endpoint}:{}", STANDARD.encode(text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parameter set a key is derived from, as stored alongside the entry.
pub fn normalize_params(params: &Map<String, Value>) -> Value {
    let sorted: BTreeMap<&String, &Value> = params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .collect();

    let mut object = Map::new();
    for (name, value) in sorted {
        object.insert(name.clone(), canonicalize(value));
    }
    Value::Object(object)
}

// Nested objects are re-emitted in sorted order as well; nested nulls are kept.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut object = Map::new();
            for (name, inner) in sorted {
                object.insert(name.clone(), canonicalize(inner));
            }
            Value::Object(object)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
