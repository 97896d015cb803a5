//! Response rewriting: backend references become structured identifiers.
//!
//! This is the only place that walks arbitrary JSON. Everything above the
//! gateway sees identifiers, never backend paths.

use depot_id::Identifier;
use serde_json::{Map, Value};

/// Cursor links the backend adds to list responses.
const CURSOR_FIELDS: [&str; 2] = ["next", "previous"];

#[derive(Debug, Clone)]
pub struct Translator {
    api_path: String,
}

impl Translator {
    pub fn new(api_path: impl Into<String>) -> Self {
        Self {
            api_path: api_path.into(),
        }
    }

    /// Rewrites a response body.
    ///
    /// `pulp_href` is renamed to `id`, and any string that parses as a
    /// backend reference is replaced by its identifier. Empty entries are
    /// dropped from `created_resources`.
    pub fn response(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.object(map)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.response(v)).collect()),
            Value::String(s) => Value::String(self.string(s)),
            other => other,
        }
    }

    /// Rewrites a list response, dropping the cursor links.
    pub fn list(&self, value: Value) -> Value {
        match value {
            Value::Object(mut map) => {
                for field in CURSOR_FIELDS {
                    map.remove(field);
                }
                self.response(Value::Object(map))
            }
            other => self.response(other),
        }
    }

    /// Parses a backend reference into an identifier.
    pub fn reference(&self, reference: &str) -> Option<Identifier> {
        if !reference.starts_with(&self.api_path) {
            return None;
        }
        Identifier::from_reference(reference, &self.api_path).ok()
    }

    fn object(&self, map: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                "pulp_href" => {
                    out.insert("id".to_string(), self.response(value));
                }
                "created_resources" => {
                    let value = match value {
                        Value::Array(items) => {
                            Value::Array(
                                items
                                    .into_iter()
                                    .filter(|item| {
                                        !(item.is_null() || item.as_str() == Some(""))
                                    })
                                    .map(|item| self.response(item))
                                    .collect(),
                            )
                        }
                        other => self.response(other),
                    };
                    out.insert(key, value);
                }
                _ => {
                    out.insert(key, self.response(value));
                }
            }
        }
        out
    }

    fn string(&self, value: String) -> String {
        match self.reference(&value) {
            Some(id) => id.to_string(),
            None => value,
        }
    }
}
