//! Configuration documents and typed option access.
//!
//! The engine only needs nested objects, ordered lists and scalar leaves, so
//! every document is held as a `serde_json::Value` regardless of the file
//! format it came from:
//!
//! ```text
//! morphline.json ─┐
//!                 ├─▶ serde_json::Value ─▶ resolve ${VARS} ─▶ ConfigNode ─▶ compiler
//! morphline.toml ─┘
//! ```
//!
//! [`ConfigNode`] pairs a value with its path in the document so that every
//! validation failure names the exact option that caused it.

pub mod substitution;

pub use substitution::{resolve_variables, Variables};

use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Loading
// =============================================================================

/// Parse a JSON document.
pub fn parse_json(text: &str) -> ConfigResult<JsonValue> {
    Ok(serde_json::from_str(text)?)
}

/// Parse a TOML document into the same value model as JSON.
pub fn parse_toml(text: &str) -> ConfigResult<JsonValue> {
    Ok(toml::from_str::<JsonValue>(text)?)
}

/// Load a document from disk, picking the parser from the file extension,
/// then resolve `${NAME}` references against `variables`.
pub fn load_document(path: &Path, variables: &Variables) -> ConfigResult<JsonValue> {
    let text = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let document = match ext.as_str() {
        "json" | "conf" => parse_json(&text)?,
        "toml" => parse_toml(&text)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };

    tracing::debug!(path = %path.display(), format = %ext, "loaded config document");
    resolve_variables(document, variables)
}

// =============================================================================
// ConfigNode
// =============================================================================

/// A node of a configuration document plus its location.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    path: String,
    value: JsonValue,
}

impl ConfigNode {
    pub fn new(path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// An empty options object.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::new(path, JsonValue::Object(Map::new()))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    pub fn as_object(&self) -> Option<&Map<String, JsonValue>> {
        self.value.as_object()
    }

    pub fn has(&self, key: &str) -> bool {
        self.as_object().is_some_and(|o| o.contains_key(key))
    }

    fn raw(&self, key: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|o| o.get(key))
    }

    fn child_path(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingKey {
            path: self.path.clone(),
            key: key.to_string(),
        }
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> ConfigError {
        ConfigError::WrongType {
            path: self.path.clone(),
            key: key.to_string(),
            expected,
        }
    }

    /// Reject keys outside `allowed`.
    pub fn validate_keys(&self, allowed: &[&str]) -> ConfigResult<()> {
        let Some(obj) = self.as_object() else {
            return Ok(());
        };
        let unknown: Vec<String> = obj
            .keys()
            .filter(|k| !allowed.contains(&k.as_str()))
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::UnknownKeys {
                path: self.path.clone(),
                keys: unknown,
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    // -------------------------------------------------------------------------
    // Scalars
    // -------------------------------------------------------------------------

    fn scalar_to_string(value: &JsonValue) -> Option<String> {
        match value {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Required string. Numbers and booleans are accepted in text form.
    pub fn get_string(&self, key: &str) -> ConfigResult<String> {
        self.get_opt_string(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn get_opt_string(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => Self::scalar_to_string(v)
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "string")),
        }
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_opt_string(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Boolean with default. `"true"`/`"false"` strings are accepted.
    pub fn get_bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(default),
            Some(JsonValue::Bool(b)) => Ok(*b),
            Some(JsonValue::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
            Some(JsonValue::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
            Some(_) => Err(self.wrong_type(key, "boolean")),
        }
    }

    pub fn get_opt_i64(&self, key: &str) -> ConfigResult<Option<i64>> {
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(key, "integer")),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.wrong_type(key, "integer")),
            Some(_) => Err(self.wrong_type(key, "integer")),
        }
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> ConfigResult<i64> {
        Ok(self.get_opt_i64(key)?.unwrap_or(default))
    }

    // -------------------------------------------------------------------------
    // Lists and objects
    // -------------------------------------------------------------------------

    /// List of strings. A single scalar is accepted as a one-element list.
    pub fn get_opt_string_list(&self, key: &str) -> ConfigResult<Option<Vec<String>>> {
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|v| Self::scalar_to_string(v).ok_or_else(|| self.wrong_type(key, "list of strings")))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Some),
            Some(v) => Self::scalar_to_string(v)
                .map(|s| Some(vec![s]))
                .ok_or_else(|| self.wrong_type(key, "list of strings")),
        }
    }

    pub fn get_string_list(&self, key: &str) -> ConfigResult<Vec<String>> {
        self.get_opt_string_list(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn get_string_list_or(&self, key: &str, default: &[&str]) -> ConfigResult<Vec<String>> {
        Ok(self
            .get_opt_string_list(key)?
            .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect()))
    }

    /// Required nested object.
    pub fn get_node(&self, key: &str) -> ConfigResult<ConfigNode> {
        self.get_opt_node(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn get_opt_node(&self, key: &str) -> ConfigResult<Option<ConfigNode>> {
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v @ JsonValue::Object(_)) => Ok(Some(ConfigNode::new(self.child_path(key), v.clone()))),
            Some(_) => Err(self.wrong_type(key, "object")),
        }
    }

    /// Optional list of nodes. A single object is accepted as a one-element list.
    pub fn get_opt_list(&self, key: &str) -> ConfigResult<Option<Vec<ConfigNode>>> {
        let base = self.child_path(key);
        match self.raw(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => Ok(Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ConfigNode::new(format!("{}[{}]", base, i), v.clone()))
                    .collect(),
            )),
            Some(v @ JsonValue::Object(_)) => Ok(Some(vec![ConfigNode::new(format!("{}[0]", base), v.clone())])),
            Some(_) => Err(self.wrong_type(key, "list")),
        }
    }

    pub fn get_list(&self, key: &str) -> ConfigResult<Vec<ConfigNode>> {
        self.get_opt_list(key)?.ok_or_else(|| self.missing(key))
    }

    /// `(key, node)` pairs of this object, in document order.
    pub fn entries(&self) -> Vec<(String, ConfigNode)> {
        self.as_object()
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| (k.clone(), ConfigNode::new(self.child_path(k), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scalar leaves of this node: an array yields its items, anything else itself.
    pub fn scalars(&self) -> Vec<JsonValue> {
        match &self.value {
            JsonValue::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// This node's own value as a string, if it is a scalar.
    pub fn as_string(&self) -> Option<String> {
        Self::scalar_to_string(&self.value)
    }
}
