//! `${NAME}` variable substitution.
//!
//! Resolved on the raw document before any command sees it:
//!
//! - `"${NAME}"` (the whole string) is replaced by the variable's value.
//! - `"prefix-${NAME}-suffix"` interpolates the value in place.
//! - `${?NAME}` is optional: a missing variable becomes an empty string.
//! - A missing required variable is [`ConfigError::UnresolvedSubstitution`].
//!
//! Object keys are never substituted.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(\??)([A-Za-z_][A-Za-z0-9_.]*)\}").expect("variable regex is valid")
});

/// Variable source: explicit overrides first, then (optionally) the process environment.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    overrides: HashMap<String, String>,
    use_env: bool,
}

impl Variables {
    /// No variables at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self {
            overrides: HashMap::new(),
            use_env: true,
        }
    }

    /// Add an override that takes precedence over the environment.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(name) {
            return Some(v.clone());
        }
        if self.use_env {
            return std::env::var(name).ok();
        }
        None
    }
}

/// Resolve every `${NAME}` in string leaves of `document`.
pub fn resolve_variables(document: JsonValue, variables: &Variables) -> ConfigResult<JsonValue> {
    match document {
        JsonValue::String(s) => resolve_string(&s, variables).map(JsonValue::String),
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| resolve_variables(item, variables))
            .collect::<ConfigResult<Vec<_>>>()
            .map(JsonValue::Array),
        JsonValue::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key, resolve_variables(value, variables)?);
            }
            Ok(JsonValue::Object(resolved))
        }
        other => Ok(other),
    }
}

fn resolve_string(input: &str, variables: &Variables) -> ConfigResult<String> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut missing: Option<String> = None;
    let output = VARIABLE_RE.replace_all(input, |caps: &Captures| {
        let optional = !caps[1].is_empty();
        let name = &caps[2];
        match variables.get(name) {
            Some(value) => value,
            None => {
                if !optional && missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::UnresolvedSubstitution(name)),
        None => Ok(output.into_owned()),
    }
}
