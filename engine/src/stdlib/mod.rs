//! Standard command library.
//!
//! Every builder here validates its options up front, so a typo in a
//! configuration fails at compile time rather than on the first record.
//!
//! | Module          | Commands                                                      |
//! |-----------------|---------------------------------------------------------------|
//! | `fields`        | addValues, addValuesIfAbsent, setValues, addCurrentTime, ...  |
//! | `predicates`    | equals, contains                                              |
//! | `timestamp`     | convertTimestamp                                              |
//! | `grok`          | grok                                                          |
//! | `readers`       | readClob, readLine, readMultiLine, readCSV, separateAttachments |
//! | `split`         | split, splitKeyValue                                          |
//! | `translate`     | translate                                                     |
//! | `find_replace`  | findReplace                                                   |
//! | `codec`         | decodeBase64                                                  |
//! | `uri`           | extractURIComponents, extractURIComponent, extractURIQueryParameters |

pub mod codec;
pub mod fields;
pub mod find_replace;
pub mod grok;
pub mod predicates;
pub mod readers;
pub mod split;
pub mod timestamp;
pub mod translate;
pub mod uri;

use crate::config::ConfigNode;
use crate::error::CompileResult;
use crate::record::{Record, Value};
use crate::registry::Registry;

pub fn register_builtins(registry: &Registry) {
    registry.register("morphline::stdlib::fields", fields::AddValuesBuilder);
    registry.register("morphline::stdlib::fields", fields::AddCurrentTimeBuilder);
    registry.register("morphline::stdlib::fields", fields::AddLocalHostBuilder);
    registry.register("morphline::stdlib::fields", fields::GenerateUuidBuilder);
    registry.register("morphline::stdlib::fields", fields::DropRecordBuilder);
    registry.register("morphline::stdlib::fields", fields::ToStringBuilder);
    registry.register("morphline::stdlib::fields", fields::ToByteArrayBuilder);
    registry.register("morphline::stdlib::fields", fields::LogBuilder);
    registry.register("morphline::stdlib::predicates", predicates::EqualsBuilder);
    registry.register("morphline::stdlib::predicates", predicates::ContainsBuilder);
    registry.register("morphline::stdlib::timestamp", timestamp::ConvertTimestampBuilder);
    registry.register("morphline::stdlib::grok", grok::GrokBuilder);
    registry.register("morphline::stdlib::readers", readers::ReadClobBuilder);
    registry.register("morphline::stdlib::readers", readers::ReadLineBuilder);
    registry.register("morphline::stdlib::readers", readers::ReadMultiLineBuilder);
    registry.register("morphline::stdlib::readers", readers::ReadCsvBuilder);
    registry.register("morphline::stdlib::readers", readers::SeparateAttachmentsBuilder);
    registry.register("morphline::stdlib::split", split::SplitBuilder);
    registry.register("morphline::stdlib::split", split::SplitKeyValueBuilder);
    registry.register("morphline::stdlib::translate", translate::TranslateBuilder);
    registry.register("morphline::stdlib::find_replace", find_replace::FindReplaceBuilder);
    registry.register("morphline::stdlib::codec", codec::DecodeBase64Builder);
    registry.register("morphline::stdlib::uri", uri::ExtractUriComponentsBuilder);
    registry.register("morphline::stdlib::uri", uri::ExtractUriComponentBuilder);
    registry.register("morphline::stdlib::uri", uri::ExtractUriQueryParametersBuilder);
}

// =============================================================================
// Shared helpers
// =============================================================================

/// A value given in configuration: a literal or a `@{field}` reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldExpr {
    Literal(Value),
    Reference(String),
}

impl FieldExpr {
    pub(crate) fn parse(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Some(name) = s.strip_prefix("@{").and_then(|rest| rest.strip_suffix('}')) {
                return FieldExpr::Reference(name.to_string());
            }
        }
        FieldExpr::Literal(value)
    }

    /// Values this expression denotes for `record`.
    pub(crate) fn evaluate(&self, record: &Record) -> Vec<Value> {
        match self {
            FieldExpr::Literal(v) => vec![v.clone()],
            FieldExpr::Reference(name) => record.get(name).to_vec(),
        }
    }
}

/// Parse `{ field: value | [values] }` options into `(field, values)` pairs.
pub(crate) fn field_values(config: &ConfigNode) -> Vec<(String, Vec<Value>)> {
    config
        .entries()
        .into_iter()
        .map(|(name, node)| {
            let values = node.scalars().iter().map(Value::from_json).collect();
            (name, values)
        })
        .collect()
}

/// Like [`field_values`], keeping `@{field}` references unresolved.
pub(crate) fn field_exprs(config: &ConfigNode) -> Vec<(String, Vec<FieldExpr>)> {
    field_values(config)
        .into_iter()
        .map(|(name, values)| (name, values.into_iter().map(FieldExpr::parse).collect()))
        .collect()
}

/// Optional `charset` option, validated against `encoding_rs` labels.
pub(crate) fn charset_option(config: &ConfigNode, command: &str) -> CompileResult<Option<&'static encoding_rs::Encoding>> {
    match config.get_opt_string("charset")? {
        None => Ok(None),
        Some(label) => encoding_rs::Encoding::for_label(label.as_bytes())
            .map(Some)
            .ok_or_else(|| crate::error::CompileError::invalid(command, format!("Unsupported charset: {}", label))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_expr_parse() {
        assert_eq!(FieldExpr::parse(Value::from("@{name}")), FieldExpr::Reference("name".into()));
        assert_eq!(FieldExpr::parse(Value::from("@name")), FieldExpr::Literal(Value::from("@name")));
        assert_eq!(FieldExpr::parse(Value::Int(3)), FieldExpr::Literal(Value::Int(3)));
    }

    #[test]
    fn test_field_values_flattens_lists() {
        let node = ConfigNode::new("t", json!({"a": [1, "x"], "b": true}));
        let parsed = field_values(&node);
        assert_eq!(parsed[0], ("a".to_string(), vec![Value::Int(1), Value::from("x")]));
        assert_eq!(parsed[1], ("b".to_string(), vec![Value::Bool(true)]));
    }

    #[test]
    fn test_every_builtin_module_is_registered() {
        let registry = Registry::new();
        register_builtins(&registry);
        let listed = registry.list(&["morphline.stdlib.*".to_string()]);
        assert!(listed.contains_key("convertTimestamp"));
        assert!(listed.contains_key("addLocalHost"));
        assert!(listed.contains_key("extractURIQueryParameters"));
        assert!(!listed.contains_key("pipe"));
    }
}
