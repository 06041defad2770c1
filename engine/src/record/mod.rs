//! The record data model.
//!
//! A [`Record`] is an ordered, multi-valued field map:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ message      │ ["<164>Feb  4 10:46:14 ..."] │
//! │ tags         │ ["one", 2, "three"]          │
//! │ _attachment… │ [b"raw bytes"]               │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! - A field may hold zero, one or many values; values keep insertion
//!   order and are never deduplicated.
//! - Distinct field names iterate in first-insertion order.
//! - Equality is structural: same names, same ordered values.
//! - `clone()` (aka [`Record::copy`]) gives an independent container.

pub mod fields;
pub mod value;

pub use value::Value;

use serde_json::{Map, Value as JsonValue};

/// An ordered mapping from field name to a sequence of values.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, Vec<Value>)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent copy of this record.
    pub fn copy(&self) -> Record {
        self.clone()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == name)
    }

    /// Append a value to a field.
    pub fn put(&mut self, name: impl AsRef<str>, value: impl Into<Value>) {
        let name = name.as_ref();
        let value = value.into();
        match self.position(name) {
            Some(i) => self.fields[i].1.push(value),
            None => self.fields.push((name.to_string(), vec![value])),
        }
    }

    /// Append several values to a field, in order.
    pub fn put_all<I, V>(&mut self, name: impl AsRef<str>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.as_ref();
        for value in values {
            self.put(name, value);
        }
    }

    /// Replace all values of a field with a single value.
    pub fn replace_values(&mut self, name: impl AsRef<str>, value: impl Into<Value>) {
        let name = name.as_ref();
        let value = value.into();
        match self.position(name) {
            Some(i) => self.fields[i].1 = vec![value],
            None => self.fields.push((name.to_string(), vec![value])),
        }
    }

    /// Replace all values of a field. An empty list removes the field.
    pub fn set_values(&mut self, name: impl AsRef<str>, values: Vec<Value>) {
        let name = name.as_ref();
        if values.is_empty() {
            self.remove_all(name);
            return;
        }
        match self.position(name) {
            Some(i) => self.fields[i].1 = values,
            None => self.fields.push((name.to_string(), values)),
        }
    }

    /// Remove a field and return its values.
    pub fn remove_all(&mut self, name: &str) -> Vec<Value> {
        match self.position(name) {
            Some(i) => self.fields.remove(i).1,
            None => Vec::new(),
        }
    }

    /// All values of a field (empty slice if absent).
    pub fn get(&self, name: &str) -> &[Value] {
        self.position(name)
            .map(|i| self.fields[i].1.as_slice())
            .unwrap_or(&[])
    }

    /// First value of a field.
    pub fn first_value(&self, name: &str) -> Option<&Value> {
        self.get(name).first()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Distinct field names in first-insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, values)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct field names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON object: every field becomes an array of values.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = Map::new();
        for (name, values) in &self.fields {
            obj.insert(
                name.clone(),
                JsonValue::Array(values.iter().map(Value::to_json).collect()),
            );
        }
        JsonValue::Object(obj)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, values)| other.get(name) == values.as_slice())
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.put(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_record() -> Record {
        let mut record = Record::new();
        record.put("first_name", "Nadja");
        record.put("age", 8);
        record.put("tags", "one");
        record.put("tags", 2);
        record.put("tags", "three");
        record
    }

    #[test]
    fn test_values_keep_insertion_order() {
        let mut record = Record::new();
        record.put("foo", "v1");
        record.put("foo", "v2");
        record.put("foo", "v1");
        assert_eq!(record.get("foo"), &[Value::from("v1"), Value::from("v2"), Value::from("v1")]);
    }

    #[test]
    fn test_field_names_first_insertion_order() {
        let record = basic_record();
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["first_name", "age", "tags"]);
    }

    #[test]
    fn test_copy_equals_and_is_independent() {
        let original = basic_record();
        let mut copy = original.copy();
        assert_eq!(copy, original);

        copy.put("tags", "four");
        copy.replace_values("first_name", "Other");
        assert_ne!(copy, original);
        assert_eq!(original.get("tags").len(), 3);
        assert_eq!(original.first_value("first_name"), Some(&Value::from("Nadja")));
    }

    #[test]
    fn test_equality_ignores_field_order_but_not_value_order() {
        let a: Record = [("x", 1), ("y", 2)].into_iter().collect();
        let b: Record = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);

        let c: Record = [("x", 1), ("x", 2)].into_iter().collect();
        let d: Record = [("x", 2), ("x", 1)].into_iter().collect();
        assert_ne!(c, d);
    }

    #[test]
    fn test_set_values_empty_removes_field() {
        let mut record = basic_record();
        record.set_values("tags", Vec::new());
        assert!(!record.contains_key("tags"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_remove_all_returns_values() {
        let mut record = basic_record();
        let removed = record.remove_all("tags");
        assert_eq!(removed.len(), 3);
        assert!(record.get("tags").is_empty());
        assert!(record.remove_all("missing").is_empty());
    }

    #[test]
    fn test_to_json() {
        let mut record = Record::new();
        record.put("a", "x");
        record.put("a", 1);
        assert_eq!(record.to_json(), serde_json::json!({"a": ["x", 1]}));
    }
}
