//! Records exchanged with callers.
//!
//! A record maps field names to JSON-like values. On insert the values are
//! coerced to the collection's column types; search results hand rows back as
//! records again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A row as seen by callers.
///
/// # Example
///
/// ```
/// use vectorbase_core::Record;
///
/// let record = Record::new()
///     .with_field("id", 1)
///     .with_field("text", "hello")
///     .with_field("embedding", vec![1.0, 0.0, 0.0]);
///
/// assert_eq!(record.get_i64("id"), Some(1));
/// assert_eq!(record.get_vector("embedding"), Some(vec![1.0, 0.0, 0.0]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, JsonValue>,
}

impl Record {
    /// Creates an empty record.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from a map.
    #[inline]
    pub fn from_map(fields: BTreeMap<String, JsonValue>) -> Self {
        Self { fields }
    }

    /// Adds a field. Chainable.
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<JsonValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets a field value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<JsonValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    #[inline]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    #[inline]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(|v| v.as_i64())
    }

    #[inline]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }

    #[inline]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(|v| v.as_bool())
    }

    /// Gets a field as a vector of floats.
    ///
    /// Returns None if the field is missing or is not an array of numbers.
    pub fn get_vector(&self, key: &str) -> Option<Vec<f32>> {
        self.fields
            .get(key)?
            .as_array()?
            .iter()
            .map(|v| v.as_f64().map(|x| x as f32))
            .collect()
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.fields.remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in name order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.fields.iter()
    }

    #[inline]
    pub fn into_inner(self) -> BTreeMap<String, JsonValue> {
        self.fields
    }
}

impl FromIterator<(String, JsonValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_typed_getters() {
        let r = Record::new()
            .with_field("name", "doc")
            .with_field("count", 3)
            .with_field("score", 0.5)
            .with_field("active", true);

        assert_eq!(r.len(), 4);
        assert_eq!(r.get_str("name"), Some("doc"));
        assert_eq!(r.get_i64("count"), Some(3));
        assert_eq!(r.get_f64("score"), Some(0.5));
        assert_eq!(r.get_bool("active"), Some(true));
        assert_eq!(r.get_str("missing"), None);
    }

    #[test]
    fn test_get_vector_rejects_non_numeric() {
        let r = Record::new()
            .with_field("ok", vec![1.0, 2.0])
            .with_field("bad", json!([1.0, "x"]));
        assert_eq!(r.get_vector("ok"), Some(vec![1.0, 2.0]));
        assert_eq!(r.get_vector("bad"), None);
    }

    #[test]
    fn test_record_deserializes_from_object() {
        let r: Record =
            serde_json::from_str(r#"{"id": 1, "text": "hello", "embedding": [1, 0, 0]}"#).unwrap();
        assert_eq!(r.get_i64("id"), Some(1));
        assert_eq!(r.get_vector("embedding"), Some(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_set_and_remove() {
        let mut r = Record::new();
        r.set("key", "value");
        assert!(r.contains_key("key"));
        assert_eq!(r.remove("key"), Some(json!("value")));
        assert!(r.is_empty());
    }
}
