//! Path-addressed JSON document builder.
//!
//! Writes create every missing container on the way down. A container of the
//! wrong kind is replaced, which discards whatever it held.

use serde_json::{Map, Value};
use tracing::warn;

use crate::path::{DocumentPath, PathSegment};
use crate::value::FieldValue;

/// Key under which [`DocumentBuilder::wrap_test_data`] nests a document.
pub const TEST_DATA_KEY: &str = "testData";

/// Builds and reads a nested JSON document by dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBuilder {
    root: Value,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wrap an existing document for reading or further writes.
    ///
    /// Anything other than an object is replaced by an empty object.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { root: value },
            _ => Self::new(),
        }
    }

    /// Set `value` at `path`, creating intermediate objects and arrays.
    ///
    /// Null values and empty paths are ignored. Returns whether anything was
    /// written.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut doc = DocumentBuilder::new();
    /// doc.set_value("a.b[1].c", "x");
    /// assert_eq!(doc.get("a.b[1].c"), Some(&json!("x")));
    /// ```
    pub fn set_value(&mut self, path: &str, value: impl Into<FieldValue>) -> bool {
        let value = value.into();
        if value.is_null() {
            return false;
        }

        let parsed = DocumentPath::parse(path);
        let Some((last, parents)) = parsed.segments.split_last() else {
            warn!(path, "Ignoring write to empty document path");
            return false;
        };

        let mut current = &mut self.root;
        for segment in parents {
            let Some(object) = current.as_object_mut() else {
                warn!(path, segment = %segment.key, "Cannot descend into an array element that holds an array");
                return false;
            };
            current = descend(object, segment);
        }

        let Some(object) = current.as_object_mut() else {
            warn!(path, "Cannot set a field on an array element that holds an array");
            return false;
        };

        let json = value.into_json();
        match last.index {
            Some(index) => {
                let items = ensure_array(object, &last.key);
                while items.len() <= index {
                    items.push(Value::Null);
                }
                items[index] = json;
            }
            None => {
                object.insert(last.key.clone(), json);
            }
        }
        true
    }

    /// Read the value stored at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Value> {
        value_at(&self.root, path)
    }

    /// True when `path` resolves to a non-null value.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.root).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_pretty_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| "{}".to_string())
    }

    /// Nest `document` as the single element of a `testData` array.
    pub fn wrap_test_data(document: Value) -> Value {
        let mut wrapper = Map::new();
        wrapper.insert(TEST_DATA_KEY.to_string(), Value::Array(vec![document]));
        Value::Object(wrapper)
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Navigate `root` by a dotted, optionally indexed path.
pub fn value_at<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let parsed = DocumentPath::parse(path);
    if parsed.is_empty() {
        return None;
    }

    let mut current = root;
    for segment in &parsed.segments {
        current = current.as_object()?.get(&segment.key)?;
        if let Some(index) = segment.index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Step into the container named by an intermediate segment.
fn descend<'a>(object: &'a mut Map<String, Value>, segment: &PathSegment) -> &'a mut Value {
    match segment.index {
        Some(index) => {
            let items = ensure_array(object, &segment.key);
            while items.len() <= index {
                items.push(Value::Object(Map::new()));
            }
            let element = &mut items[index];
            if !(element.is_object() || element.is_array()) {
                *element = Value::Object(Map::new());
            }
            element
        }
        None => {
            let slot = object
                .entry(segment.key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            slot
        }
    }
}

fn ensure_array<'a>(object: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let slot = object
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just set to an array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indexed_intermediate_segment() {
        let mut doc = DocumentBuilder::new();
        assert!(doc.set_value("a.b[1].c", "x"));

        assert_eq!(doc.get("a.b[1].c"), Some(&json!("x")));
        assert_eq!(doc.get("a.b[0]"), Some(&json!({})));
        assert_eq!(doc.get("a.b").and_then(Value::as_array).map(Vec::len), Some(2));
    }

    #[test]
    fn test_indexed_last_segment_pads_with_nulls() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("tags[2]", "c");
        assert_eq!(doc.as_value(), &json!({"tags": [null, null, "c"]}));

        doc.set_value("tags[0]", "a");
        assert_eq!(doc.as_value(), &json!({"tags": ["a", null, "c"]}));
    }

    #[test]
    fn test_null_is_a_no_op() {
        let mut doc = DocumentBuilder::new();
        assert!(!doc.set_value("a.b", FieldValue::Null));
        assert_eq!(doc.as_value(), &json!({}));
    }

    #[test]
    fn test_empty_path_is_ignored() {
        let mut doc = DocumentBuilder::new();
        assert!(!doc.set_value("", "x"));
        assert!(!doc.set_value("..", "x"));
        assert_eq!(doc.as_value(), &json!({}));
    }

    #[test]
    fn test_second_write_overwrites() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("x.flag", true);
        doc.set_value("x.flag", false);
        assert_eq!(doc.get("x.flag"), Some(&json!(false)));
    }

    #[test]
    fn test_wrongly_typed_container_is_replaced() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("a", "scalar");
        doc.set_value("a.b", 1i64);
        assert_eq!(doc.as_value(), &json!({"a": {"b": 1}}));

        doc.set_value("a[0].c", "y");
        assert_eq!(doc.as_value(), &json!({"a": [{"c": "y"}]}));
    }

    #[test]
    fn test_list_values_become_arrays() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("p.langs", FieldValue::List(vec!["en".into(), "fr".into()]));
        assert_eq!(doc.get("p.langs"), Some(&json!(["en", "fr"])));
    }

    #[test]
    fn test_sibling_paths_share_containers() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("name.given[0]", "Ada");
        doc.set_value("name.family", "Lovelace");
        doc.set_value("identifiers[0].value", "123");
        doc.set_value("identifiers[0].type", "NationalId");

        assert_eq!(
            doc.into_value(),
            json!({
                "name": {"given": ["Ada"], "family": "Lovelace"},
                "identifiers": [{"value": "123", "type": "NationalId"}]
            })
        );
    }

    #[test]
    fn test_get_missing_paths() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("a.b", "x");
        assert_eq!(doc.get("a.c"), None);
        assert_eq!(doc.get("a.b[0]"), None);
        assert_eq!(doc.get(""), None);
        assert!(doc.contains("a.b"));
        assert!(!doc.contains("a.z"));
    }

    #[test]
    fn test_from_value_requires_object() {
        let doc = DocumentBuilder::from_value(json!([1, 2]));
        assert_eq!(doc.as_value(), &json!({}));

        let doc = DocumentBuilder::from_value(json!({"k": 1}));
        assert_eq!(doc.get("k"), Some(&json!(1)));
    }

    #[test]
    fn test_wrap_test_data() {
        let wrapped = DocumentBuilder::wrap_test_data(json!({"id": "1"}));
        assert_eq!(wrapped, json!({"testData": [{"id": "1"}]}));
    }

    #[test]
    fn test_json_rendering() {
        let mut doc = DocumentBuilder::new();
        doc.set_value("a", "b");
        assert_eq!(doc.to_json_string(), r#"{"a":"b"}"#);
        assert!(doc.to_pretty_json_string().contains("\n"));
    }
}
