//! Field values flowing between records, transformers and documents.
//!
//! [`FieldValue`] is the closed set of shapes a single field can take. The
//! conversion into [`serde_json::Value`] is the only place where values enter
//! a document tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Represents different types of field values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    /// Any nested structure (objects, mixed arrays) carried through untouched
    Json(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// True for null and for strings that are empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way a flat record stores it.
    ///
    /// Lists are joined with `;`, null becomes the empty string.
    pub fn to_record_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::List(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(FieldValue::to_record_string)
                .collect::<Vec<_>>()
                .join(";"),
            FieldValue::Json(Value::String(s)) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Coerce into a JSON value.
    ///
    /// Non-finite floats have no JSON representation and become null.
    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Int(i) => Value::from(i),
            FieldValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s),
            FieldValue::List(items) => {
                Value::Array(items.into_iter().map(FieldValue::into_json).collect())
            }
            FieldValue::Json(value) => value,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Json(value) => write!(f, "{}", value),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::String(n.to_string())
                }
            }
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) if items.iter().all(is_scalar) => {
                FieldValue::List(items.into_iter().map(FieldValue::from).collect())
            }
            other => FieldValue::Json(other),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        value.into_json()
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_coerce_natively() {
        assert_eq!(FieldValue::from("x").into_json(), json!("x"));
        assert_eq!(FieldValue::from(true).into_json(), json!(true));
        assert_eq!(FieldValue::from(42i64).into_json(), json!(42));
        assert_eq!(FieldValue::from(2.5).into_json(), json!(2.5));
        assert_eq!(FieldValue::Null.into_json(), Value::Null);
    }

    #[test]
    fn test_list_becomes_array_of_coerced_elements() {
        let value = FieldValue::List(vec!["a".into(), FieldValue::Int(1), FieldValue::Bool(false)]);
        assert_eq!(value.into_json(), json!(["a", 1, false]));
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(FieldValue::Float(f64::NAN).into_json(), Value::Null);
    }

    #[test]
    fn test_from_json_keeps_objects_as_json() {
        let value = FieldValue::from(json!({"a": 1}));
        assert_eq!(value, FieldValue::Json(json!({"a": 1})));

        let nested = FieldValue::from(json!([{"a": 1}]));
        assert!(matches!(nested, FieldValue::Json(_)));

        let flat = FieldValue::from(json!(["x", 2]));
        assert_eq!(flat, FieldValue::List(vec!["x".into(), FieldValue::Int(2)]));
    }

    #[test]
    fn test_blank_detection() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::from("   ").is_blank());
        assert!(!FieldValue::from("a").is_blank());
        assert!(!FieldValue::Bool(false).is_blank());
    }

    #[test]
    fn test_record_string() {
        assert_eq!(FieldValue::Null.to_record_string(), "");
        assert_eq!(FieldValue::Int(7).to_record_string(), "7");
        let list = FieldValue::List(vec!["a".into(), FieldValue::Null, "b".into()]);
        assert_eq!(list.to_record_string(), "a;b");
    }
}
