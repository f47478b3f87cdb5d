use serde_json::Value;

use super::{DataTransformer, TransformError};
use crate::value::FieldValue;

const NAME: &str = "multi_value";

/// Delimited strings in records, string arrays in documents.
///
/// Encode splits on `;` when present, otherwise on `,`. Decode joins with `;`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiValueTransformer;

fn split_items(raw: &str) -> Vec<FieldValue> {
    let delimiter = if raw.contains(';') { ';' } else { ',' };
    raw.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(FieldValue::from)
        .collect()
}

fn join_items<'a>(items: impl Iterator<Item = &'a FieldValue>) -> String {
    items
        .filter(|item| !item.is_null())
        .map(FieldValue::to_record_string)
        .collect::<Vec<_>>()
        .join(";")
}

impl DataTransformer for MultiValueTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn type_keys(&self) -> &'static [&'static str] {
        &["multicheckbox", "multiselect", "array", "list"]
    }

    fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        Ok(match value {
            FieldValue::Null => FieldValue::List(Vec::new()),
            FieldValue::List(_) => value.clone(),
            other => FieldValue::List(split_items(&other.to_record_string())),
        })
    }

    fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        let joined = match value {
            FieldValue::Null => String::new(),
            FieldValue::List(items) => join_items(items.iter()),
            FieldValue::String(s) => {
                let trimmed = s.trim();
                match trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                    Some(inner) => inner
                        .split(',')
                        .map(|item| item.trim().trim_matches('"').trim())
                        .filter(|item| !item.is_empty())
                        .collect::<Vec<_>>()
                        .join(";"),
                    None => s.clone(),
                }
            }
            FieldValue::Json(Value::Array(items)) => {
                let values: Vec<FieldValue> = items.iter().cloned().map(FieldValue::from).collect();
                join_items(values.iter())
            }
            other => return Err(TransformError::unsupported(NAME, other)),
        };
        Ok(FieldValue::String(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| FieldValue::from(*s)).collect())
    }

    #[test]
    fn test_encode_splits_on_either_delimiter() {
        let t = MultiValueTransformer;
        assert_eq!(t.encode(&"a,b,c".into()).unwrap(), list(&["a", "b", "c"]));
        assert_eq!(t.encode(&"a;b;c".into()).unwrap(), list(&["a", "b", "c"]));
        assert_eq!(t.encode(&" a ; ;b,c ".into()).unwrap(), list(&["a", "b,c"]));
    }

    #[test]
    fn test_encode_empty_input() {
        let t = MultiValueTransformer;
        assert_eq!(t.encode(&"".into()).unwrap(), list(&[]));
        assert_eq!(t.encode(&FieldValue::Null).unwrap(), list(&[]));
    }

    #[test]
    fn test_decode_joins_with_semicolon() {
        let t = MultiValueTransformer;
        assert_eq!(t.decode(&list(&["a", "b", "c"])).unwrap(), FieldValue::from("a;b;c"));
        assert_eq!(t.decode(&FieldValue::Null).unwrap(), FieldValue::from(""));
        assert_eq!(t.decode(&"plain".into()).unwrap(), FieldValue::from("plain"));
    }

    #[test]
    fn test_decode_bracketed_string() {
        let t = MultiValueTransformer;
        assert_eq!(t.decode(&r#"["a", "b"]"#.into()).unwrap(), FieldValue::from("a;b"));
        assert_eq!(t.decode(&"[]".into()).unwrap(), FieldValue::from(""));
    }

    #[test]
    fn test_decode_mixed_json_array() {
        let t = MultiValueTransformer;
        let value = FieldValue::Json(json!(["x", {"k": 1}]));
        assert_eq!(t.decode(&value).unwrap(), FieldValue::from(r#"x;{"k":1}"#));
        assert!(t.decode(&FieldValue::Json(json!({"k": 1}))).is_err());
    }
}
