use super::{DataTransformer, TransformError};
use crate::value::FieldValue;

const NAME: &str = "numeric";

/// Numeric strings in records, JSON numbers in documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericTransformer;

impl DataTransformer for NumericTransformer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn type_keys(&self) -> &'static [&'static str] {
        &["numeric", "number", "integer", "decimal", "double", "float"]
    }

    fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        let raw = match value {
            FieldValue::String(s) => s.trim(),
            FieldValue::Int(_) | FieldValue::Float(_) | FieldValue::Null => return Ok(value.clone()),
            other => return Err(TransformError::unsupported(NAME, other)),
        };

        if raw.contains('.') {
            raw.parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| TransformError::unparseable(NAME, raw))
        } else {
            raw.parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| TransformError::unparseable(NAME, raw))
        }
    }

    fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        Ok(match value {
            FieldValue::String(_) => value.clone(),
            other => FieldValue::String(other.to_record_string()),
        })
    }
}
