use tracing::warn;

use super::{DataTransformer, TransformError};
use crate::value::FieldValue;

const TRUTHY: &[&str] = &["yes", "y", "true", "1", "checked", "on"];
const FALSY: &[&str] = &["no", "n", "false", "0", "unchecked", "off", ""];

/// Yes/no tokens in records, native booleans in documents.
///
/// Unrecognised tokens are treated as false and logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransformer;

impl BooleanTransformer {
    fn truth(value: &FieldValue) -> bool {
        let token = match value {
            FieldValue::Bool(b) => return *b,
            FieldValue::Null => return false,
            other => other.to_record_string().trim().to_lowercase(),
        };

        if TRUTHY.contains(&token.as_str()) {
            true
        } else if FALSY.contains(&token.as_str()) {
            false
        } else {
            warn!(token = %token, "Unrecognised boolean token, treating as false");
            false
        }
    }
}

impl DataTransformer for BooleanTransformer {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn type_keys(&self) -> &'static [&'static str] {
        &["yesnoboolean", "boolean", "bool"]
    }

    fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        Ok(FieldValue::Bool(Self::truth(value)))
    }

    fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
        let token = if Self::truth(value) { "yes" } else { "no" };
        Ok(FieldValue::from(token))
    }
}
