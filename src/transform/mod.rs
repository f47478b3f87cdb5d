//! Bidirectional value transformers.
//!
//! A [`TransformRegistry`] holds an ordered list of [`DataTransformer`]s. The
//! first transformer whose type keys match (ignoring case) handles a value.
//! When nothing matches, or the transformer cannot parse its input, the value
//! passes through unchanged.

mod boolean;
mod date;
mod multi_value;
mod numeric;
mod value_map;

pub use boolean::BooleanTransformer;
pub use date::DateTransformer;
pub use multi_value::MultiValueTransformer;
pub use numeric::NumericTransformer;
pub use value_map::{apply_value_map, ValueMap};

use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::value::FieldValue;

/// Which way a value is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Record value to document value
    Encode,
    /// Document value to record value
    Decode,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encode => write!(f, "encode"),
            Direction::Decode => write!(f, "decode"),
        }
    }
}

/// A transformer could not handle its input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("{transformer}: cannot parse '{input}'")]
    Unparseable {
        transformer: &'static str,
        input: String,
    },

    #[error("{transformer}: unsupported value {value}")]
    Unsupported {
        transformer: &'static str,
        value: String,
    },
}

impl TransformError {
    pub(crate) fn unparseable(transformer: &'static str, input: impl Into<String>) -> Self {
        TransformError::Unparseable {
            transformer,
            input: input.into(),
        }
    }

    pub(crate) fn unsupported(transformer: &'static str, value: &FieldValue) -> Self {
        TransformError::Unsupported {
            transformer,
            value: value.to_string(),
        }
    }
}

/// A codec for one semantic value type.
pub trait DataTransformer: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Type keys this transformer answers to, lowercase
    fn type_keys(&self) -> &'static [&'static str];

    fn supports(&self, type_key: &str) -> bool {
        let key = type_key.trim();
        self.type_keys().iter().any(|k| k.eq_ignore_ascii_case(key))
    }

    fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError>;

    fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError>;
}

/// Ordered, first-match registry of transformers
pub struct TransformRegistry {
    transformers: Vec<Box<dyn DataTransformer>>,
}

impl TransformRegistry {
    /// Create a registry with no transformers
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Create a registry with the date, boolean, numeric and multi-value
    /// transformers, in that order
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DateTransformer));
        registry.register(Box::new(BooleanTransformer));
        registry.register(Box::new(NumericTransformer));
        registry.register(Box::new(MultiValueTransformer));
        registry
    }

    /// Append a transformer.
    ///
    /// Earlier registrations win on overlapping type keys.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut registry = TransformRegistry::with_builtins();
    /// registry.register(Box::new(UppercaseTransformer));
    /// assert!(registry.is_supported("upper"));
    /// ```
    pub fn register(&mut self, transformer: Box<dyn DataTransformer>) {
        self.transformers.push(transformer);
    }

    pub fn find(&self, type_key: &str) -> Option<&dyn DataTransformer> {
        self.transformers
            .iter()
            .find(|t| t.supports(type_key))
            .map(|t| t.as_ref())
    }

    pub fn is_supported(&self, type_key: &str) -> bool {
        self.find(type_key).is_some()
    }

    /// Names of the registered transformers, in lookup order
    pub fn transformer_names(&self) -> Vec<&'static str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn encode(&self, value: &FieldValue, type_key: &str) -> FieldValue {
        self.apply(Direction::Encode, value, type_key)
    }

    pub fn decode(&self, value: &FieldValue, type_key: &str) -> FieldValue {
        self.apply(Direction::Decode, value, type_key)
    }

    /// Run the matching transformer in `direction`.
    ///
    /// Never fails: no match or a transformer fault returns `value` as is.
    pub fn apply(&self, direction: Direction, value: &FieldValue, type_key: &str) -> FieldValue {
        let Some(transformer) = self.find(type_key) else {
            debug!(type_key, %direction, "No transformer registered, passing value through");
            return value.clone();
        };

        let result = match direction {
            Direction::Encode => transformer.encode(value),
            Direction::Decode => transformer.decode(value),
        };

        match result {
            Ok(converted) => converted,
            Err(err) => {
                warn!(type_key, %direction, error = %err, "Transform failed, keeping original value");
                value.clone()
            }
        }
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transformers", &self.transformer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl DataTransformer for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn type_keys(&self) -> &'static [&'static str] {
            &["upper", "date"]
        }

        fn encode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
            match value {
                FieldValue::String(s) => Ok(FieldValue::String(s.to_uppercase())),
                other => Err(TransformError::unsupported("upper", other)),
            }
        }

        fn decode(&self, value: &FieldValue) -> Result<FieldValue, TransformError> {
            match value {
                FieldValue::String(s) => Ok(FieldValue::String(s.to_lowercase())),
                other => Err(TransformError::unsupported("upper", other)),
            }
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = TransformRegistry::with_builtins();
        assert!(registry.is_supported("DATE_iso8601"));
        assert!(registry.is_supported("YesNoBoolean"));
        assert!(registry.is_supported("multiCheckbox"));
        assert!(registry.is_supported(" numeric "));
        assert!(!registry.is_supported("grid"));
    }

    #[test]
    fn test_unknown_key_passes_through() {
        let registry = TransformRegistry::with_builtins();
        let value = FieldValue::from("abc");
        assert_eq!(registry.encode(&value, "mystery"), value);
        assert_eq!(registry.decode(&value, "mystery"), value);
    }

    #[test]
    fn test_fault_passes_original_through() {
        let registry = TransformRegistry::with_builtins();
        let value = FieldValue::from("not-a-date");
        assert_eq!(registry.encode(&value, "date"), value);
        assert_eq!(registry.decode(&value, "date"), value);
    }

    #[test]
    fn test_registered_transformer_is_used() {
        let mut registry = TransformRegistry::new();
        registry.register(Box::new(Upper));
        assert_eq!(registry.encode(&"abc".into(), "upper"), FieldValue::from("ABC"));
        assert_eq!(registry.decode(&"ABC".into(), "UPPER"), FieldValue::from("abc"));
        // Unsupported input degrades to pass-through
        assert_eq!(registry.encode(&FieldValue::Int(1), "upper"), FieldValue::Int(1));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = TransformRegistry::with_builtins();
        registry.register(Box::new(Upper));
        assert_eq!(registry.find("date").map(|t| t.name()), Some("date"));
        assert_eq!(registry.find("upper").map(|t| t.name()), Some("upper"));
        assert_eq!(
            registry.transformer_names(),
            vec!["date", "boolean", "numeric", "multi_value", "upper"]
        );
    }
}
