use indexmap::IndexMap;

use super::Direction;
use crate::value::FieldValue;

/// Explicit value dictionary: record value on the left, document value on
/// the right. Order matters for reverse lookups.
pub type ValueMap = IndexMap<String, FieldValue>;

/// Translate `value` through `map`.
///
/// Encode looks the value up by key. Decode returns the first key whose
/// mapped value has the same string form. Anything unmapped passes through.
pub fn apply_value_map(value: &FieldValue, map: &ValueMap, direction: Direction) -> FieldValue {
    let needle = value.to_record_string();
    match direction {
        Direction::Encode => map.get(&needle).cloned().unwrap_or_else(|| value.clone()),
        Direction::Decode => map
            .iter()
            .find(|(_, mapped)| mapped.to_record_string() == needle)
            .map(|(key, _)| FieldValue::String(key.clone()))
            .unwrap_or_else(|| value.clone()),
    }
}
