//! Multi-section records assembled by extraction or decoding.
//!
//! A record holds the root id plus one entry per section: a flat field map
//! for object sections, a list of flat field maps for collections.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigurationError;

/// Key reserved for the root record id in the JSON form of a record
pub const ROOT_ID_KEY: &str = "id";

/// Field id to value, in extraction order
pub type FlatMap = IndexMap<String, String>;

/// Data held for one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionData {
    Object(FlatMap),
    Collection(Vec<FlatMap>),
}

impl SectionData {
    pub fn is_empty(&self) -> bool {
        match self {
            SectionData::Object(fields) => fields.is_empty(),
            SectionData::Collection(items) => items.is_empty(),
        }
    }

    pub fn as_object(&self) -> Option<&FlatMap> {
        match self {
            SectionData::Object(fields) => Some(fields),
            SectionData::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[FlatMap]> {
        match self {
            SectionData::Object(_) => None,
            SectionData::Collection(items) => Some(items),
        }
    }
}

/// One extracted (or decoded) record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedRecord {
    root_id: String,
    sections: IndexMap<String, SectionData>,
}

impl ExtractedRecord {
    /// Create an empty record for `root_id`.
    ///
    /// # Example
    /// ```
    /// use recordmap::record::ExtractedRecord;
    ///
    /// let record = ExtractedRecord::new("F-001");
    /// assert_eq!(record.root_id(), "F-001");
    /// assert_eq!(record.section_count(), 0);
    /// ```
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            sections: IndexMap::new(),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn set_root_id(&mut self, root_id: impl Into<String>) {
        self.root_id = root_id.into();
    }

    /// Get a section by name.
    ///
    /// # Returns
    /// `Some(data)` if the section was extracted, `None` otherwise
    pub fn section(&self, name: &str) -> Option<&SectionData> {
        self.sections.get(name)
    }

    /// Store a section, replacing any previous data under the same name.
    pub fn set_section(&mut self, name: impl Into<String>, data: SectionData) {
        self.sections.insert(name.into(), data);
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Section names in insertion order
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionData)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when no section holds any data.
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(SectionData::is_empty)
    }

    /// Look a field up across every object section, in order.
    pub fn find_object_field(&self, field: &str) -> Option<&str> {
        self.sections
            .values()
            .filter_map(SectionData::as_object)
            .find_map(|fields| fields.get(field))
            .map(String::as_str)
    }

    /// Convert to JSON: the root id under [`ROOT_ID_KEY`], then one key per
    /// section.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(ROOT_ID_KEY.to_string(), Value::String(self.root_id.clone()));
        for (name, data) in &self.sections {
            // Serializing string maps cannot fail
            let value = serde_json::to_value(data).unwrap_or(Value::Null);
            map.insert(name.clone(), value);
        }
        Value::Object(map)
    }

    /// Create a record from its JSON form.
    ///
    /// Section values must be objects or arrays of objects whose values are
    /// scalars; scalars are stringified and nulls dropped.
    pub fn from_json(json: &Value) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::Json {
            context: "record".to_string(),
            source: serde::de::Error::custom(reason),
        };

        let object = json
            .as_object()
            .ok_or_else(|| invalid("a record must be a JSON object".to_string()))?;
        let root_id = match object.get(ROOT_ID_KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => return Err(invalid(format!("record id must be a scalar, got {}", other))),
        };

        let mut record = Self::new(root_id);
        for (name, value) in object {
            if name == ROOT_ID_KEY {
                continue;
            }
            let data = match value {
                Value::Object(fields) => SectionData::Object(flat_map(name, fields).map_err(invalid)?),
                Value::Array(items) => {
                    let mut maps = Vec::with_capacity(items.len());
                    for item in items {
                        let fields = item
                            .as_object()
                            .ok_or_else(|| invalid(format!("items of section '{}' must be objects", name)))?;
                        maps.push(flat_map(name, fields).map_err(invalid)?);
                    }
                    SectionData::Collection(maps)
                }
                other => return Err(invalid(format!("section '{}' must be an object or array, got {}", name, other))),
            };
            record.set_section(name.clone(), data);
        }
        Ok(record)
    }
}

fn flat_map(section: &str, fields: &Map<String, Value>) -> Result<FlatMap, String> {
    let mut flat = FlatMap::new();
    for (key, value) in fields {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            _ => return Err(format!("field '{}.{}' must be a scalar", section, key)),
        };
        flat.insert(key.clone(), text);
    }
    Ok(flat)
}
