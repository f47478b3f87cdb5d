//! Service mapping declaration (`<service_id>.yml`), as written on disk.
//!
//! These types mirror the YAML one to one. [`super::loader`] validates them
//! and folds them into the typed model.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value as YamlValue;

use crate::value::FieldValue;

/// Top-level mapping declaration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    pub service: ServiceDecl,
    #[serde(default)]
    pub root: Option<RootDecl>,
    #[serde(default)]
    pub defaults: DefaultsDecl,
    pub sections: IndexMap<String, SectionDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDecl {
    #[serde(deserialize_with = "scalar_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub version: Option<String>,
    #[serde(default, alias = "metadata_version", deserialize_with = "optional_scalar_string")]
    pub schema_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootDecl {
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

fn default_key_column() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsDecl {
    /// Last-resort foreign key column for collections
    pub collection_parent_column: Option<String>,
    /// Prefix tried first when reading reference columns
    pub column_prefix: String,
    /// Prefix stripped from every declared table name
    pub table_prefix: Option<String>,
}

impl Default for DefaultsDecl {
    fn default() -> Self {
        Self {
            collection_parent_column: None,
            column_prefix: "c_".to_string(),
            table_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKindDecl {
    #[default]
    Object,
    #[serde(alias = "array", alias = "grid")]
    Collection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDecl {
    #[serde(default)]
    pub kind: SectionKindDecl,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub reference_field: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub from_root: bool,
    #[serde(default)]
    pub grid: Option<String>,
    #[serde(default)]
    pub document_path: Option<String>,
    #[serde(default)]
    pub foreign_key_column: Option<String>,
    #[serde(default)]
    pub control: Option<ControlDecl>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlDecl {
    pub field: String,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub alternate_target: Option<String>,
    #[serde(default)]
    pub transform: Option<String>,
    #[serde(default)]
    pub value_map: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub type_annotation: Option<TypeAnnotationDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeAnnotationDecl {
    pub path: String,
    pub value: YamlValue,
}

/// String form of a YAML scalar. Sequences, mappings and null have none.
pub fn yaml_scalar_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Tagged(tagged) => yaml_scalar_string(&tagged.value),
        _ => None,
    }
}

/// Convert a YAML value into a field value.
pub fn yaml_to_field_value(value: &YamlValue) -> FieldValue {
    match value {
        YamlValue::Null => FieldValue::Null,
        YamlValue::Bool(b) => FieldValue::Bool(*b),
        YamlValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => FieldValue::Int(i),
            (None, Some(f)) => FieldValue::Float(f),
            _ => FieldValue::String(n.to_string()),
        },
        YamlValue::String(s) => FieldValue::String(s.clone()),
        YamlValue::Sequence(items) => FieldValue::List(items.iter().map(yaml_to_field_value).collect()),
        YamlValue::Tagged(tagged) => yaml_to_field_value(&tagged.value),
        YamlValue::Mapping(_) => serde_json::to_value(value)
            .map(FieldValue::Json)
            .unwrap_or(FieldValue::Null),
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = YamlValue::deserialize(deserializer)?;
    yaml_scalar_string(&value).ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
}

fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = YamlValue::deserialize(deserializer)?;
    match value {
        YamlValue::Null => Ok(None),
        other => yaml_scalar_string(&other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let yaml = r#"
service:
  id: farmers
  version: 1.0
root:
  form: registration
  table: farms
sections:
  basic:
    fields:
      - source: first_name
        target: name.given[0]
"#;
        let doc: MappingDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.service.id, "farmers");
        assert_eq!(doc.service.version.as_deref(), Some("1.0"));
        assert_eq!(doc.defaults.column_prefix, "c_");
        assert_eq!(doc.root.as_ref().map(|r| r.key_column.as_str()), Some("id"));

        let basic = &doc.sections["basic"];
        assert_eq!(basic.kind, SectionKindDecl::Object);
        assert_eq!(basic.fields[0].source.as_deref(), Some("first_name"));
    }

    #[test]
    fn test_collection_aliases() {
        let yaml = r#"
service: { id: s }
sections:
  a: { kind: array }
  b: { kind: collection }
  c: { kind: grid }
"#;
        let doc: MappingDocument = serde_yaml::from_str(yaml).unwrap();
        assert!(doc.sections.values().all(|s| s.kind == SectionKindDecl::Collection));
        assert!(doc.root.is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let yaml = r#"
service: { id: s }
sections:
  a:
    fields:
      - source: x
        taget: y
"#;
        let err = serde_yaml::from_str::<MappingDocument>(yaml).unwrap_err();
        assert!(err.to_string().contains("taget"));
    }

    #[test]
    fn test_metadata_version_alias() {
        let yaml = "service: { id: s, metadata_version: 3 }\nsections: {}\n";
        let doc: MappingDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.service.schema_version.as_deref(), Some("3"));
    }

    #[test]
    fn test_yaml_value_conversion() {
        let value: YamlValue = serde_yaml::from_str("[1, 2.5, yes, x, true]").unwrap();
        assert_eq!(
            yaml_to_field_value(&value),
            FieldValue::List(vec![
                FieldValue::Int(1),
                FieldValue::Float(2.5),
                FieldValue::from("yes"),
                FieldValue::from("x"),
                FieldValue::Bool(true),
            ])
        );
        assert_eq!(yaml_scalar_string(&YamlValue::Null), None);
    }
}
