//! Typed, validated service metadata.
//!
//! Built once by [`super::MetadataLoader`] and read-only afterwards, so a
//! single `ServiceMetadata` can be shared by any number of extractors and
//! encoders.

use serde::Serialize;

use crate::transform::ValueMap;
use crate::value::FieldValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceMetadata {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub schema_version: Option<String>,
    pub root: RootEntity,
    /// Sections in declaration order
    pub sections: Vec<SectionMapping>,
}

/// The entity anchoring the record graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootEntity {
    pub form: String,
    pub table: String,
    pub key_column: String,
    pub defaults: MappingDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingDefaults {
    pub collection_parent_column: Option<String>,
    pub column_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Object,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionMapping {
    pub name: String,
    pub kind: SectionKind,
    /// Catalog form backing this section
    pub form: String,
    /// `None` when neither declaration names a table; the section is then
    /// skipped during extraction.
    pub table: Option<String>,
    /// Column on the parent row holding this section's key (object sections)
    pub reference_field: Option<String>,
    /// Logical parent section. Object sections: declared explicitly.
    /// Collections: the object section whose grid link names them.
    pub parent: Option<String>,
    /// Read fields directly off the root row
    pub from_root: bool,
    pub grid: String,
    /// Where a collection's array attaches in the document
    pub document_path: Option<String>,
    /// Resolved foreign key column (collections)
    pub foreign_key_column: Option<String>,
    pub control: Option<ControlGate>,
    /// Emission mappings
    pub fields: Vec<FieldMapping>,
    /// Fields read from storage
    pub catalog: Vec<CatalogColumn>,
    /// Collections (by grid id or section name) whose parent is this section
    pub grid_links: Vec<String>,
}

impl SectionMapping {
    pub fn is_collection(&self) -> bool {
        self.kind == SectionKind::Collection
    }

    pub fn links_collection(&self, collection: &SectionMapping) -> bool {
        self.grid_links
            .iter()
            .any(|link| link == &collection.grid || link == &collection.name)
    }

    pub fn field(&self, source_id: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.source_id == source_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMapping {
    pub source_id: String,
    pub target_path: String,
    /// Secondary path tried when decoding
    pub alternate_path: Option<String>,
    pub transform: Option<String>,
    pub value_map: Option<ValueMap>,
    pub required: bool,
    pub type_annotation: Option<TypeAnnotation>,
}

/// Literal written next to a field, e.g. the type of an identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeAnnotation {
    pub path: String,
    pub value: FieldValue,
}

/// A field known to storage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogColumn {
    pub field_id: String,
    pub column: Option<String>,
    pub required: bool,
    /// Whether a mapping emits this field
    pub mapped: bool,
}

/// Collection emitted only when a record field holds a given value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlGate {
    pub field: String,
    pub value: String,
}

impl ServiceMetadata {
    pub fn section(&self, name: &str) -> Option<&SectionMapping> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// The object section that owns `collection` through a grid link, if any.
    pub fn linking_section(&self, collection: &SectionMapping) -> Option<&SectionMapping> {
        self.sections
            .iter()
            .find(|s| !s.is_collection() && s.links_collection(collection))
    }
}
