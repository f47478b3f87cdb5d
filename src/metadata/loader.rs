//! Layered metadata loading and merging.
//!
//! Two documents describe a service: its own mapping declaration
//! (`<service_id>.yml`) and the shared structural catalog
//! (`form_structure.yaml`). Each is taken from the first source that has it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::catalog::{CatalogDocument, FormDecl, GridDecl};
use super::mapping::{
    yaml_scalar_string, yaml_to_field_value, DefaultsDecl, FieldDecl, MappingDocument,
    SectionDecl, SectionKindDecl,
};
use super::model::{
    CatalogColumn, ControlGate, FieldMapping, MappingDefaults, RootEntity, SectionKind,
    SectionMapping, ServiceMetadata, TypeAnnotation,
};
use crate::error::ConfigurationError;
use crate::record::ROOT_ID_KEY;
use crate::transform::ValueMap;

/// File name of the shared structural catalog
pub const CATALOG_DOCUMENT: &str = "form_structure.yaml";
pub const DEFAULT_METADATA_DIR: &str = "docs-metadata";
pub const DEFAULT_RESOURCES_DIR: &str = "resources/docs-metadata";

/// Transform key marking a field as a link to a child collection
const GRID_LINK_TRANSFORM: &str = "grid";

/// Which declaration decides when both describe the same field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePrecedence {
    /// The catalog decides what is read from storage and whether a field is
    /// required; the mapping decides what is emitted.
    #[default]
    StructureFirst,
    /// Mapping fields are read from storage even when the catalog does not
    /// list them, and the mapping's `required` flag wins.
    MappingFirst,
}

/// Somewhere metadata documents can be read from.
pub trait MetadataSource: Send + Sync {
    /// Human-readable location of `name` in this source
    fn location(&self, name: &str) -> String;

    /// Contents of `name`, or `None` when this source does not have it
    fn read(&self, name: &str) -> Result<Option<String>, ConfigurationError>;
}

/// Documents compiled into the binary or registered in memory.
///
/// # Example
///
/// ```ignore
/// let embedded = EmbeddedSource::new()
///     .with_document("farmers.yml", include_str!("../docs-metadata/farmers.yml"))
///     .with_document("form_structure.yaml", include_str!("../docs-metadata/form_structure.yaml"));
/// let loader = MetadataLoader::from_dir("docs-metadata").with_embedded(embedded);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    documents: HashMap<String, String>,
}

impl EmbeddedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.documents.insert(name.into(), contents.into());
    }
}

impl MetadataSource for EmbeddedSource {
    fn location(&self, name: &str) -> String {
        format!("embedded:{}", name)
    }

    fn read(&self, name: &str) -> Result<Option<String>, ConfigurationError> {
        Ok(self.documents.get(name).cloned())
    }
}

/// Documents in a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl MetadataSource for DirectorySource {
    fn location(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }

    fn read(&self, name: &str) -> Result<Option<String>, ConfigurationError> {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigurationError::Io { path, source }),
        }
    }
}

/// Loads and merges service metadata from an ordered list of sources.
pub struct MetadataLoader {
    sources: Vec<Box<dyn MetadataSource>>,
    precedence: MergePrecedence,
}

impl MetadataLoader {
    /// A loader with no sources
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            precedence: MergePrecedence::default(),
        }
    }

    /// Search `dir`, then the conventional resources directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new()
            .with_source(DirectorySource::new(dir))
            .with_source(DirectorySource::new(DEFAULT_RESOURCES_DIR))
    }

    /// Append a source to the end of the search order
    pub fn with_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Put embedded documents ahead of every other source
    pub fn with_embedded(mut self, source: EmbeddedSource) -> Self {
        self.sources.insert(0, Box::new(source));
        self
    }

    pub fn with_precedence(mut self, precedence: MergePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn precedence(&self) -> MergePrecedence {
        self.precedence
    }

    /// Load, validate and merge the metadata for `service_id`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigurationError`]: a document missing from every source, a
    /// parse failure, a service id mismatch, or a missing root form or table.
    pub fn load(&self, service_id: &str) -> Result<ServiceMetadata, ConfigurationError> {
        validate_service_id(service_id)?;

        let mapping_names = [format!("{}.yml", service_id), format!("{}.yaml", service_id)];
        let (mapping_location, mapping_text) = self.read_first(&mapping_names)?;
        let mapping: MappingDocument =
            serde_yaml::from_str(&mapping_text).map_err(|source| ConfigurationError::Parse {
                document: mapping_location.clone(),
                source,
            })?;

        let (catalog_location, catalog_text) = self.read_first(&[CATALOG_DOCUMENT.to_string()])?;
        let catalog: CatalogDocument =
            serde_yaml::from_str(&catalog_text).map_err(|source| ConfigurationError::Parse {
                document: catalog_location.clone(),
                source,
            })?;

        let metadata = build_metadata(service_id, mapping, &catalog, self.precedence)?;
        info!(
            service = %metadata.id,
            mapping = %mapping_location,
            catalog = %catalog_location,
            sections = metadata.sections.len(),
            "Loaded service metadata"
        );
        Ok(metadata)
    }

    fn read_first(&self, names: &[String]) -> Result<(String, String), ConfigurationError> {
        let mut searched = Vec::new();
        for source in &self.sources {
            for name in names {
                let location = source.location(name);
                if let Some(contents) = source.read(name)? {
                    debug!(location = %location, "Found metadata document");
                    return Ok((location, contents));
                }
                searched.push(location);
            }
        }
        Err(ConfigurationError::NotFound {
            document: names.first().cloned().unwrap_or_default(),
            searched,
        })
    }
}

impl Default for MetadataLoader {
    fn default() -> Self {
        Self::from_dir(DEFAULT_METADATA_DIR)
    }
}

fn validate_service_id(service_id: &str) -> Result<(), ConfigurationError> {
    let valid = !service_id.is_empty()
        && !service_id.contains("..")
        && service_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidServiceId(service_id.to_string()))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Merge a parsed mapping declaration with the structural catalog.
pub fn build_metadata(
    service_id: &str,
    mapping: MappingDocument,
    catalog: &CatalogDocument,
    precedence: MergePrecedence,
) -> Result<ServiceMetadata, ConfigurationError> {
    if mapping.service.id != service_id {
        return Err(ConfigurationError::ServiceMismatch {
            expected: service_id.to_string(),
            found: mapping.service.id,
        });
    }

    let missing = |setting: &str| ConfigurationError::MissingSetting {
        service: service_id.to_string(),
        setting: setting.to_string(),
    };
    let root_decl = mapping.root.as_ref().ok_or_else(|| missing("root"))?;
    let root_form = non_blank(root_decl.form.as_deref()).ok_or_else(|| missing("root.form"))?;
    let root_table = non_blank(root_decl.table.as_deref()).ok_or_else(|| missing("root.table"))?;
    let key_column = non_blank(Some(root_decl.key_column.as_str())).unwrap_or_else(|| "id".to_string());

    let flagged = catalog.root_forms();
    if flagged.len() > 1 {
        return Err(ConfigurationError::MultipleRoots {
            forms: flagged.iter().map(|s| s.to_string()).collect(),
        });
    }
    if let Some(flagged_root) = flagged.first() {
        if *flagged_root != root_form {
            warn!(
                service = service_id,
                declared = %root_form,
                catalog = %flagged_root,
                "Catalog flags a different root form than the mapping declares"
            );
        }
    }

    let context = SectionContext {
        catalog,
        defaults: &mapping.defaults,
        root_form: &root_form,
        precedence,
    };

    let mut sections = Vec::with_capacity(mapping.sections.len());
    for (name, decl) in &mapping.sections {
        sections.push(context.build_section(name, decl)?);
    }
    resolve_parents(&mut sections, &mapping)?;

    let root = RootEntity {
        form: root_form.clone(),
        table: context.physical_table(&root_table),
        key_column,
        defaults: MappingDefaults {
            collection_parent_column: non_blank(
                mapping.defaults.collection_parent_column.as_deref(),
            ),
            column_prefix: mapping.defaults.column_prefix.clone(),
        },
    };

    Ok(ServiceMetadata {
        name: mapping
            .service
            .name
            .clone()
            .unwrap_or_else(|| mapping.service.id.clone()),
        id: mapping.service.id,
        version: mapping.service.version,
        schema_version: mapping.service.schema_version,
        root,
        sections,
    })
}

struct SectionContext<'a> {
    catalog: &'a CatalogDocument,
    defaults: &'a DefaultsDecl,
    root_form: &'a str,
    precedence: MergePrecedence,
}

impl SectionContext<'_> {
    fn physical_table(&self, table: &str) -> String {
        match self.defaults.table_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                table.strip_prefix(prefix).unwrap_or(table).to_string()
            }
            _ => table.to_string(),
        }
    }

    fn build_section(&self, name: &str, decl: &SectionDecl) -> Result<SectionMapping, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidSection {
            section: name.to_string(),
            reason: reason.to_string(),
        };
        if name == ROOT_ID_KEY {
            return Err(invalid("the name is reserved for the root record id"));
        }

        let kind = match decl.kind {
            SectionKindDecl::Object => SectionKind::Object,
            SectionKindDecl::Collection => SectionKind::Collection,
        };
        if kind == SectionKind::Collection && decl.from_root {
            return Err(invalid("a collection cannot read from the root row"));
        }
        if decl.from_root && decl.parent.is_some() {
            return Err(invalid("a section read from the root row cannot declare a parent"));
        }

        let grid = non_blank(decl.grid.as_deref()).unwrap_or_else(|| name.to_string());
        let grid_decl = match kind {
            SectionKind::Collection => self.catalog.grid(&grid).map(|(_, g)| g),
            SectionKind::Object => None,
        };
        let form = non_blank(decl.form.as_deref())
            .or_else(|| grid_decl.map(|g| g.sub_form.clone()))
            .unwrap_or_else(|| name.to_string());
        let form_decl = self.catalog.form(&form);
        if form_decl.is_none() {
            debug!(section = name, form = %form, "No catalog entry, reading mapped fields only");
        }

        let table = non_blank(decl.table.as_deref())
            .or_else(|| form_decl.and_then(|f| non_blank(f.table.as_deref())))
            .map(|t| self.physical_table(&t));

        let from_root = decl.from_root || (kind == SectionKind::Object && form == self.root_form);

        let (declared, grid_links) = build_fields(name, &decl.fields);
        let (fields, catalog) = merge_fields(form_decl, declared, self.precedence);

        let foreign_key_column = match kind {
            SectionKind::Collection => self.resolve_foreign_key(name, decl, grid_decl, form_decl),
            SectionKind::Object => None,
        };

        Ok(SectionMapping {
            name: name.to_string(),
            kind,
            form,
            table,
            reference_field: non_blank(decl.reference_field.as_deref()),
            parent: non_blank(decl.parent.as_deref()),
            from_root,
            grid,
            document_path: non_blank(decl.document_path.as_deref()),
            foreign_key_column,
            control: decl.control.as_ref().map(|c| ControlGate {
                field: c.field.clone(),
                value: c.value.clone(),
            }),
            fields,
            catalog,
            grid_links,
        })
    }

    /// Explicit column, then the catalog's grid declaration, then the
    /// configured default.
    fn resolve_foreign_key(
        &self,
        section: &str,
        decl: &SectionDecl,
        grid: Option<&GridDecl>,
        form: Option<&FormDecl>,
    ) -> Option<String> {
        if let Some(column) = non_blank(decl.foreign_key_column.as_deref()) {
            debug!(section, column = %column, "Foreign key from section declaration");
            return Some(column);
        }

        let from_grid = grid.and_then(|grid| {
            let sub_form = self.catalog.form(&grid.sub_form);
            match non_blank(grid.foreign_key.as_deref()) {
                Some(fk_field) => Some(
                    sub_form
                        .and_then(|f| f.field(&fk_field))
                        .and_then(|f| non_blank(f.column.as_deref()))
                        .unwrap_or_else(|| format!("{}{}", self.defaults.column_prefix, fk_field)),
                ),
                None => sub_form.and_then(|f| non_blank(f.parent_key.as_deref())),
            }
        });
        let from_catalog = from_grid.or_else(|| form.and_then(|f| non_blank(f.parent_key.as_deref())));
        if let Some(column) = from_catalog {
            debug!(section, column = %column, "Foreign key from catalog");
            return Some(column);
        }

        if let Some(column) = non_blank(self.defaults.collection_parent_column.as_deref()) {
            debug!(section, column = %column, "Foreign key from defaults");
            return Some(column);
        }

        warn!(section, "No foreign key column resolvable for collection");
        None
    }
}

/// Validated field mappings plus the declared `required` flag, and the grid
/// links found among the declarations.
fn build_fields(section: &str, decls: &[FieldDecl]) -> (Vec<(FieldMapping, Option<bool>)>, Vec<String>) {
    let mut fields = Vec::new();
    let mut grid_links = Vec::new();

    for decl in decls {
        let source = non_blank(decl.source.as_deref());
        let is_link = decl
            .transform
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(GRID_LINK_TRANSFORM));
        if is_link {
            match source {
                Some(source) => grid_links.push(source),
                None => warn!(section, "Ignoring grid link without a source"),
            }
            continue;
        }

        let (Some(source_id), Some(target_path)) = (source, non_blank(decl.target.as_deref())) else {
            warn!(
                section,
                source = decl.source.as_deref().unwrap_or(""),
                target = decl.target.as_deref().unwrap_or(""),
                "Dropping field mapping without both source and target"
            );
            continue;
        };

        let mapping = FieldMapping {
            source_id,
            target_path,
            alternate_path: non_blank(decl.alternate_target.as_deref()),
            transform: non_blank(decl.transform.as_deref()),
            value_map: decl.value_map.as_ref().map(|m| build_value_map(section, m)),
            required: decl.required.unwrap_or(false),
            type_annotation: decl.type_annotation.as_ref().and_then(|a| {
                non_blank(Some(a.path.as_str())).map(|path| TypeAnnotation {
                    path,
                    value: yaml_to_field_value(&a.value),
                })
            }),
        };
        fields.push((mapping, decl.required));
    }

    (fields, grid_links)
}

fn build_value_map(section: &str, mapping: &serde_yaml::Mapping) -> ValueMap {
    let mut map = ValueMap::new();
    for (key, value) in mapping {
        match yaml_scalar_string(key) {
            Some(key) => {
                map.insert(key, yaml_to_field_value(value));
            }
            None => warn!(section, "Ignoring value map entry with a non-scalar key"),
        }
    }
    map
}

/// Combine catalog fields and mapping fields according to `precedence`.
fn merge_fields(
    form: Option<&FormDecl>,
    declared: Vec<(FieldMapping, Option<bool>)>,
    precedence: MergePrecedence,
) -> (Vec<FieldMapping>, Vec<CatalogColumn>) {
    let mut fields = Vec::with_capacity(declared.len());
    for (mut field, declared_required) in declared {
        let structural = form
            .and_then(|f| f.field(&field.source_id))
            .and_then(|f| f.required);
        field.required = match precedence {
            MergePrecedence::StructureFirst => structural.or(declared_required),
            MergePrecedence::MappingFirst => declared_required.or(structural),
        }
        .unwrap_or(false);
        fields.push(field);
    }

    let mapped = |id: &str| fields.iter().find(|f| f.source_id == id);
    let mut catalog: Vec<CatalogColumn> = Vec::new();
    let mut push = |column: CatalogColumn| {
        if !catalog.iter().any(|c| c.field_id == column.field_id) {
            catalog.push(column);
        }
    };

    if let Some(form) = form {
        for field in form.all_fields() {
            let mapping = mapped(&field.id);
            push(CatalogColumn {
                field_id: field.id.clone(),
                column: non_blank(field.column.as_deref()),
                required: mapping.map_or(field.required.unwrap_or(false), |m| m.required),
                mapped: mapping.is_some(),
            });
        }
    }
    if form.is_none() || precedence == MergePrecedence::MappingFirst {
        for field in &fields {
            push(CatalogColumn {
                field_id: field.source_id.clone(),
                column: None,
                required: field.required,
                mapped: true,
            });
        }
    }

    (fields, catalog)
}

/// Check explicit parents and attach collections to the object section that
/// links them.
fn resolve_parents(sections: &mut [SectionMapping], mapping: &MappingDocument) -> Result<(), ConfigurationError> {
    let mut link_parents = Vec::with_capacity(sections.len());
    for (index, section) in sections.iter().enumerate() {
        if let Some(parent) = &section.parent {
            let valid = sections[..index]
                .iter()
                .any(|s| &s.name == parent && !s.is_collection());
            if !valid {
                return Err(ConfigurationError::InvalidSection {
                    section: section.name.clone(),
                    reason: format!("parent '{}' must be an object section declared earlier", parent),
                });
            }
            link_parents.push(None);
            continue;
        }

        let linked = if section.is_collection() {
            sections
                .iter()
                .find(|s| !s.is_collection() && s.links_collection(section))
                .map(|s| s.name.clone())
        } else {
            None
        };
        link_parents.push(linked);
    }

    for (section, linked) in sections.iter_mut().zip(link_parents) {
        if linked.is_some() {
            section.parent = linked;
        }
    }

    for (name, decl) in &mapping.sections {
        if decl.kind == SectionKindDecl::Collection && decl.document_path.is_none() {
            warn!(section = %name, "Collection has no document_path and will not be emitted");
        }
    }
    Ok(())
}
