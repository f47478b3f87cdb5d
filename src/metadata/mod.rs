//! Service metadata: declarations on disk, the typed model built from them,
//! and the loader and cache that produce it.

pub mod cache;
pub mod catalog;
pub mod loader;
pub mod mapping;
pub mod model;

pub use cache::MetadataCache;
pub use catalog::CatalogDocument;
pub use loader::{
    build_metadata, DirectorySource, EmbeddedSource, MergePrecedence, MetadataLoader,
    MetadataSource, CATALOG_DOCUMENT, DEFAULT_METADATA_DIR, DEFAULT_RESOURCES_DIR,
};
pub use model::{
    CatalogColumn, ControlGate, FieldMapping, MappingDefaults, RootEntity, SectionKind,
    SectionMapping, ServiceMetadata, TypeAnnotation,
};
