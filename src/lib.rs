//! # Recordmap: Metadata-Driven Record/Document Mapping
//!
//! Recordmap converts relational form records into nested JSON documents and
//! back, driven entirely by YAML metadata.
//!
//! ## Features
//!
//! - **Declarative mappings**: one YAML file per service maps source fields to dotted document paths
//! - **Structural catalog**: a shared catalog names each form's table, columns and grids
//! - **Record graph extraction**: follows references and foreign keys from a root row
//! - **Transform registry**: pluggable value conversion (dates, booleans, numbers, multi-value lists)
//! - **Lossless round trips**: encoding and decoding read the same metadata
//!
//! ## Example: Mapping Declaration
//!
//! ```yaml
//! service:
//!   id: farmers
//!   version: "1.0"
//! root:
//!   form: registration
//!   table: app_fd_farms
//! sections:
//!   basic:
//!     form: basic_form
//!     reference_field: basic_ref
//!     fields:
//!       - source: first_name
//!         target: name.given[0]
//!       - source: has_land
//!         target: land.owned
//!         transform: yesNoBoolean
//!   members:
//!     kind: collection
//!     document_path: relatedPerson
//!     fields:
//!       - source: member_name
//!         target: name.text
//! ```
//!
//! ## Example: Extract and Encode
//!
//! ```ignore
//! let metadata = MetadataLoader::from_dir("docs-metadata").load("farmers")?;
//! let record = RecordExtractor::new(&metadata, &store).extract("F-001");
//! let document = DocumentEncoder::new(&metadata).encode(&record);
//! ```

// Core value and path types
pub mod error;
pub mod path;
pub mod value;

// Document building and value transformation
pub mod document;
pub mod transform;

// Metadata model, loading and caching
pub mod metadata;

// Record graph extraction
pub mod diagnostics;
pub mod extractor;
pub mod record;
pub mod store;

// Encoding, validation and submission
pub mod codec;
pub mod config;
pub mod transport;
pub mod validation;

// Re-export key types
pub use error::{ConfigurationError, StoreError, TransportError};
pub use path::{DocumentPath, PathSegment};
pub use value::FieldValue;

pub use document::DocumentBuilder;
pub use transform::{DataTransformer, Direction, TransformError, TransformRegistry};

pub use metadata::{MergePrecedence, MetadataCache, MetadataLoader, SectionKind, ServiceMetadata};

pub use diagnostics::{GapCollector, GapSink, LogGapSink, ResolutionGap};
pub use extractor::RecordExtractor;
pub use record::{ExtractedRecord, SectionData};
pub use store::{InMemoryStore, Row, RowAccessor};

pub use codec::DocumentEncoder;
pub use config::AppConfig;
pub use transport::{SubmissionClient, SubmissionResponse};
pub use validation::{check_record, coverage_report, CoverageReport, RecordCheck};
