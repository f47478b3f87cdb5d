//! Metadata-driven encoding of records into documents, and back.
//!
//! Both directions are single pass and never fail: a field that cannot be
//! transformed passes through unchanged, a field that cannot be found is
//! left out, and every gap goes to the configured [`GapSink`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::diagnostics::{GapSink, LogGapSink, ResolutionGap};
use crate::document::{value_at, DocumentBuilder};
use crate::metadata::{FieldMapping, SectionKind, SectionMapping, ServiceMetadata};
use crate::record::{ExtractedRecord, FlatMap, SectionData};
use crate::transform::{apply_value_map, Direction, TransformRegistry};
use crate::value::FieldValue;

/// Document keys appended after all sections
pub mod keys {
    pub const TIMESTAMP: &str = "timestamp";
    pub const ID: &str = "id";
    pub const SERVICE_ID: &str = "serviceId";
    pub const SERVICE_VERSION: &str = "serviceVersion";
    pub const METADATA_VERSION: &str = "metadataVersion";
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Encodes records to documents and decodes documents to records for one
/// service.
pub struct DocumentEncoder<'a> {
    metadata: &'a ServiceMetadata,
    registry: Arc<TransformRegistry>,
    gaps: Arc<dyn GapSink>,
    fixed_timestamp: Option<DateTime<Utc>>,
}

impl<'a> DocumentEncoder<'a> {
    /// An encoder using the built-in transformers and logging gaps.
    pub fn new(metadata: &'a ServiceMetadata) -> Self {
        Self {
            metadata,
            registry: Arc::new(TransformRegistry::with_builtins()),
            gaps: Arc::new(LogGapSink),
            fixed_timestamp: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<TransformRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_gap_sink(mut self, gaps: Arc<dyn GapSink>) -> Self {
        self.gaps = gaps;
        self
    }

    /// Stamp documents with `timestamp` instead of the current time
    pub fn with_fixed_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.fixed_timestamp = Some(timestamp);
        self
    }

    /// Build the document for `record`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let document = DocumentEncoder::new(&metadata).encode(&record);
    /// println!("{}", serde_json::to_string_pretty(&document)?);
    /// ```
    pub fn encode(&self, record: &ExtractedRecord) -> Value {
        let mut doc = DocumentBuilder::new();

        for section in &self.metadata.sections {
            let Some(data) = record.section(&section.name) else {
                debug!(section = %section.name, "No data for section");
                continue;
            };

            match (section.kind, data) {
                (SectionKind::Object, SectionData::Object(fields)) => {
                    self.encode_fields(&mut doc, section, &section.name, fields);
                }
                (SectionKind::Collection, SectionData::Collection(items)) => {
                    self.encode_collection(&mut doc, section, items, record);
                }
                _ => warn!(section = %section.name, "Section data does not match the declared kind"),
            }
        }

        self.append_metadata(&mut doc, record);
        info!(service = %self.metadata.id, root_id = record.root_id(), "Encoded document");
        doc.into_value()
    }

    /// Encode and render as pretty JSON, optionally inside the test-data
    /// wrapper.
    pub fn encode_to_string(&self, record: &ExtractedRecord, wrap_test_data: bool) -> String {
        let mut document = self.encode(record);
        if wrap_test_data {
            document = DocumentBuilder::wrap_test_data(document);
        }
        serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{}".to_string())
    }

    /// Rebuild a record from `document`.
    ///
    /// Each field is read from its target path, or from its alternate path
    /// when the target holds nothing.
    pub fn decode(&self, document: &Value) -> ExtractedRecord {
        let root_id = match document.get(keys::ID) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let mut record = ExtractedRecord::new(root_id);

        for section in &self.metadata.sections {
            match section.kind {
                SectionKind::Object => {
                    let fields = self.decode_fields(section, &section.name, document);
                    if !fields.is_empty() {
                        record.set_section(section.name.clone(), SectionData::Object(fields));
                    }
                }
                SectionKind::Collection => {
                    let Some(path) = section.document_path.as_deref() else {
                        self.report_missing_setting(section, "document_path");
                        continue;
                    };
                    let Some(elements) = value_at(document, path).and_then(Value::as_array) else {
                        debug!(section = %section.name, path, "No array at collection path");
                        continue;
                    };
                    let items: Vec<FlatMap> = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| {
                            self.decode_fields(section, &format!("{}[{}]", section.name, i), element)
                        })
                        .filter(|fields| !fields.is_empty())
                        .collect();
                    if !items.is_empty() {
                        record.set_section(section.name.clone(), SectionData::Collection(items));
                    }
                }
            }
        }

        info!(service = %self.metadata.id, root_id = record.root_id(), sections = record.section_count(), "Decoded document");
        record
    }

    fn encode_fields(&self, doc: &mut DocumentBuilder, section: &SectionMapping, label: &str, fields: &FlatMap) {
        for field in &section.fields {
            let Some(raw) = fields.get(&field.source_id).filter(|v| !v.trim().is_empty()) else {
                if field.required {
                    self.gaps.report(ResolutionGap::RequiredFieldMissing {
                        section: label.to_string(),
                        field: field.source_id.clone(),
                    });
                }
                continue;
            };

            let value = self.convert(section, field, FieldValue::from(raw.as_str()), Direction::Encode);
            debug!(section = label, field = %field.source_id, path = %field.target_path, "Encoding field");
            doc.set_value(&field.target_path, value);

            if let Some(annotation) = &field.type_annotation {
                doc.set_value(&annotation.path, annotation.value.clone());
            }
        }
    }

    fn encode_collection(
        &self,
        doc: &mut DocumentBuilder,
        section: &SectionMapping,
        items: &[FlatMap],
        record: &ExtractedRecord,
    ) {
        let Some(path) = section.document_path.as_deref() else {
            self.report_missing_setting(section, "document_path");
            return;
        };

        if let Some(gate) = &section.control {
            let open = record
                .find_object_field(&gate.field)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(gate.value.trim()));
            if !open {
                debug!(section = %section.name, control = %gate.field, "Control field does not allow this collection");
                return;
            }
        }

        let elements: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut element = DocumentBuilder::new();
                self.encode_fields(&mut element, section, &format!("{}[{}]", section.name, i), item);
                element.into_value()
            })
            .collect();

        debug!(section = %section.name, path, items = elements.len(), "Encoding collection");
        doc.set_value(path, FieldValue::Json(Value::Array(elements)));
    }

    fn decode_fields(&self, section: &SectionMapping, label: &str, source: &Value) -> FlatMap {
        let mut fields = FlatMap::new();
        for field in &section.fields {
            let found = value_at(source, &field.target_path)
                .filter(|v| !v.is_null())
                .or_else(|| {
                    field
                        .alternate_path
                        .as_deref()
                        .and_then(|alt| value_at(source, alt))
                        .filter(|v| !v.is_null())
                });
            let Some(found) = found else {
                if field.required {
                    self.gaps.report(ResolutionGap::RequiredFieldMissing {
                        section: label.to_string(),
                        field: field.source_id.clone(),
                    });
                }
                continue;
            };

            let value = self.convert(section, field, FieldValue::from(found.clone()), Direction::Decode);
            let text = value.to_record_string();
            if !text.trim().is_empty() {
                fields.insert(field.source_id.clone(), text);
            }
        }
        fields
    }

    /// Transform then value map on the way out; the reverse on the way in.
    fn convert(&self, section: &SectionMapping, field: &FieldMapping, value: FieldValue, direction: Direction) -> FieldValue {
        let transform = |value: FieldValue| match field.transform.as_deref() {
            Some(key) if self.registry.is_supported(key) => self.registry.apply(direction, &value, key),
            Some(key) => {
                self.gaps.report(ResolutionGap::NoTransformer {
                    section: section.name.clone(),
                    field: field.source_id.clone(),
                    transform: key.to_string(),
                });
                value
            }
            None => value,
        };
        let map = |value: FieldValue| match &field.value_map {
            Some(map) => apply_value_map(&value, map, direction),
            None => value,
        };

        match direction {
            Direction::Encode => map(transform(value)),
            Direction::Decode => transform(map(value)),
        }
    }

    fn append_metadata(&self, doc: &mut DocumentBuilder, record: &ExtractedRecord) {
        let now = self.fixed_timestamp.unwrap_or_else(Utc::now);
        doc.set_value(keys::TIMESTAMP, now.format(TIMESTAMP_FORMAT).to_string());
        if !record.root_id().is_empty() {
            doc.set_value(keys::ID, record.root_id());
        }
        doc.set_value(keys::SERVICE_ID, self.metadata.id.as_str());
        doc.set_value(keys::SERVICE_VERSION, self.metadata.version.clone());
        doc.set_value(keys::METADATA_VERSION, self.metadata.schema_version.clone());
    }

    fn report_missing_setting(&self, section: &SectionMapping, setting: &str) {
        self.gaps.report(ResolutionGap::SectionConfigMissing {
            section: section.name.clone(),
            setting: setting.to_string(),
        });
    }
}
