//! Record graph extraction.
//!
//! Starting from one root row, follow the relations the metadata declares
//! (embedded references for object sections, foreign keys for collections)
//! and gather every section into an [`ExtractedRecord`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::diagnostics::{GapSink, LogGapSink, ResolutionGap};
use crate::error::StoreError;
use crate::metadata::{SectionKind, SectionMapping, ServiceMetadata};
use crate::record::{ExtractedRecord, FlatMap, SectionData};
use crate::store::{Row, RowAccessor};

/// Key and row of a section already visited in this pass
struct Visited {
    key: String,
    row: Row,
}

/// Walks the record graph for one service.
///
/// # Example
///
/// ```ignore
/// let extractor = RecordExtractor::new(&metadata, &store);
/// let record = extractor.extract("F-001");
/// ```
pub struct RecordExtractor<'a, S: RowAccessor> {
    metadata: &'a ServiceMetadata,
    store: S,
    gaps: Arc<dyn GapSink>,
}

impl<'a, S: RowAccessor> RecordExtractor<'a, S> {
    pub fn new(metadata: &'a ServiceMetadata, store: S) -> Self {
        Self {
            metadata,
            store,
            gaps: Arc::new(LogGapSink),
        }
    }

    pub fn with_gap_sink(mut self, gaps: Arc<dyn GapSink>) -> Self {
        self.gaps = gaps;
        self
    }

    /// Extract the record rooted at `root_id`.
    ///
    /// A missing root row yields a record holding only the id. A row store
    /// fault ends the walk and returns whatever was gathered before it.
    pub fn extract(&self, root_id: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::new(root_id);
        match self.walk(root_id, &mut record) {
            Ok(()) => info!(
                service = %self.metadata.id,
                root_id,
                sections = record.section_count(),
                "Extracted record"
            ),
            Err(err) => error!(
                service = %self.metadata.id,
                root_id,
                sections = record.section_count(),
                error = %err,
                "Row access failed, returning partial record"
            ),
        }
        record
    }

    fn walk(&self, root_id: &str, record: &mut ExtractedRecord) -> Result<(), StoreError> {
        let metadata: &'a ServiceMetadata = self.metadata;
        let root = &metadata.root;
        let Some(root_row) = self.store.fetch_by_key(&root.table, &root.key_column, root_id)? else {
            info!(table = %root.table, root_id, "Root row not found");
            return Ok(());
        };

        let mut visited: HashMap<&'a str, Visited> = HashMap::new();
        for section in &metadata.sections {
            match section.kind {
                SectionKind::Object => {
                    self.extract_object(section, root_id, &root_row, &mut visited, record)?
                }
                SectionKind::Collection => {
                    self.extract_collection(section, root_id, &root_row, &visited, record)?
                }
            }
        }
        Ok(())
    }

    fn extract_object(
        &self,
        section: &'a SectionMapping,
        root_id: &str,
        root_row: &Row,
        visited: &mut HashMap<&'a str, Visited>,
        record: &mut ExtractedRecord,
    ) -> Result<(), StoreError> {
        if section.from_root {
            attach_fields(record, section, read_fields(section, root_row));
            visited.insert(
                &section.name,
                Visited {
                    key: root_id.to_string(),
                    row: root_row.clone(),
                },
            );
            return Ok(());
        }

        let parent_row = match section.parent.as_deref() {
            None => root_row,
            Some(parent) => match visited.get(parent) {
                Some(v) => &v.row,
                None => {
                    debug!(section = %section.name, parent, "Parent section was not extracted, skipping");
                    return Ok(());
                }
            },
        };

        let Some(reference) = section.reference_field.as_deref() else {
            self.report_missing_setting(section, "reference_field");
            return Ok(());
        };
        let Some(table) = section.table.as_deref() else {
            self.report_missing_setting(section, "table");
            return Ok(());
        };
        let Some(key) = self.reference_value(parent_row, reference) else {
            self.gaps.report(ResolutionGap::MissingReference {
                section: section.name.clone(),
                field: reference.to_string(),
            });
            return Ok(());
        };

        let Some(row) = self.store.fetch_by_key(table, &self.metadata.root.key_column, &key)? else {
            self.gaps.report(ResolutionGap::MissingRow {
                section: section.name.clone(),
                table: table.to_string(),
                key,
            });
            return Ok(());
        };

        attach_fields(record, section, read_fields(section, &row));
        visited.insert(&section.name, Visited { key, row });
        Ok(())
    }

    fn extract_collection(
        &self,
        section: &SectionMapping,
        root_id: &str,
        root_row: &Row,
        visited: &HashMap<&'a str, Visited>,
        record: &mut ExtractedRecord,
    ) -> Result<(), StoreError> {
        let Some(foreign_key) = section.foreign_key_column.as_deref() else {
            self.gaps.report(ResolutionGap::UnresolvedForeignKey {
                section: section.name.clone(),
            });
            return Ok(());
        };
        let Some(table) = section.table.as_deref() else {
            self.report_missing_setting(section, "table");
            return Ok(());
        };

        let parent_key = self.parent_key(section, root_id, root_row, visited);
        let rows = self.store.query(table, foreign_key, &parent_key)?;
        let items: Vec<FlatMap> = rows
            .iter()
            .map(|row| read_fields(section, row))
            .filter(|fields| !fields.is_empty())
            .collect();

        debug!(
            section = %section.name,
            table,
            foreign_key,
            parent_key = %parent_key,
            items = items.len(),
            "Extracted collection"
        );
        if !items.is_empty() {
            record.set_section(section.name.clone(), SectionData::Collection(items));
        }
        Ok(())
    }

    /// Key the collection's rows point at: the linked parent section's key
    /// when one is known, the root id otherwise.
    fn parent_key(
        &self,
        section: &SectionMapping,
        root_id: &str,
        root_row: &Row,
        visited: &HashMap<&'a str, Visited>,
    ) -> String {
        let Some(parent) = section.parent.as_deref().and_then(|p| self.metadata.section(p)) else {
            return root_id.to_string();
        };
        if let Some(v) = visited.get(parent.name.as_str()) {
            return v.key.clone();
        }
        if parent.from_root {
            return root_id.to_string();
        }
        // Parent declared later in the same pass: it hangs off the root row
        if parent.parent.is_none() {
            if let Some(key) = parent
                .reference_field
                .as_deref()
                .and_then(|reference| self.reference_value(root_row, reference))
            {
                return key;
            }
        }
        debug!(section = %section.name, parent = %parent.name, "Parent key unavailable, using root id");
        root_id.to_string()
    }

    /// Value of `reference` on `row`, trying the prefixed column first.
    fn reference_value(&self, row: &Row, reference: &str) -> Option<String> {
        let prefix = &self.metadata.root.defaults.column_prefix;
        let prefixed = (!prefix.is_empty() && !reference.starts_with(prefix.as_str()))
            .then(|| format!("{}{}", prefix, reference));

        prefixed
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(reference))
            .find_map(|column| non_blank(row, column))
            .map(str::to_string)
    }

    fn report_missing_setting(&self, section: &SectionMapping, setting: &str) {
        self.gaps.report(ResolutionGap::SectionConfigMissing {
            section: section.name.clone(),
            setting: setting.to_string(),
        });
    }
}

fn non_blank<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

/// Catalog fields present on `row`, by field id, then by column name.
fn read_fields(section: &SectionMapping, row: &Row) -> FlatMap {
    let mut fields = FlatMap::new();
    for column in &section.catalog {
        let value = non_blank(row, &column.field_id)
            .or_else(|| column.column.as_deref().and_then(|c| non_blank(row, c)));
        if let Some(value) = value {
            fields.insert(column.field_id.clone(), value.to_string());
        }
    }
    fields
}

fn attach_fields(record: &mut ExtractedRecord, section: &SectionMapping, fields: FlatMap) {
    debug!(section = %section.name, fields = fields.len(), "Extracted object section");
    if !fields.is_empty() {
        record.set_section(section.name.clone(), SectionData::Object(fields));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::GapCollector;
    use crate::metadata::{build_metadata, MergePrecedence};

    const CATALOG: &str = r#"
forms:
  registration:
    table: farms
    root: true
    fields:
      - { id: national_id }
  basic_form:
    table: farmer_basic
    fields:
      - { id: first_name }
      - { id: last_name, column: c_last_name }
  member_form:
    table: members
    fields:
      - { id: member_name }
"#;

    const MAPPING: &str = r#"
service: { id: farmers }
root: { form: registration, table: farms }
sections:
  identity:
    from_root: true
    fields:
      - { source: national_id, target: "identifiers[0].value" }
  basic:
    form: basic_form
    reference_field: basic_ref
    fields:
      - { source: first_name, target: name.given }
      - { source: members, transform: grid }
  members:
    kind: collection
    form: member_form
    foreign_key_column: c_parent
    document_path: relatedPerson
    fields:
      - { source: member_name, target: name.text }
"#;

    fn metadata(mapping: &str) -> ServiceMetadata {
        build_metadata(
            "farmers",
            serde_yaml::from_str(mapping).unwrap(),
            &serde_yaml::from_str(CATALOG).unwrap(),
            MergePrecedence::default(),
        )
        .unwrap()
    }

    fn store() -> crate::store::InMemoryStore {
        crate::store::InMemoryStore::new()
            .with_row("farms", &[("id", "F1"), ("national_id", "NID-9"), ("c_basic_ref", "B1")])
            .with_row("farmer_basic", &[("id", "B1"), ("first_name", "Ada"), ("c_last_name", "Lovelace")])
            .with_row("members", &[("id", "M1"), ("c_parent", "B1"), ("member_name", "Byron")])
            .with_row("members", &[("id", "M2"), ("c_parent", "B1"), ("member_name", " ")])
            .with_row("members", &[("id", "M3"), ("c_parent", "F1"), ("member_name", "Other")])
    }

    struct FailingStore;

    impl RowAccessor for FailingStore {
        fn fetch_by_key(&self, table: &str, _: &str, key: &str) -> Result<Option<Row>, StoreError> {
            if table == "farms" {
                Ok(Some([("id".to_string(), key.to_string()), ("national_id".to_string(), "N".to_string())].into_iter().collect()))
            } else {
                Err(StoreError::Unavailable("connection reset".to_string()))
            }
        }

        fn query(&self, table: &str, _: &str, _: &str) -> Result<Vec<Row>, StoreError> {
            Err(StoreError::Query {
                table: table.to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_extracts_every_section() {
        let metadata = metadata(MAPPING);
        let store = store();
        let record = RecordExtractor::new(&metadata, &store).extract("F1");

        assert_eq!(record.root_id(), "F1");
        assert_eq!(record.section_names().collect::<Vec<_>>(), vec!["identity", "basic", "members"]);

        let identity = record.section("identity").and_then(SectionData::as_object).unwrap();
        assert_eq!(identity["national_id"], "NID-9");

        let basic = record.section("basic").and_then(SectionData::as_object).unwrap();
        assert_eq!(basic["first_name"], "Ada");
        // Read through the catalog's column name
        assert_eq!(basic["last_name"], "Lovelace");

        // Members hang off the basic section's key; blank rows are dropped
        let members = record.section("members").and_then(SectionData::as_collection).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["member_name"], "Byron");
    }

    #[test]
    fn test_missing_root_row_yields_id_only() {
        let metadata = metadata(MAPPING);
        let store = store();
        let record = RecordExtractor::new(&metadata, &store).extract("NOPE");
        assert_eq!(record.root_id(), "NOPE");
        assert_eq!(record.section_count(), 0);
    }

    #[test]
    fn test_unlinked_collection_uses_root_id() {
        let unlinked = MAPPING.replace("      - { source: members, transform: grid }\n", "");
        let metadata = metadata(&unlinked);
        let store = store();
        let record = RecordExtractor::new(&metadata, &store).extract("F1");

        let members = record.section("members").and_then(SectionData::as_collection).unwrap();
        assert_eq!(members[0]["member_name"], "Other");
    }

    #[test]
    fn test_missing_reference_is_a_gap() {
        let metadata = metadata(MAPPING);
        let store = crate::store::InMemoryStore::new().with_row("farms", &[("id", "F1"), ("national_id", "N")]);
        let gaps = Arc::new(GapCollector::new());
        let record = RecordExtractor::new(&metadata, &store)
            .with_gap_sink(gaps.clone())
            .extract("F1");

        assert!(record.has_section("identity"));
        assert!(!record.has_section("basic"));
        assert!(gaps.gaps().contains(&ResolutionGap::MissingReference {
            section: "basic".into(),
            field: "basic_ref".into(),
        }));
    }

    #[test]
    fn test_unresolved_foreign_key_skips_only_that_section() {
        let no_fk = MAPPING.replace("    foreign_key_column: c_parent\n", "");
        let metadata = metadata(&no_fk);
        assert!(metadata.section("members").unwrap().foreign_key_column.is_none());

        let store = store();
        let gaps = Arc::new(GapCollector::new());
        let record = RecordExtractor::new(&metadata, &store)
            .with_gap_sink(gaps.clone())
            .extract("F1");

        assert!(record.has_section("identity"));
        assert!(record.has_section("basic"));
        assert!(!record.has_section("members"));
        assert_eq!(
            gaps.gaps(),
            vec![ResolutionGap::UnresolvedForeignKey { section: "members".into() }]
        );
    }

    #[test]
    fn test_store_fault_returns_partial_record() {
        let metadata = metadata(MAPPING);
        let record = RecordExtractor::new(&metadata, FailingStore).extract("F1");

        assert_eq!(record.root_id(), "F1");
        assert!(record.has_section("identity"));
        assert!(!record.has_section("basic"));
        assert!(!record.has_section("members"));
    }

    #[test]
    fn test_reference_falls_back_to_bare_column() {
        let metadata = metadata(MAPPING);
        let store = crate::store::InMemoryStore::new()
            .with_row("farms", &[("id", "F1"), ("basic_ref", "B1")])
            .with_row("farmer_basic", &[("id", "B1"), ("first_name", "Ada")]);
        let record = RecordExtractor::new(&metadata, &store).extract("F1");
        assert!(record.has_section("basic"));
    }
}
