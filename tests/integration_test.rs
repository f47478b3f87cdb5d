//! End-to-end tests: load metadata from disk, extract from a fixture store,
//! encode, decode.

use chrono::{TimeZone, Utc};
use recordmap::document::value_at;
use recordmap::record::FlatMap;
use recordmap::{
    check_record, coverage_report, ConfigurationError, DocumentEncoder, ExtractedRecord, GapCollector,
    InMemoryStore, MetadataCache, MetadataLoader, RecordExtractor, ResolutionGap, SectionData,
    ServiceMetadata,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_farmers() -> ServiceMetadata {
    MetadataLoader::from_dir(fixtures_dir().join("docs-metadata"))
        .load("farmers")
        .expect("Failed to load farmers metadata")
}

fn load_store() -> InMemoryStore {
    InMemoryStore::from_file(fixtures_dir().join("store.json")).expect("Failed to load store fixture")
}

fn extract(metadata: &ServiceMetadata, root_id: &str) -> (ExtractedRecord, Vec<ResolutionGap>) {
    let store = load_store();
    let gaps = Arc::new(GapCollector::new());
    let record = RecordExtractor::new(metadata, &store)
        .with_gap_sink(gaps.clone())
        .extract(root_id);
    (record, gaps.take())
}

fn object<'r>(record: &'r ExtractedRecord, section: &str) -> &'r FlatMap {
    record
        .section(section)
        .and_then(SectionData::as_object)
        .unwrap_or_else(|| panic!("section '{}' missing", section))
}

#[test]
fn test_load_fixture_metadata() {
    let metadata = load_farmers();
    assert_eq!(metadata.name, "Farmers Registry");
    assert_eq!(metadata.root.table, "farms");

    let identity = metadata.section("identity").unwrap();
    assert!(identity.from_root);

    let members = metadata.section("members").unwrap();
    assert_eq!(members.table.as_deref(), Some("members"));
    assert_eq!(members.foreign_key_column.as_deref(), Some("c_parent_farmer"));
    assert_eq!(members.parent.as_deref(), Some("basic"));

    let payments = metadata.section("payments").unwrap();
    assert_eq!(payments.foreign_key_column, None);
}

#[test]
fn test_unknown_service_is_a_configuration_error() {
    let err = MetadataLoader::from_dir(fixtures_dir().join("docs-metadata"))
        .load("fishers")
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::NotFound { .. }));
}

#[test]
fn test_extract_full_record() {
    let metadata = load_farmers();
    let (record, gaps) = extract(&metadata, "F-001");

    assert_eq!(record.root_id(), "F-001");

    let identity = object(&record, "identity");
    assert_eq!(identity["national_id"], "NID-42");
    assert_eq!(identity["has_members"], "yes");
    assert_eq!(identity["dateCreated"], "2024-01-05");

    let basic = object(&record, "basic");
    assert_eq!(basic["first_name"], "Amina");
    assert_eq!(basic["crops"], "maize;beans");
    assert!(!basic.contains_key("cooperative"));

    let members = record.section("members").and_then(SectionData::as_collection).unwrap();
    let names: Vec<&str> = members.iter().map(|m| m["member_name"].as_str()).collect();
    assert_eq!(names, vec!["Baraka", "Zawadi"]);

    // The collection without a foreign key is skipped on its own
    assert!(!record.has_section("payments"));
    assert_eq!(
        gaps,
        vec![ResolutionGap::UnresolvedForeignKey {
            section: "payments".to_string()
        }]
    );
}

#[test]
fn test_missing_referenced_row() {
    let metadata = load_farmers();
    let (record, gaps) = extract(&metadata, "F-003");

    assert!(record.has_section("identity"));
    assert!(!record.has_section("basic"));
    assert!(!record.has_section("members"));
    assert!(gaps.contains(&ResolutionGap::MissingRow {
        section: "basic".to_string(),
        table: "farmer_basic".to_string(),
        key: "B-404".to_string(),
    }));
}

#[test]
fn test_missing_root_row_gives_id_only_record() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-999");
    assert_eq!(record.root_id(), "F-999");
    assert_eq!(record.section_count(), 0);
}

#[test]
fn test_encode_extracted_record() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-001");

    let document = DocumentEncoder::new(&metadata)
        .with_fixed_timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        .encode(&record);

    assert_eq!(
        document,
        json!({
            "identifiers": [{"value": "NID-42", "type": "NationalId"}],
            "household": {"hasMembers": true},
            "name": {"given": ["Amina"], "family": "Otieno"},
            "gender": "female",
            "birthDate": "1985-07-14T00:00:00Z",
            "farming": {"crops": ["maize", "beans"], "ownsLand": true, "sizeHectares": 2.5},
            "relatedPerson": [
                {"name": {"text": "Baraka"}, "relationship": {"coding": [{"code": "son"}]}},
                {"name": {"text": "Zawadi"}, "relationship": {"coding": [{"code": "daughter"}]}}
            ],
            "timestamp": "2024-06-01T12:00:00Z",
            "id": "F-001",
            "serviceId": "farmers",
            "serviceVersion": "1.0",
            "metadataVersion": "2"
        })
    );
}

#[test]
fn test_decode_restores_mapped_fields() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-001");
    let encoder = DocumentEncoder::new(&metadata);

    let decoded = encoder.decode(&encoder.encode(&record));
    assert_eq!(decoded.root_id(), "F-001");

    // Every mapped field comes back with its stored value
    for section in &metadata.sections {
        match (record.section(&section.name), decoded.section(&section.name)) {
            (Some(SectionData::Object(original)), Some(SectionData::Object(restored))) => {
                for field in &section.fields {
                    assert_eq!(restored.get(&field.source_id), original.get(&field.source_id), "{}", field.source_id);
                }
            }
            (Some(SectionData::Collection(original)), Some(SectionData::Collection(restored))) => {
                assert_eq!(original.len(), restored.len());
                for (a, b) in original.iter().zip(restored) {
                    for field in &section.fields {
                        assert_eq!(b.get(&field.source_id), a.get(&field.source_id));
                    }
                }
            }
            (None, None) => {}
            other => panic!("section '{}' differs: {:?}", section.name, other),
        }
    }

    // Unmapped stored fields are not part of the document
    assert!(!object(&decoded, "identity").contains_key("dateCreated"));
}

#[test]
fn test_required_field_and_closed_gate() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-002");
    assert!(record.has_section("members"));

    let gaps = Arc::new(GapCollector::new());
    let document = DocumentEncoder::new(&metadata)
        .with_gap_sink(gaps.clone())
        .encode(&record);

    assert_eq!(value_at(&document, "name.family"), Some(&json!("Kamau")));
    assert!(value_at(&document, "name.given").is_none());
    assert!(value_at(&document, "relatedPerson").is_none());
    assert_eq!(value_at(&document, "household.hasMembers"), Some(&json!(false)));
    assert!(gaps.gaps().contains(&ResolutionGap::RequiredFieldMissing {
        section: "basic".to_string(),
        field: "first_name".to_string(),
    }));

    let check = check_record(&metadata, &record);
    assert!(check.has_data);
    let missing: Vec<String> = check.missing.iter().map(ToString::to_string).collect();
    assert_eq!(missing, vec!["basic.first_name"]);
}

#[test]
fn test_decode_alternate_path() {
    let metadata = load_farmers();
    let record = DocumentEncoder::new(&metadata).decode(&json!({
        "id": "F-010",
        "person": {"lastName": "Njoroge"},
        "farming": {"crops": ["tea"], "ownsLand": false}
    }));

    let basic = object(&record, "basic");
    assert_eq!(basic["last_name"], "Njoroge");
    assert_eq!(basic["crops"], "tea");
    assert_eq!(basic["owns_land"], "no");
    assert!(!record.has_section("identity"));
}

#[test]
fn test_wrapped_test_data() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-001");
    let text = DocumentEncoder::new(&metadata).encode_to_string(&record, true);

    let wrapped: Value = serde_json::from_str(&text).unwrap();
    let items = wrapped["testData"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], json!("F-001"));
}

#[test]
fn test_record_json_survives_a_file_round_trip() {
    let metadata = load_farmers();
    let (record, _) = extract(&metadata, "F-001");

    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("record.json");
    std::fs::write(&path, serde_json::to_string_pretty(&record.to_json()).unwrap()).unwrap();

    let restored: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(ExtractedRecord::from_json(&restored).unwrap(), record);
}

#[test]
fn test_cache_shares_loaded_metadata() {
    let cache = MetadataCache::new(MetadataLoader::from_dir(fixtures_dir().join("docs-metadata")));
    let first = cache.get_or_load("farmers").unwrap();
    let second = cache.get_or_load("farmers").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.loaded_services(), vec!["farmers".to_string()]);

    let reloaded = cache.reload("farmers").unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert!(cache.evict("farmers"));
    assert!(cache.get("farmers").is_none());
}

#[test]
fn test_coverage_of_fixture_mapping() {
    let report = coverage_report(&load_farmers());
    let identity = report.sections.iter().find(|s| s.section == "identity").unwrap();
    // dateCreated is a system field and not counted
    assert_eq!(identity.total, 3);
    assert_eq!(identity.unmapped, vec!["basic_ref".to_string()]);

    let basic = report.sections.iter().find(|s| s.section == "basic").unwrap();
    assert_eq!(basic.unmapped, vec!["cooperative".to_string()]);
}
