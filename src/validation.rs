//! Mapping coverage and record completeness checks.

use serde::Serialize;
use std::fmt;

use crate::metadata::{SectionMapping, ServiceMetadata};
use crate::record::{ExtractedRecord, FlatMap, SectionData};

/// Bookkeeping fields every form carries; never expected in a mapping.
pub const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "dateCreated",
    "dateModified",
    "createdBy",
    "modifiedBy",
    "createdByName",
    "modifiedByName",
];

pub fn is_system_field(field_id: &str) -> bool {
    SYSTEM_FIELDS.contains(&field_id)
}

/// How much of one section's catalog the mapping emits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionCoverage {
    pub section: String,
    pub total: usize,
    pub mapped: usize,
    pub unmapped: Vec<String>,
}

impl SectionCoverage {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.mapped as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub service: String,
    pub sections: Vec<SectionCoverage>,
}

impl CoverageReport {
    pub fn total(&self) -> usize {
        self.sections.iter().map(|s| s.total).sum()
    }

    pub fn mapped(&self) -> usize {
        self.sections.iter().map(|s| s.mapped).sum()
    }

    pub fn percentage(&self) -> f64 {
        match self.total() {
            0 => 100.0,
            total => self.mapped() as f64 * 100.0 / total as f64,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sections.iter().all(|s| s.unmapped.is_empty())
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}/{} fields mapped ({:.1}%)",
            self.service,
            self.mapped(),
            self.total(),
            self.percentage()
        )?;
        for section in &self.sections {
            writeln!(
                f,
                "  {}: {}/{} ({:.1}%)",
                section.section,
                section.mapped,
                section.total,
                section.percentage()
            )?;
            for field in &section.unmapped {
                writeln!(f, "    unmapped: {}", field)?;
            }
        }
        Ok(())
    }
}

/// Compare each section's catalog with its emitted fields.
pub fn coverage_report(metadata: &ServiceMetadata) -> CoverageReport {
    let sections = metadata
        .sections
        .iter()
        .map(|section| {
            let columns: Vec<_> = section
                .catalog
                .iter()
                .filter(|c| !is_system_field(&c.field_id))
                .collect();
            SectionCoverage {
                section: section.name.clone(),
                total: columns.len(),
                mapped: columns.iter().filter(|c| c.mapped).count(),
                unmapped: columns
                    .iter()
                    .filter(|c| !c.mapped)
                    .map(|c| c.field_id.clone())
                    .collect(),
            }
        })
        .collect();

    CoverageReport {
        service: metadata.id.clone(),
        sections,
    }
}

/// A required field with no value in a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingField {
    pub section: String,
    /// Collection item index, for collection sections
    pub item: Option<usize>,
    pub field: String,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(item) => write!(f, "{}[{}].{}", self.section, item, self.field),
            None => write!(f, "{}.{}", self.section, self.field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordCheck {
    pub root_id: String,
    pub has_data: bool,
    pub missing: Vec<MissingField>,
}

impl RecordCheck {
    pub fn is_valid(&self) -> bool {
        self.has_data && self.missing.is_empty()
    }
}

/// Check that `record` holds data and that every required field is filled.
///
/// Absent sections are not checked; only sections the record carries can
/// be missing fields.
pub fn check_record(metadata: &ServiceMetadata, record: &ExtractedRecord) -> RecordCheck {
    let mut missing = Vec::new();
    for section in &metadata.sections {
        match record.section(&section.name) {
            Some(SectionData::Object(fields)) => missing_in(section, None, fields, &mut missing),
            Some(SectionData::Collection(items)) => {
                for (index, item) in items.iter().enumerate() {
                    missing_in(section, Some(index), item, &mut missing);
                }
            }
            None => {}
        }
    }

    RecordCheck {
        root_id: record.root_id().to_string(),
        has_data: !record.is_empty(),
        missing,
    }
}

fn missing_in(section: &SectionMapping, item: Option<usize>, fields: &FlatMap, out: &mut Vec<MissingField>) {
    let blank = |id: &str| fields.get(id).map_or(true, |v| v.trim().is_empty());
    for field in section.fields.iter().filter(|f| f.required) {
        if blank(&field.source_id) {
            out.push(MissingField {
                section: section.name.clone(),
                item,
                field: field.source_id.clone(),
            });
        }
    }
}
