//! Non-fatal data-quality signals.
//!
//! Extraction and encoding never fail on missing data. Each gap they hit is
//! handed to a [`GapSink`]; the default sink logs it.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Something the engine could not resolve, with enough context to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionGap {
    /// A collection's foreign key column could not be resolved
    UnresolvedForeignKey { section: String },
    /// A section's key could not be found on its parent row
    MissingReference { section: String, field: String },
    /// A referenced row does not exist
    MissingRow { section: String, table: String, key: String },
    /// A section lacks a table or document path it needs
    SectionConfigMissing { section: String, setting: String },
    /// A field names a transform nobody registered
    NoTransformer { section: String, field: String, transform: String },
    /// A required field has no value
    RequiredFieldMissing { section: String, field: String },
}

impl fmt::Display for ResolutionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionGap::UnresolvedForeignKey { section } => {
                write!(f, "section '{}': no foreign key column could be resolved", section)
            }
            ResolutionGap::MissingReference { section, field } => {
                write!(f, "section '{}': reference field '{}' has no value", section, field)
            }
            ResolutionGap::MissingRow { section, table, key } => {
                write!(f, "section '{}': no row '{}' in table '{}'", section, key, table)
            }
            ResolutionGap::SectionConfigMissing { section, setting } => {
                write!(f, "section '{}': missing '{}'", section, setting)
            }
            ResolutionGap::NoTransformer { section, field, transform } => {
                write!(f, "section '{}': field '{}' uses unknown transform '{}'", section, field, transform)
            }
            ResolutionGap::RequiredFieldMissing { section, field } => {
                write!(f, "section '{}': required field '{}' is missing", section, field)
            }
        }
    }
}

/// Receives resolution gaps as they are found.
pub trait GapSink: Send + Sync {
    fn report(&self, gap: ResolutionGap);
}

/// Logs every gap at warn level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogGapSink;

impl GapSink for LogGapSink {
    fn report(&self, gap: ResolutionGap) {
        warn!(gap = %gap, "Resolution gap");
    }
}

/// Logs and keeps every gap, for callers that want to inspect them.
#[derive(Debug, Default)]
pub struct GapCollector {
    gaps: Mutex<Vec<ResolutionGap>>,
}

impl GapCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gaps(&self) -> Vec<ResolutionGap> {
        self.gaps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Vec<ResolutionGap> {
        std::mem::take(&mut *self.gaps.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl GapSink for GapCollector {
    fn report(&self, gap: ResolutionGap) {
        LogGapSink.report(gap.clone());
        self.gaps.lock().unwrap_or_else(PoisonError::into_inner).push(gap);
    }
}
