// src/transform/gaps.rs

//! Conversion gap ledger
//!
//! Records what a conversion could not carry over instead of failing on it.
//! Every source field without a destination equivalent becomes exactly one
//! `UnmappedField`; every field mapped with fidelity loss becomes exactly one
//! `Approximation`. The ledger is append-only within a run and is surfaced
//! in the final outcome so nothing is dropped silently.

use serde::Serialize;
use std::fmt;

/// Why a field could not be mapped cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapCategory {
    /// The destination platform has no concept for this at all
    Unsupported,
    /// The destination has a related concept with different semantics
    Platform,
    /// Mapping exists but needs configuration the destination lacks
    MissingDependency,
}

impl fmt::Display for GapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::Platform => write!(f, "platform"),
            Self::MissingDependency => write!(f, "missing-dependency"),
        }
    }
}

/// A source field with no destination equivalent
#[derive(Debug, Clone, Serialize)]
pub struct UnmappedField {
    pub field: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub source_file: String,
    pub category: GapCategory,
}

/// A source field mapped with loss of fidelity
#[derive(Debug, Clone, Serialize)]
pub struct Approximation {
    pub original: String,
    pub approximated_as: String,
    pub reason: String,
    pub source_file: String,
    pub category: GapCategory,
}

/// The combined conversion-gap record for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GapLedger {
    pub unmapped_fields: Vec<UnmappedField>,
    pub approximations: Vec<Approximation>,
}

impl GapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unmapped(
        &mut self,
        field: impl Into<String>,
        reason: impl Into<String>,
        suggestion: Option<String>,
        source_file: impl Into<String>,
        category: GapCategory,
    ) {
        self.unmapped_fields.push(UnmappedField {
            field: field.into(),
            reason: reason.into(),
            suggestion,
            source_file: source_file.into(),
            category,
        });
    }

    pub fn add_approximation(
        &mut self,
        original: impl Into<String>,
        approximated_as: impl Into<String>,
        reason: impl Into<String>,
        source_file: impl Into<String>,
        category: GapCategory,
    ) {
        self.approximations.push(Approximation {
            original: original.into(),
            approximated_as: approximated_as.into(),
            reason: reason.into(),
            source_file: source_file.into(),
            category,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.unmapped_fields.is_empty() && self.approximations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.unmapped_fields.len() + self.approximations.len()
    }

    /// One-line summary for run reporting
    pub fn summary(&self) -> String {
        format!(
            "{} unmapped field(s), {} approximation(s)",
            self.unmapped_fields.len(),
            self.approximations.len()
        )
    }
}
