//! Rule-driven tax computation
//!
//! A [`TaxRuleBook`](rulebook::TaxRuleBook) supplies rates, bands and formulas
//! for one jurisdiction and tax year. The orchestrator evaluates income tax
//! (company or personal) against it and runs each sub-calculator
//! independently, merging every step into one reconciliation report.

pub mod bands;
pub mod cgt;
pub mod formula;
pub mod income;
pub mod levies;
pub mod orchestrator;
pub mod profile;
pub mod rulebook;
pub mod rules;
pub mod stamp_duty;
pub mod tet;
pub mod vat;
pub mod wht;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reconciliation::ReconciliationReport;
pub use bands::{BandComputation, BandResult, BandWidth, ProgressiveBandCalculator, TaxBand};
pub use formula::{FormulaError, FormulaEvaluator, Variables};
pub use orchestrator::{TaxComputationOrchestrator, TaxResult};
pub use profile::{FinancialInputs, TaxComputationRequest, TaxProfile, TaxpayerType};
pub use rulebook::{RuleBookKey, RuleBookStore, TaxRuleBook};

/// A single invalid request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tax engine errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaxError {
    /// Missing or corrupt rulebook. Aborts the whole computation.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Request rejected before any computation
    #[error("Invalid request: {}", join_fields(.0))]
    Validation(Vec<FieldError>),
    #[error("Invalid tax bands: {0}")]
    Band(String),
}

pub type TaxEngineResult<T> = Result<T, TaxError>;

/// Outcome of one sub-calculator inside a full computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaxComponent<T> {
    Computed(T),
    Unavailable { reason: String },
}

impl<T> TaxComponent<T> {
    pub fn computed(&self) -> Option<&T> {
        match self {
            TaxComponent::Computed(value) => Some(value),
            TaxComponent::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TaxComponent::Computed(_))
    }
}

/// A result together with the reconciliation rows that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traced<T> {
    pub result: T,
    pub report: ReconciliationReport,
}

impl<T> Traced<T> {
    pub fn new(result: T, report: ReconciliationReport) -> Self {
        Self { result, report }
    }
}
