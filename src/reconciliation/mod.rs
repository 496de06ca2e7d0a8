//! Reconciliation trail: the ordered, append-only record of computation steps
//!
//! Every figure a tax computation produces is recorded as a row, with the rule
//! key and citation it came from where there is one. Steps that degraded (a
//! formula that failed, a sub-calculation that was unavailable) are also listed
//! as issues so a partial result is never mistaken for a complete one.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// One step of a computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub step_id: String,
    pub label: String,
    pub value: BigDecimal,
    pub formula: Option<String>,
    pub rule_key: Option<String>,
    pub citation: Option<String>,
    pub notes: Option<String>,
}

impl ReconciliationRow {
    pub fn new(step_id: impl Into<String>, label: impl Into<String>, value: BigDecimal) -> Self {
        Self {
            step_id: step_id.into(),
            label: label.into(),
            value,
            formula: None,
            rule_key: None,
            citation: None,
            notes: None,
        }
    }

    pub fn formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn rule(mut self, rule_key: impl Into<String>, citation: Option<String>) -> Self {
        self.rule_key = Some(rule_key.into());
        self.citation = citation;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A step that did not complete normally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationIssue {
    pub step_id: String,
    pub message: String,
}

/// Append-only list of reconciliation rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    rows: Vec<ReconciliationRow>,
    issues: Vec<ComputationIssue>,
}

impl ReconciliationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ReconciliationRow) {
        self.rows.push(row);
    }

    /// Record a degraded step
    pub fn flag(&mut self, step_id: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ComputationIssue {
            step_id: step_id.into(),
            message: message.into(),
        });
    }

    /// Append all rows and issues of another report
    pub fn extend(&mut self, other: ReconciliationReport) {
        self.rows.extend(other.rows);
        self.issues.extend(other.issues);
    }

    pub fn rows(&self) -> &[ReconciliationRow] {
        &self.rows
    }

    pub fn issues(&self) -> &[ComputationIssue] {
        &self.issues
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// First row with the given step id
    pub fn find(&self, step_id: &str) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|row| row.step_id == step_id)
    }

    /// Rows whose step id starts with the given prefix
    pub fn rows_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a ReconciliationRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.step_id.starts_with(prefix))
    }
}
