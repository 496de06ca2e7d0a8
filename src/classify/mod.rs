//! Transaction classification: narration text to category, flow type and account

pub mod ai;
pub mod rules;

pub use ai::*;
pub use rules::*;

use serde::{Deserialize, Serialize};

use crate::types::{AccountClass, EntrySource};

/// Economic nature of a transaction, which fixes the class of the counter account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Income,
    Expense,
    /// Purchase or sale of a balance-sheet asset
    Asset,
    /// Loans, tax remittances and other amounts owed
    Liability,
    /// Owner contributions and drawings
    Equity,
}

impl FlowType {
    /// Account class the counter account must belong to
    pub fn account_class(&self) -> AccountClass {
        match self {
            FlowType::Income => AccountClass::Revenue,
            FlowType::Expense => AccountClass::Expense,
            FlowType::Asset => AccountClass::Asset,
            FlowType::Liability => AccountClass::Liability,
            FlowType::Equity => AccountClass::Equity,
        }
    }
}

/// Direction of money movement a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inflow,
    Outflow,
    Any,
}

impl Direction {
    pub fn admits(&self, inflow: bool) -> bool {
        match self {
            Direction::Any => true,
            Direction::Inflow => inflow,
            Direction::Outflow => !inflow,
        }
    }
}

/// Which strategy produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// A rule in the priority table matched
    Rule,
    /// No rule matched; default category by sign
    Fallback,
    /// The AI collaborator's suggestion was taken
    Ai,
    /// The AI collaborator agreed with the rule-based category
    Hybrid,
}

impl ClassificationSource {
    /// Journal entry source tag for entries posted from this classification
    pub fn entry_source(&self) -> EntrySource {
        match self {
            ClassificationSource::Rule | ClassificationSource::Fallback => EntrySource::Rule,
            ClassificationSource::Ai => EntrySource::Ai,
            ClassificationSource::Hybrid => EntrySource::Hybrid,
        }
    }
}

/// Result of classifying one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub flow_type: FlowType,
    pub account_code: String,
    /// Score in [0, 1]
    pub confidence: f64,
    pub source: ClassificationSource,
    /// Name of the rule that matched, if any
    pub rule_name: Option<String>,
}
