//! # Taxbook Core
//!
//! Books-to-tax pipeline for small businesses: bank transactions are
//! classified, posted to a double-entry journal, summarised into draft
//! statements and run through a versioned tax rulebook.
//!
//! ## Features
//!
//! - **Classification**: Regex rules with an optional AI fallback, always producing a category
//! - **Double-entry journal**: Balanced, append-only entries with idempotent posting
//! - **Statements**: Income statement, balance sheet and cash flow drafts from the journal
//! - **Tax rulebooks**: JSON rulebooks per jurisdiction and year, loaded once and cached
//! - **Tax computation**: CIT, PIT, VAT, WHT, CGT, TET, stamp duty and levies with a reconciliation trail
//! - **Compliance**: Registration and filing checks with alert lifecycle
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use taxbook_core::tax::{RuleBookStore, TaxComputationOrchestrator, TaxComputationRequest, TaxProfile};
//! use taxbook_core::tax::FinancialInputs;
//! use bigdecimal::BigDecimal;
//!
//! let orchestrator = TaxComputationOrchestrator::new(Arc::new(RuleBookStore::builtin()));
//! let request = TaxComputationRequest::new(
//!     TaxProfile::company(2025, "NG"),
//!     FinancialInputs::new(BigDecimal::from(50_000_000)),
//! );
//! let result = orchestrator.compute(&request).unwrap();
//! assert!(result.total_tax_due >= BigDecimal::from(0));
//! ```

pub mod classify;
pub mod compliance;
pub mod config;
pub mod import;
pub mod ledger;
pub mod reconciliation;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use classify::{Classification, ClassificationChain, RuleBasedClassifier};
pub use config::EngineConfig;
pub use import::{BankImporter, BankTransaction, BankTransactionType, BatchImportSummary};
pub use ledger::*;
pub use reconciliation::{ReconciliationReport, ReconciliationRow};
pub use traits::*;
pub use types::*;

// Re-export journal patterns for convenience
pub use ledger::journal::patterns;
