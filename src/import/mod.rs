//! Bank transaction import: validate, classify and post
//!
//! Each transaction is handled on its own. A malformed or duplicate
//! transaction is reported in its result and never fails the batch.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classify::{Classification, ClassificationChain};
use crate::ledger::JournalEngine;
use crate::traits::LedgerStorage;
use crate::types::{JournalEntry, LedgerError, RawTransaction};
use crate::utils::decimal::{deserialize_decimal, zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTransactionType {
    /// Money into the account
    Credit,
    /// Money out of the account
    Debit,
}

/// A transaction as delivered by a bank feed or statement upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub narration: Option<String>,
    /// Unsigned amount, the direction comes from `transaction_type`
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: BankTransactionType,
    #[serde(default)]
    pub reference: Option<String>,
    /// Defaults to the ledger's base currency
    #[serde(default)]
    pub currency: Option<String>,
}

impl BankTransaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: BigDecimal,
        transaction_type: BankTransactionType,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            description: description.into(),
            narration: None,
            amount,
            transaction_type,
            reference: None,
            currency: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    pub fn signed_amount(&self) -> BigDecimal {
        match self.transaction_type {
            BankTransactionType::Credit => self.amount.clone(),
            BankTransactionType::Debit => zero() - &self.amount,
        }
    }

    /// Check shape and currency, then convert for posting
    pub fn to_raw(&self, base_currency: &str) -> Result<RawTransaction, ImportError> {
        if self.id.trim().is_empty() {
            return Err(ImportError::Malformed("transaction id is empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(ImportError::Malformed(format!(
                "transaction {} has no description",
                self.id
            )));
        }
        if self.amount <= zero() {
            return Err(ImportError::Malformed(format!(
                "transaction {} has non-positive amount {}",
                self.id, self.amount
            )));
        }
        let currency = self.currency.as_deref().unwrap_or(base_currency);
        if !currency.eq_ignore_ascii_case(base_currency) {
            return Err(ImportError::Currency(format!(
                "transaction {} is in {}, ledger currency is {}",
                self.id, currency, base_currency
            )));
        }

        let mut raw = RawTransaction::new(
            self.id.clone(),
            self.date,
            self.description.trim(),
            self.signed_amount(),
            base_currency,
        );
        raw.reference = self.reference.clone();
        Ok(raw)
    }

    /// Description and narration together, for classification
    fn classification_text(&self) -> String {
        match &self.narration {
            Some(narration) if !narration.trim().is_empty() => {
                format!("{} {}", self.description.trim(), narration.trim())
            }
            _ => self.description.trim().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Malformed transaction: {0}")]
    Malformed(String),
    #[error("Transaction {transaction_id} already imported as entry {entry_id}")]
    Duplicate {
        transaction_id: String,
        entry_id: String,
    },
    #[error("Unsupported currency: {0}")]
    Currency(String),
    #[error("Posting failed: {0}")]
    Posting(#[from] LedgerError),
}

/// Outcome of importing one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub transaction_id: String,
    pub journal_id: Option<String>,
    pub category: Option<String>,
    pub description: String,
    pub amount: BigDecimal,
    #[serde(rename = "type")]
    pub transaction_type: BankTransactionType,
    /// Duplicate of an earlier import, skipped without error
    pub skipped: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTotals {
    pub income: BigDecimal,
    pub expenses: BigDecimal,
    pub net_amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportSummary {
    pub total: usize,
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<ImportResult>,
    pub summary: ImportTotals,
}

/// Imports bank transactions into a journal engine
pub struct BankImporter<S: LedgerStorage> {
    engine: Arc<JournalEngine<S>>,
    chain: ClassificationChain,
}

impl<S: LedgerStorage> BankImporter<S> {
    pub fn new(engine: Arc<JournalEngine<S>>, chain: ClassificationChain) -> Self {
        Self { engine, chain }
    }

    pub fn engine(&self) -> &JournalEngine<S> {
        &self.engine
    }

    /// Import one transaction. Failures are reported in the result.
    pub async fn import_one(&self, transaction: &BankTransaction) -> ImportResult {
        let outcome = self.try_import(transaction).await;

        let mut result = ImportResult {
            success: false,
            transaction_id: transaction.id.clone(),
            journal_id: None,
            category: None,
            description: transaction.description.clone(),
            amount: transaction.amount.clone(),
            transaction_type: transaction.transaction_type,
            skipped: false,
            error: None,
        };

        match outcome {
            Ok((entry, classification)) => {
                result.success = true;
                result.journal_id = Some(entry.id);
                result.category = Some(classification.category);
            }
            Err(ImportError::Duplicate {
                transaction_id,
                entry_id,
            }) => {
                warn!(
                    "Skipping transaction {}: already imported as entry {}",
                    transaction_id, entry_id
                );
                result.skipped = true;
                result.journal_id = Some(entry_id.clone());
                result.error = Some(format!("duplicate of entry {entry_id}"));
            }
            Err(err) => {
                warn!("Failed to import transaction {}: {}", transaction.id, err);
                result.error = Some(err.to_string());
            }
        }
        result
    }

    /// Import transactions one after another and summarise
    pub async fn import_batch(&self, transactions: &[BankTransaction]) -> BatchImportSummary {
        let mut batch = BatchImportSummary {
            total: transactions.len(),
            ..BatchImportSummary::default()
        };

        for transaction in transactions {
            let result = self.import_one(transaction).await;
            if result.success {
                batch.imported += 1;
                match result.transaction_type {
                    BankTransactionType::Credit => batch.summary.income += &result.amount,
                    BankTransactionType::Debit => batch.summary.expenses += &result.amount,
                }
            } else if result.skipped {
                batch.skipped += 1;
            } else {
                batch.failed += 1;
            }
            batch.results.push(result);
        }
        batch.summary.net_amount = &batch.summary.income - &batch.summary.expenses;

        info!(
            "Imported {} of {} transactions ({} skipped, {} failed)",
            batch.imported, batch.total, batch.skipped, batch.failed
        );
        batch
    }

    async fn try_import(
        &self,
        transaction: &BankTransaction,
    ) -> Result<(JournalEntry, Classification), ImportError> {
        let raw = transaction.to_raw(self.engine.base_currency())?;

        if let Some(entry_id) = self.engine.posted_entry_for(&raw.id)? {
            return Err(ImportError::Duplicate {
                transaction_id: raw.id,
                entry_id,
            });
        }

        let text_view = RawTransaction {
            description: transaction.classification_text(),
            ..raw.clone()
        };
        let classification = self.chain.classify_with_ai(&text_view).await;
        debug!(
            "Transaction {} classified as {} ({})",
            raw.id, classification.category, classification.account_code
        );

        match self.engine.post(&raw, &classification) {
            Ok(entry) => Ok((entry, classification)),
            Err(LedgerError::AlreadyPosted { entry_id, .. }) => Err(ImportError::Duplicate {
                transaction_id: raw.id,
                entry_id,
            }),
            Err(err) => Err(err.into()),
        }
    }
}
