//! Validation utilities

use std::collections::HashSet;

use crate::ledger::chart::ChartOfAccounts;
use crate::traits::*;
use crate::types::*;
use crate::utils::decimal::zero;

/// Validate that an account code is well formed
pub fn validate_account_code(account_code: &str) -> LedgerResult<()> {
    if account_code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if account_code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !account_code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "Account code can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that an entry description is valid
pub fn validate_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate a raw transaction before it is classified and posted
pub fn validate_raw_transaction(
    transaction: &RawTransaction,
    base_currency: &str,
) -> LedgerResult<()> {
    if transaction.id.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Transaction id cannot be empty".to_string(),
        ));
    }
    validate_description(&transaction.description)?;
    if transaction.amount == zero() {
        return Err(LedgerError::Validation(format!(
            "Transaction '{}' has a zero amount",
            transaction.id
        )));
    }
    if !transaction.currency.eq_ignore_ascii_case(base_currency) {
        return Err(LedgerError::Validation(format!(
            "Transaction '{}' is in {}, only {} is supported",
            transaction.id, transaction.currency, base_currency
        )));
    }
    Ok(())
}

/// Entry validator with detailed checks on top of the double-entry rules
pub struct EnhancedEntryValidator;

impl EntryValidator for EnhancedEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        entry.validate()?;

        validate_description(&entry.description)?;

        for line in &entry.lines {
            validate_account_code(&line.account_code)?;
        }

        // Same account cannot appear twice on the same side
        let mut seen = HashSet::new();
        for line in &entry.lines {
            if let Some((side, _)) = line.side() {
                if !seen.insert((line.account_code.as_str(), side)) {
                    return Err(LedgerError::Validation(format!(
                        "Account '{}' appears multiple times on the same side of the entry",
                        line.account_code
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_account_references(
        &self,
        entry: &JournalEntry,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<()> {
        DefaultEntryValidator.validate_account_references(entry, chart)
    }
}
