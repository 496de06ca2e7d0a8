//! Traits for storage abstraction and extensibility

use chrono::NaiveDate;

use crate::ledger::chart::ChartOfAccounts;
use crate::types::*;

/// Storage abstraction for the journal
///
/// The ledger is append-only: entries are never updated or deleted, and
/// corrections are recorded as new reversing entries. Implementations must make
/// `append_entry` atomic, so that the idempotency check on the entry reference
/// and the insert happen together.
pub trait LedgerStorage: Send + Sync {
    /// Append a posted entry. Fails with `AlreadyPosted` if an entry with the
    /// same reference already exists.
    fn append_entry(&self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Get an entry by ID
    fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>>;

    /// Find the entry carrying the given reference
    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<JournalEntry>>;

    /// List entries within an optional date range, in posting order
    fn list_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    /// Number of entries stored
    fn entry_count(&self) -> LedgerResult<usize>;
}

/// Trait for implementing custom journal entry validation rules
pub trait EntryValidator: Send + Sync {
    /// Validate an entry before posting
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Validate that all referenced accounts exist in the chart
    fn validate_account_references(
        &self,
        entry: &JournalEntry,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<()>;
}

/// Default entry validator with the double-entry rules
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        entry.validate()
    }

    fn validate_account_references(
        &self,
        entry: &JournalEntry,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<()> {
        for line in &entry.lines {
            chart.require(&line.account_code)?;
        }
        Ok(())
    }
}
