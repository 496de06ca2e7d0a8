//! In-memory journal storage

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Journal {
    /// Entries in posting order
    entries: Vec<JournalEntry>,
    by_id: HashMap<String, usize>,
    by_reference: HashMap<String, usize>,
}

/// In-memory storage for tests, demos and single-process use
///
/// Clones share the same journal.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    journal: Arc<RwLock<Journal>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Journal>> {
        self.journal
            .read()
            .map_err(|_| LedgerError::Storage("journal lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Journal>> {
        self.journal
            .write()
            .map_err(|_| LedgerError::Storage("journal lock poisoned".to_string()))
    }
}

fn within(date: NaiveDate, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> bool {
    start_date.is_none_or(|start| date >= start) && end_date.is_none_or(|end| date <= end)
}

impl LedgerStorage for MemoryStorage {
    fn append_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        let mut journal = self.write()?;

        if journal.by_id.contains_key(&entry.id) {
            return Err(LedgerError::Storage(format!(
                "entry id '{}' already exists",
                entry.id
            )));
        }
        if let Some(reference) = &entry.reference {
            if let Some(&position) = journal.by_reference.get(reference) {
                return Err(LedgerError::AlreadyPosted {
                    reference: reference.clone(),
                    entry_id: journal.entries[position].id.clone(),
                });
            }
        }

        let position = journal.entries.len();
        journal.by_id.insert(entry.id.clone(), position);
        if let Some(reference) = &entry.reference {
            journal.by_reference.insert(reference.clone(), position);
        }
        journal.entries.push(entry.clone());
        Ok(())
    }

    fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>> {
        let journal = self.read()?;
        Ok(journal
            .by_id
            .get(entry_id)
            .map(|&position| journal.entries[position].clone()))
    }

    fn find_by_reference(&self, reference: &str) -> LedgerResult<Option<JournalEntry>> {
        let journal = self.read()?;
        Ok(journal
            .by_reference
            .get(reference)
            .map(|&position| journal.entries[position].clone()))
    }

    fn list_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let journal = self.read()?;
        Ok(journal
            .entries
            .iter()
            .filter(|entry| within(entry.date, start_date, end_date))
            .cloned()
            .collect())
    }

    fn entry_count(&self) -> LedgerResult<usize> {
        Ok(self.read()?.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn entry(id: &str, reference: Option<&str>, day: u32) -> JournalEntry {
        JournalEntry {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            description: "Test".to_string(),
            reference: reference.map(str::to_string),
            lines: vec![
                JournalLine::debit("1020", BigDecimal::from(10), None),
                JournalLine::credit("4000", BigDecimal::from(10), None),
            ],
            source: EntrySource::Manual,
            confidence: 1.0,
            verified: false,
            posted: true,
            posted_at: None,
            reverses: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let storage = MemoryStorage::new();
        storage.append_entry(&entry("a", Some("txn:1"), 1)).unwrap();

        let result = storage.append_entry(&entry("b", Some("txn:1"), 1));
        assert!(matches!(
            result,
            Err(LedgerError::AlreadyPosted { entry_id, .. }) if entry_id == "a"
        ));
        assert_eq!(storage.entry_count().unwrap(), 1);
    }

    #[test]
    fn test_list_entries_by_date() {
        let storage = MemoryStorage::new();
        storage.append_entry(&entry("a", None, 1)).unwrap();
        storage.append_entry(&entry("b", None, 15)).unwrap();
        storage.append_entry(&entry("c", None, 31)).unwrap();

        let mid = storage
            .list_entries(
                NaiveDate::from_ymd_opt(2025, 1, 10),
                NaiveDate::from_ymd_opt(2025, 1, 20),
            )
            .unwrap();
        assert_eq!(mid.len(), 1);
        assert_eq!(mid[0].id, "b");

        assert_eq!(storage.list_entries(None, None).unwrap().len(), 3);
    }

    #[test]
    fn test_clones_share_journal() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        storage.append_entry(&entry("a", Some("txn:9"), 2)).unwrap();
        assert!(clone.find_by_reference("txn:9").unwrap().is_some());
        assert!(clone.get_entry("a").unwrap().is_some());
    }
}
