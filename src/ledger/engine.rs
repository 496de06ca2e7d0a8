//! Journal engine: posts classified transactions as balanced entries

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::Classification;
use crate::config::{EngineConfig, PostingAccounts};
use crate::ledger::chart::ChartOfAccounts;
use crate::ledger::journal::{reversal_of, JournalEntryBuilder};
use crate::traits::*;
use crate::types::*;
use crate::utils::decimal::zero;
use crate::utils::validation::validate_raw_transaction;

/// Converts classified transactions into journal entries and maintains the ledger
///
/// Every entry is validated before it reaches storage; an entry that fails the
/// balance invariant is never written. Imported transactions carry their
/// external id in the entry reference, so re-importing is a no-op.
pub struct JournalEngine<S: LedgerStorage> {
    chart: Arc<ChartOfAccounts>,
    storage: S,
    validator: Box<dyn EntryValidator>,
    posting: PostingAccounts,
    base_currency: String,
}

impl<S: LedgerStorage> JournalEngine<S> {
    /// Create a new engine with the default validator and posting accounts
    pub fn new(storage: S, chart: Arc<ChartOfAccounts>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            chart,
            storage,
            validator: Box::new(DefaultEntryValidator),
            posting: defaults.posting,
            base_currency: defaults.base_currency,
        }
    }

    /// Use a custom entry validator
    pub fn with_validator(mut self, validator: Box<dyn EntryValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.posting = config.posting.clone();
        self.base_currency = config.base_currency.clone();
        self
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Build the balanced entry for a classified transaction without posting it
    pub fn build_entry(
        &self,
        transaction: &RawTransaction,
        classification: &Classification,
    ) -> LedgerResult<JournalEntry> {
        validate_raw_transaction(transaction, &self.base_currency)?;

        let account = self.chart.require(&classification.account_code)?;
        let expected = classification.flow_type.account_class();
        if account.class != expected {
            return Err(LedgerError::InvalidEntry(format!(
                "Account '{}' is {:?} but flow type {:?} needs {:?}",
                account.code, account.class, classification.flow_type, expected
            )));
        }

        let settlement_code = self.settlement_account(transaction);
        let settlement = self.chart.require(settlement_code)?;
        if settlement.code == account.code {
            return Err(LedgerError::InvalidEntry(format!(
                "Counter account '{}' cannot be the settlement account",
                account.code
            )));
        }

        let amount = transaction.amount.abs();
        let memo = Some(classification.category.clone());
        let builder = JournalEntryBuilder::new(transaction.date, transaction.description.clone())
            .reference(JournalEntry::external_reference(&transaction.id))
            .source(classification.source.entry_source())
            .confidence(classification.confidence)
            .metadata("category", classification.category.clone())
            .metadata("transaction_id", transaction.id.clone());

        // Money in debits the settlement account; money out credits it
        let builder = if transaction.is_inflow() {
            builder
                .debit(settlement.code.clone(), amount.clone(), None)
                .credit(account.code.clone(), amount, memo)
        } else {
            builder
                .debit(account.code.clone(), amount.clone(), memo)
                .credit(settlement.code.clone(), amount, None)
        };

        let builder = match &transaction.vendor {
            Some(vendor) => builder.metadata("vendor", vendor.clone()),
            None => builder,
        };

        builder.build_with(&self.chart, self.validator.as_ref())
    }

    /// Bank for cash settlement, receivables or payables for invoiced amounts
    fn settlement_account(&self, transaction: &RawTransaction) -> &str {
        match (transaction.settlement, transaction.is_inflow()) {
            (Settlement::Cash, _) => &self.posting.bank_account,
            (Settlement::OnAccount, true) => &self.posting.receivable_account,
            (Settlement::OnAccount, false) => &self.posting.payable_account,
        }
    }

    /// Post a classified transaction.
    ///
    /// Fails with `AlreadyPosted` if the transaction id has been posted before.
    pub fn post(
        &self,
        transaction: &RawTransaction,
        classification: &Classification,
    ) -> LedgerResult<JournalEntry> {
        let reference = JournalEntry::external_reference(&transaction.id);
        if let Some(existing) = self.storage.find_by_reference(&reference)? {
            debug!(
                "transaction {} already posted as entry {}",
                transaction.id, existing.id
            );
            return Err(LedgerError::AlreadyPosted {
                reference,
                entry_id: existing.id,
            });
        }

        let entry = self.build_entry(transaction, classification)?;
        self.post_entry(entry)
    }

    /// Validate and post a prepared entry
    pub fn post_entry(&self, mut entry: JournalEntry) -> LedgerResult<JournalEntry> {
        self.validator.validate_entry(&entry)?;
        self.validator
            .validate_account_references(&entry, &self.chart)?;

        entry.posted = true;
        entry.posted_at = Some(chrono::Utc::now().naive_utc());
        self.storage.append_entry(&entry)?;

        debug!(
            "posted entry {} ({}) for {}",
            entry.id,
            entry.description,
            entry.total_debits()
        );
        Ok(entry)
    }

    /// Post the reversing entry for a posted entry
    pub fn reverse(&self, entry_id: &str, date: NaiveDate, reason: &str) -> LedgerResult<JournalEntry> {
        let original = self
            .storage
            .get_entry(entry_id)?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;

        let reversal = reversal_of(&original, date, reason, &self.chart)?;
        self.post_entry(reversal)
    }

    /// ID of the entry posted for an external transaction, if any
    pub fn posted_entry_for(&self, transaction_id: &str) -> LedgerResult<Option<String>> {
        Ok(self
            .storage
            .find_by_reference(&JournalEntry::external_reference(transaction_id))?
            .map(|entry| entry.id))
    }

    /// Posted entries within an optional date range
    pub fn entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.list_entries(start_date, end_date)
    }

    /// Account balance on its normal side, as of an optional date
    pub fn account_balance(
        &self,
        account_code: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let account = self.chart.require(account_code)?;
        let mut balance = zero();
        for entry in self.storage.list_entries(None, as_of_date)? {
            for line in entry.lines.iter().filter(|l| l.account_code == account_code) {
                if let Some((side, amount)) = line.side() {
                    balance += account.balance_effect(side, amount);
                }
            }
        }
        Ok(balance)
    }

    /// Trial balance over every account with activity
    pub fn trial_balance(&self, as_of_date: Option<NaiveDate>) -> LedgerResult<TrialBalance> {
        let mut movements: HashMap<&str, BigDecimal> = HashMap::new();
        let entries = self.storage.list_entries(None, as_of_date)?;
        for entry in &entries {
            for line in &entry.lines {
                let account = self.chart.require(&line.account_code)?;
                if let Some((side, amount)) = line.side() {
                    *movements.entry(account.code.as_str()).or_insert_with(zero) +=
                        account.balance_effect(side, amount);
                }
            }
        }

        let mut balances = Vec::new();
        let mut total_debits = zero();
        let mut total_credits = zero();

        // Chart order keeps the output stable
        for account in self.chart.iter() {
            let Some(balance) = movements.get(account.code.as_str()) else {
                continue;
            };
            let on_normal_side = *balance >= zero();
            let amount = balance.abs();
            let is_debit = match account.class.normal_balance() {
                EntryType::Debit => on_normal_side,
                EntryType::Credit => !on_normal_side,
            };

            if is_debit {
                total_debits += &amount;
            } else {
                total_credits += &amount;
            }

            balances.push(AccountBalance {
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                class: account.class,
                debit_balance: is_debit.then(|| amount.clone()),
                credit_balance: (!is_debit).then_some(amount),
            });
        }

        let is_balanced = total_debits == total_credits;

        Ok(TrialBalance {
            as_of_date,
            balances,
            total_debits,
            total_credits,
            is_balanced,
        })
    }

    /// Validate the integrity of the ledger
    pub fn validate_integrity(&self, as_of_date: Option<NaiveDate>) -> LedgerResult<LedgerIntegrityReport> {
        let mut issues = Vec::new();

        let entries = self.storage.list_entries(None, as_of_date)?;
        for entry in &entries {
            if let Err(err) = entry.validate() {
                issues.push(format!("Entry {}: {}", entry.id, err));
            }
            for line in &entry.lines {
                if !self.chart.contains(&line.account_code) {
                    issues.push(format!(
                        "Entry {} references unknown account {}",
                        entry.id, line.account_code
                    ));
                }
            }
        }

        let trial_balance = self.trial_balance(as_of_date)?;
        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            entry_count: entries.len(),
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
        })
    }
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: Option<NaiveDate>,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub entry_count: usize,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassificationSource, FlowType};
    use crate::ledger::chart::codes;
    use crate::utils::memory_storage::MemoryStorage;

    fn engine() -> JournalEngine<MemoryStorage> {
        JournalEngine::new(MemoryStorage::new(), Arc::new(ChartOfAccounts::standard().unwrap()))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn classification(category: &str, flow_type: FlowType, account: &str) -> Classification {
        Classification {
            category: category.to_string(),
            flow_type,
            account_code: account.to_string(),
            confidence: 0.9,
            source: ClassificationSource::Rule,
            rule_name: None,
        }
    }

    #[test]
    fn test_on_account_settlement_uses_receivables_and_payables() {
        let engine = engine();

        let invoice = RawTransaction::new("inv-1", date(), "Invoice INV-7", BigDecimal::from(80000), "NGN")
            .on_account();
        let entry = engine
            .post(&invoice, &classification("sales-income", FlowType::Income, codes::SALES_REVENUE))
            .unwrap();
        assert_eq!(entry.lines[0].account_code, codes::ACCOUNTS_RECEIVABLE);
        assert!(!entry.touches(codes::BANK));

        let bill = RawTransaction::new("bill-1", date(), "Rent bill", BigDecimal::from(-30000), "NGN")
            .on_account();
        let entry = engine
            .post(&bill, &classification("rent-expense", FlowType::Expense, codes::RENT))
            .unwrap();
        assert_eq!(entry.lines[1].account_code, codes::ACCOUNTS_PAYABLE);
        assert_eq!(entry.lines[1].credit, BigDecimal::from(30000));
    }

    #[test]
    fn test_configured_posting_accounts_are_used() {
        let mut config = EngineConfig::default();
        config.posting.receivable_account = codes::BANK.to_string();
        let engine = engine().with_config(&config);

        let invoice = RawTransaction::new("inv-2", date(), "Invoice INV-8", BigDecimal::from(1000), "NGN")
            .on_account();
        let entry = engine
            .post(&invoice, &classification("sales-income", FlowType::Income, codes::SALES_REVENUE))
            .unwrap();
        assert_eq!(entry.lines[0].account_code, codes::BANK);
    }

    #[test]
    fn test_ledger_basic_operations() {
        let engine = engine();

        let sale = RawTransaction::new("t1", date(), "Invoice payment received", BigDecimal::from(500000), "NGN");
        let entry = engine
            .post(&sale, &classification("sales-income", FlowType::Income, codes::SALES_REVENUE))
            .unwrap();

        assert!(entry.posted);
        assert_eq!(entry.lines[0].account_code, codes::BANK);
        assert_eq!(entry.lines[0].debit, BigDecimal::from(500000));
        assert_eq!(entry.lines[1].account_code, codes::SALES_REVENUE);
        assert_eq!(entry.lines[1].credit, BigDecimal::from(500000));

        let salary = RawTransaction::new("t2", date(), "Salary payment", BigDecimal::from(-150000), "NGN");
        let entry = engine
            .post(&salary, &classification("salary-expense", FlowType::Expense, codes::SALARIES))
            .unwrap();
        assert_eq!(entry.lines[0].account_code, codes::SALARIES);
        assert_eq!(entry.lines[0].debit, BigDecimal::from(150000));
        assert_eq!(entry.lines[1].account_code, codes::BANK);

        assert_eq!(
            engine.account_balance(codes::BANK, None).unwrap(),
            BigDecimal::from(350000)
        );
        assert_eq!(
            engine.account_balance(codes::SALES_REVENUE, None).unwrap(),
            BigDecimal::from(500000)
        );

        let trial_balance = engine.trial_balance(None).unwrap();
        assert!(trial_balance.is_balanced);
        assert_eq!(trial_balance.total_debits, BigDecimal::from(500000));
    }

    #[test]
    fn test_repeat_post_is_skipped() {
        let engine = engine();
        let sale = RawTransaction::new("t1", date(), "Sale", BigDecimal::from(1000), "NGN");
        let class = classification("sales-income", FlowType::Income, codes::SALES_REVENUE);

        let first = engine.post(&sale, &class).unwrap();
        let second = engine.post(&sale, &class);

        assert!(matches!(
            second,
            Err(LedgerError::AlreadyPosted { entry_id, .. }) if entry_id == first.id
        ));
        assert_eq!(engine.entries(None, None).unwrap().len(), 1);
        assert_eq!(engine.posted_entry_for("t1").unwrap(), Some(first.id));
    }

    #[test]
    fn test_flow_type_must_match_account_class() {
        let engine = engine();
        let sale = RawTransaction::new("t1", date(), "Sale", BigDecimal::from(1000), "NGN");
        let result = engine.post(
            &sale,
            &classification("sales-income", FlowType::Income, codes::RENT),
        );
        assert!(matches!(result, Err(LedgerError::InvalidEntry(_))));
        assert_eq!(engine.entries(None, None).unwrap().len(), 0);
    }

    #[test]
    fn test_unknown_account_rejected() {
        let engine = engine();
        let sale = RawTransaction::new("t1", date(), "Sale", BigDecimal::from(1000), "NGN");
        let result = engine.post(
            &sale,
            &classification("sales-income", FlowType::Income, "4999"),
        );
        assert!(matches!(result, Err(LedgerError::UnknownAccount(_))));
    }

    #[test]
    fn test_unbalanced_manual_entry_never_persisted() {
        let engine = engine();
        let mut entry = crate::ledger::journal::patterns::expense_payment(
            date(),
            "Rent",
            codes::RENT,
            codes::BANK,
            BigDecimal::from(1000),
            engine.chart(),
        )
        .unwrap();
        entry.lines[1].credit = BigDecimal::from(999);

        assert!(matches!(
            engine.post_entry(entry),
            Err(LedgerError::Unbalanced { .. })
        ));
        assert_eq!(engine.storage().entry_count().unwrap(), 0);
    }

    #[test]
    fn test_reverse_restores_balances() {
        let engine = engine();
        let rent = RawTransaction::new("t1", date(), "Office rent", BigDecimal::from(-80000), "NGN");
        let entry = engine
            .post(&rent, &classification("rent-expense", FlowType::Expense, codes::RENT))
            .unwrap();

        let reversal = engine.reverse(&entry.id, date(), "duplicate bank line").unwrap();
        assert_eq!(reversal.reverses.as_deref(), Some(entry.id.as_str()));
        assert_eq!(engine.account_balance(codes::RENT, None).unwrap(), zero());
        assert_eq!(engine.account_balance(codes::BANK, None).unwrap(), zero());

        // A second reversal of the same entry is a duplicate
        assert!(matches!(
            engine.reverse(&entry.id, date(), "again"),
            Err(LedgerError::AlreadyPosted { .. })
        ));
    }

    #[test]
    fn test_validate_integrity() {
        let engine = engine();
        let sale = RawTransaction::new("t1", date(), "Sale", BigDecimal::from(1000), "NGN");
        engine
            .post(&sale, &classification("sales-income", FlowType::Income, codes::SALES_REVENUE))
            .unwrap();

        let report = engine.validate_integrity(None).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.entry_count, 1);
    }
}
