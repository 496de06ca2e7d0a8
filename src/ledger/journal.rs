//! Journal entry construction and common posting patterns

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::ledger::chart::ChartOfAccounts;
use crate::traits::*;
use crate::types::*;
use crate::utils::decimal::round_currency;

/// Builder for journal entries
///
/// Line amounts are rounded to the smallest currency unit as they are added;
/// `build` then checks the balance exactly, so any rounding drift is rejected
/// rather than persisted.
#[derive(Debug)]
pub struct JournalEntryBuilder {
    entry: JournalEntry,
}

impl JournalEntryBuilder {
    /// Create a new builder with a generated entry ID
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), date, description)
    }

    /// Create a new builder with an explicit entry ID
    pub fn with_id(id: impl Into<String>, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            entry: JournalEntry {
                id: id.into(),
                date,
                description: description.into(),
                reference: None,
                lines: Vec::new(),
                source: EntrySource::Manual,
                confidence: 1.0,
                verified: false,
                posted: false,
                posted_at: None,
                reverses: None,
                metadata: HashMap::new(),
            },
        }
    }

    /// Set the reference for the entry
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.entry.reference = Some(reference.into());
        self
    }

    pub fn source(mut self, source: EntrySource) -> Self {
        self.entry.source = source;
        self
    }

    /// Confidence is clamped to [0, 1]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.entry.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.entry.verified = verified;
        self
    }

    pub fn reverses(mut self, entry_id: impl Into<String>) -> Self {
        self.entry.reverses = Some(entry_id.into());
        self
    }

    /// Add metadata to the entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry.metadata.insert(key.into(), value.into());
        self
    }

    /// Add a debit line
    pub fn debit(
        mut self,
        account_code: impl Into<String>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        self.entry
            .lines
            .push(JournalLine::debit(account_code, round_currency(&amount), memo));
        self
    }

    /// Add a credit line
    pub fn credit(
        mut self,
        account_code: impl Into<String>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        self.entry
            .lines
            .push(JournalLine::credit(account_code, round_currency(&amount), memo));
        self
    }

    /// Build the entry, validating balance and account references
    pub fn build(self, chart: &ChartOfAccounts) -> LedgerResult<JournalEntry> {
        self.build_with(chart, &DefaultEntryValidator)
    }

    /// Build the entry with a custom validator
    pub fn build_with(
        self,
        chart: &ChartOfAccounts,
        validator: &dyn EntryValidator,
    ) -> LedgerResult<JournalEntry> {
        validator.validate_entry(&self.entry)?;
        validator.validate_account_references(&self.entry, chart)?;
        Ok(self.entry)
    }
}

/// Build the reversing entry for a posted entry: every debit becomes a credit
/// and vice versa.
pub fn reversal_of(
    original: &JournalEntry,
    date: NaiveDate,
    reason: &str,
    chart: &ChartOfAccounts,
) -> LedgerResult<JournalEntry> {
    let mut builder = JournalEntryBuilder::new(date, format!("Reversal: {}", original.description))
        .reference(format!("reversal:{}", original.id))
        .reverses(original.id.clone())
        .metadata("reason", reason);

    for line in &original.lines {
        match line.side() {
            Some((EntryType::Debit, amount)) => {
                builder = builder.credit(line.account_code.clone(), amount.clone(), line.memo.clone());
            }
            Some((EntryType::Credit, amount)) => {
                builder = builder.debit(line.account_code.clone(), amount.clone(), line.memo.clone());
            }
            None => {
                return Err(LedgerError::InvalidEntry(format!(
                    "Entry '{}' has a line without a single side",
                    original.id
                )))
            }
        }
    }

    builder.build(chart)
}

/// Parameters for a sale with VAT
pub struct SaleWithVatParams {
    pub date: NaiveDate,
    pub description: String,
    pub receivable_or_cash_account: String,
    pub revenue_account: String,
    pub vat_output_account: String,
    pub net_amount: BigDecimal,
    pub vat_amount: BigDecimal,
}

/// Parameters for a purchase with VAT
pub struct PurchaseWithVatParams {
    pub date: NaiveDate,
    pub description: String,
    pub expense_account: String,
    pub vat_input_account: String,
    pub payable_or_cash_account: String,
    pub net_amount: BigDecimal,
    pub vat_amount: BigDecimal,
}

/// Common posting patterns
pub mod patterns {
    use super::*;

    /// Money received for income (debit cash/receivable, credit revenue)
    pub fn income_receipt(
        date: NaiveDate,
        description: impl Into<String>,
        cash_or_receivable_account: &str,
        revenue_account: &str,
        amount: BigDecimal,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<JournalEntry> {
        JournalEntryBuilder::new(date, description)
            .debit(cash_or_receivable_account, amount.clone(), None)
            .credit(revenue_account, amount, None)
            .build(chart)
    }

    /// Money paid for an expense (debit expense, credit cash/payable)
    pub fn expense_payment(
        date: NaiveDate,
        description: impl Into<String>,
        expense_account: &str,
        cash_or_payable_account: &str,
        amount: BigDecimal,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<JournalEntry> {
        JournalEntryBuilder::new(date, description)
            .debit(expense_account, amount.clone(), None)
            .credit(cash_or_payable_account, amount, None)
            .build(chart)
    }

    /// Sale with output VAT
    pub fn sale_with_vat(
        params: SaleWithVatParams,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<JournalEntry> {
        let gross = &params.net_amount + &params.vat_amount;

        JournalEntryBuilder::new(params.date, params.description)
            .debit(
                params.receivable_or_cash_account,
                gross,
                Some("Total including VAT".to_string()),
            )
            .credit(
                params.revenue_account,
                params.net_amount,
                Some("Revenue amount".to_string()),
            )
            .credit(
                params.vat_output_account,
                params.vat_amount,
                Some("Output VAT".to_string()),
            )
            .build(chart)
    }

    /// Purchase with recoverable input VAT
    pub fn purchase_with_vat(
        params: PurchaseWithVatParams,
        chart: &ChartOfAccounts,
    ) -> LedgerResult<JournalEntry> {
        let gross = &params.net_amount + &params.vat_amount;

        JournalEntryBuilder::new(params.date, params.description)
            .debit(
                params.expense_account,
                params.net_amount,
                Some("Expense amount".to_string()),
            )
            .debit(
                params.vat_input_account,
                params.vat_amount,
                Some("Input VAT".to_string()),
            )
            .credit(
                params.payable_or_cash_account,
                gross,
                Some("Total payment".to_string()),
            )
            .build(chart)
    }
}
