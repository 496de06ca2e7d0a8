//! Core types and data structures for the books-to-tax pipeline

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::decimal::zero;

/// Account classes following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
    /// Assets - what the business owns (Cash, Receivables, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Payables, Taxes, Loans, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountClass {
    /// Returns the normal balance side for this account class
    /// Assets and Expenses normally have debit balances
    /// Liabilities, Equity, and Revenue normally have credit balances
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountClass::Asset | AccountClass::Expense => EntryType::Debit,
            AccountClass::Liability | AccountClass::Equity | AccountClass::Revenue => {
                EntryType::Credit
            }
        }
    }
}

/// Finer grouping used when deriving statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSubclass {
    Cash,
    CurrentAsset,
    NonCurrentAsset,
    CurrentLiability,
    NonCurrentLiability,
    Capital,
    RetainedEarnings,
    Drawings,
    OperatingRevenue,
    OtherIncome,
    CostOfSales,
    OperatingExpense,
}

/// Sides of a double-entry posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Debit - increases Assets and Expenses, decreases Liabilities, Equity, and Revenue
    Debit,
    /// Credit - increases Liabilities, Equity, and Revenue, decreases Assets and Expenses
    Credit,
}

/// Chart-of-accounts entry. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account code, e.g. "4000"
    pub code: String,
    /// Human-readable account name
    pub name: String,
    pub class: AccountClass,
    pub subclass: AccountSubclass,
    /// Whether the expense is allowable for income tax
    pub tax_deductible: bool,
    /// Whether VAT applies to flows through this account
    pub vat_applicable: bool,
    /// Whether payments through this account attract withholding tax
    pub wht_applicable: bool,
    pub wht_rate: Option<BigDecimal>,
}

impl Account {
    /// Create a new account with no tax attributes
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        class: AccountClass,
        subclass: AccountSubclass,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            class,
            subclass,
            // Expenses are deductible unless marked otherwise
            tax_deductible: class == AccountClass::Expense,
            vat_applicable: false,
            wht_applicable: false,
            wht_rate: None,
        }
    }

    pub fn non_deductible(mut self) -> Self {
        self.tax_deductible = false;
        self
    }

    pub fn vatable(mut self) -> Self {
        self.vat_applicable = true;
        self
    }

    pub fn with_wht(mut self, rate: BigDecimal) -> Self {
        self.wht_applicable = true;
        self.wht_rate = Some(rate);
        self
    }

    /// Signed movement of this account's balance for one posting
    pub fn balance_effect(&self, entry_type: EntryType, amount: &BigDecimal) -> BigDecimal {
        if self.class.normal_balance() == entry_type {
            amount.clone()
        } else {
            zero() - amount
        }
    }
}

/// How a transaction is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Paid or received through the bank account
    #[default]
    Cash,
    /// Invoiced or billed: income hits receivables, expenses hit payables
    OnAccount,
}

/// Raw business transaction as produced by a bank import or manual entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// External transaction id, used as the idempotency key
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Signed amount: positive is money in, negative is money out
    pub amount: BigDecimal,
    pub currency: String,
    pub vendor: Option<String>,
    pub reference: Option<String>,
    #[serde(default)]
    pub settlement: Settlement,
}

impl RawTransaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            description: description.into(),
            amount,
            currency: currency.into(),
            vendor: None,
            reference: None,
            settlement: Settlement::Cash,
        }
    }

    /// Mark the transaction as invoiced or billed rather than paid
    pub fn on_account(mut self) -> Self {
        self.settlement = Settlement::OnAccount;
        self
    }

    /// Money flowing into the business
    pub fn is_inflow(&self) -> bool {
        self.amount > zero()
    }
}

/// Single debit or credit line of a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub memo: Option<String>,
}

impl JournalLine {
    /// Create a debit line
    pub fn debit(account_code: impl Into<String>, amount: BigDecimal, memo: Option<String>) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: zero(),
            memo,
        }
    }

    /// Create a credit line
    pub fn credit(
        account_code: impl Into<String>,
        amount: BigDecimal,
        memo: Option<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            debit: zero(),
            credit: amount,
            memo,
        }
    }

    /// Side and amount of this line, if it carries exactly one side
    pub fn side(&self) -> Option<(EntryType, &BigDecimal)> {
        let nothing = zero();
        match (self.debit > nothing, self.credit > nothing) {
            (true, false) => Some((EntryType::Debit, &self.debit)),
            (false, true) => Some((EntryType::Credit, &self.credit)),
            _ => None,
        }
    }
}

/// How a journal entry was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Manual,
    Rule,
    Ai,
    Hybrid,
}

/// Balanced double-entry journal entry. Append-only once posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Carries the external transaction id for imported entries
    pub reference: Option<String>,
    pub lines: Vec<JournalLine>,
    pub source: EntrySource,
    pub confidence: f64,
    pub verified: bool,
    pub posted: bool,
    pub posted_at: Option<NaiveDateTime>,
    /// Entry this one reverses, if it is a correction
    pub reverses: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl JournalEntry {
    /// Reference used to embed an external transaction id
    pub fn external_reference(transaction_id: &str) -> String {
        format!("txn:{transaction_id}")
    }

    /// Calculate total debits
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.debit).sum()
    }

    /// Calculate total credits
    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.credit).sum()
    }

    /// Check if the entry is balanced (debits = credits)
    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Validate the double-entry invariant
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::InvalidEntry(
                "Entry must have at least two lines for double-entry bookkeeping".to_string(),
            ));
        }

        for line in &self.lines {
            if line.debit < zero() || line.credit < zero() {
                return Err(LedgerError::InvalidEntry(format!(
                    "Line for account '{}' has a negative amount",
                    line.account_code
                )));
            }
            if line.side().is_none() {
                return Err(LedgerError::InvalidEntry(format!(
                    "Line for account '{}' must carry exactly one non-zero side",
                    line.account_code
                )));
            }
        }

        if !self.is_balanced() {
            return Err(LedgerError::Unbalanced {
                debits: self.total_debits(),
                credits: self.total_credits(),
            });
        }

        Ok(())
    }

    /// Whether any line touches the given account
    pub fn touches(&self, account_code: &str) -> bool {
        self.lines.iter().any(|line| line.account_code == account_code)
    }
}

/// Trial Balance - snapshot of all account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: Option<NaiveDate>,
    pub balances: Vec<AccountBalance>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

/// Account balance information for trial balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_code: String,
    pub account_name: String,
    pub class: AccountClass,
    pub debit_balance: Option<BigDecimal>,
    pub credit_balance: Option<BigDecimal>,
}

impl AccountBalance {
    /// Get the balance amount regardless of debit/credit
    pub fn balance_amount(&self) -> BigDecimal {
        self.debit_balance
            .clone()
            .or_else(|| self.credit_balance.clone())
            .unwrap_or_else(zero)
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Entry is not balanced: debits = {debits}, credits = {credits}")]
    Unbalanced {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
    #[error("Reference {reference} already posted as entry {entry_id}")]
    AlreadyPosted { reference: String, entry_id: String },
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
