//! Statement derivation: draft income statement, balance sheet and cash flow
//!
//! Statements are pure aggregations over posted entries. They are recomputed on
//! demand and never stored as authoritative records.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ledger::chart::ChartOfAccounts;
use crate::ledger::engine::JournalEngine;
use crate::traits::LedgerStorage;
use crate::types::*;
use crate::utils::decimal::zero;

/// Normal-side total of one account over the period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTotal {
    pub account_code: String,
    pub account_name: String,
    pub class: AccountClass,
    pub subclass: AccountSubclass,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IncomeStatementDraft {
    /// Operating revenue
    pub revenue: BigDecimal,
    pub other_income: BigDecimal,
    pub cost_of_sales: BigDecimal,
    pub gross_profit: BigDecimal,
    pub operating_expenses: BigDecimal,
    pub net_profit: BigDecimal,
    pub lines: Vec<AccountTotal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceSheetDraft {
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    /// Equity accounts plus accumulated earnings not yet closed
    pub total_equity: BigDecimal,
    pub accumulated_earnings: BigDecimal,
    pub is_balanced: bool,
    pub lines: Vec<AccountTotal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CashFlowDraft {
    pub operating: BigDecimal,
    pub investing: BigDecimal,
    pub financing: BigDecimal,
    pub net_change: BigDecimal,
}

/// Period aggregates the tax engine consumes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxAttributes {
    pub vatable_revenue: BigDecimal,
    pub vatable_purchases: BigDecimal,
    pub non_deductible_expenses: BigDecimal,
    pub wht_applicable_payments: BigDecimal,
    pub capital_expenditure: BigDecimal,
}

/// Draft financial statements for a period
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatementDraft {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub entry_count: usize,
    pub income_statement: IncomeStatementDraft,
    pub balance_sheet: BalanceSheetDraft,
    pub cash_flow: CashFlowDraft,
    pub tax_attributes: TaxAttributes,
}

/// Cash-flow section a counter account falls into
fn cash_flow_section(subclass: AccountSubclass) -> Option<CashFlowSection> {
    use AccountSubclass::*;
    match subclass {
        Cash => None,
        OperatingRevenue | OtherIncome | CostOfSales | OperatingExpense | CurrentAsset
        | CurrentLiability => Some(CashFlowSection::Operating),
        NonCurrentAsset => Some(CashFlowSection::Investing),
        NonCurrentLiability | Capital | RetainedEarnings | Drawings => {
            Some(CashFlowSection::Financing)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CashFlowSection {
    Operating,
    Investing,
    Financing,
}

/// Aggregates posted journal entries into statement drafts
pub struct StatementDeriver<'a> {
    chart: &'a ChartOfAccounts,
}

impl<'a> StatementDeriver<'a> {
    pub fn new(chart: &'a ChartOfAccounts) -> Self {
        Self { chart }
    }

    /// Derive statements for `[start, end]`. The balance sheet is cumulative up
    /// to `end`; the income statement and cash flow cover the period only.
    pub fn derive(
        &self,
        entries: &[JournalEntry],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<StatementDraft> {
        let posted: Vec<&JournalEntry> = entries
            .iter()
            .filter(|entry| entry.posted)
            .filter(|entry| end.is_none_or(|end| entry.date <= end))
            .collect();
        let in_period: Vec<&JournalEntry> = posted
            .iter()
            .copied()
            .filter(|entry| start.is_none_or(|start| entry.date >= start))
            .collect();

        let period_totals = self.totals(&in_period)?;
        let cumulative_totals = self.totals(&posted)?;

        let income_statement = self.income_statement(&period_totals);
        let balance_sheet = self.balance_sheet(&cumulative_totals);
        let cash_flow = self.cash_flow(&in_period)?;
        let tax_attributes = self.tax_attributes(&in_period)?;

        Ok(StatementDraft {
            period_start: start,
            period_end: end,
            entry_count: in_period.len(),
            income_statement,
            balance_sheet,
            cash_flow,
            tax_attributes,
        })
    }

    /// Normal-side totals per account, in chart order
    fn totals(&self, entries: &[&JournalEntry]) -> LedgerResult<Vec<AccountTotal>> {
        let mut movements: HashMap<&str, BigDecimal> = HashMap::new();
        for entry in entries {
            for line in &entry.lines {
                let account = self.chart.require(&line.account_code)?;
                if let Some((side, amount)) = line.side() {
                    *movements.entry(account.code.as_str()).or_insert_with(zero) +=
                        account.balance_effect(side, amount);
                }
            }
        }

        Ok(self
            .chart
            .iter()
            .filter_map(|account| {
                movements.remove(account.code.as_str()).map(|amount| AccountTotal {
                    account_code: account.code.clone(),
                    account_name: account.name.clone(),
                    class: account.class,
                    subclass: account.subclass,
                    amount,
                })
            })
            .collect())
    }

    fn income_statement(&self, totals: &[AccountTotal]) -> IncomeStatementDraft {
        let sum = |subclass: AccountSubclass| -> BigDecimal {
            totals
                .iter()
                .filter(|total| total.subclass == subclass)
                .map(|total| &total.amount)
                .sum()
        };

        let revenue = sum(AccountSubclass::OperatingRevenue);
        let other_income = sum(AccountSubclass::OtherIncome);
        let cost_of_sales = sum(AccountSubclass::CostOfSales);
        let operating_expenses = sum(AccountSubclass::OperatingExpense);
        let gross_profit = &revenue - &cost_of_sales;
        let net_profit = &gross_profit + &other_income - &operating_expenses;

        IncomeStatementDraft {
            revenue,
            other_income,
            cost_of_sales,
            gross_profit,
            operating_expenses,
            net_profit,
            lines: totals
                .iter()
                .filter(|total| {
                    matches!(total.class, AccountClass::Revenue | AccountClass::Expense)
                })
                .cloned()
                .collect(),
        }
    }

    fn balance_sheet(&self, totals: &[AccountTotal]) -> BalanceSheetDraft {
        let sum = |class: AccountClass| -> BigDecimal {
            totals
                .iter()
                .filter(|total| total.class == class)
                .map(|total| &total.amount)
                .sum()
        };

        let total_assets = sum(AccountClass::Asset);
        let total_liabilities = sum(AccountClass::Liability);
        let accumulated_earnings = sum(AccountClass::Revenue) - sum(AccountClass::Expense);
        let total_equity = sum(AccountClass::Equity) + &accumulated_earnings;
        let is_balanced = total_assets == &total_liabilities + &total_equity;

        BalanceSheetDraft {
            total_assets,
            total_liabilities,
            total_equity,
            accumulated_earnings,
            is_balanced,
            lines: totals
                .iter()
                .filter(|total| {
                    matches!(
                        total.class,
                        AccountClass::Asset | AccountClass::Liability | AccountClass::Equity
                    )
                })
                .cloned()
                .collect(),
        }
    }

    /// Each non-cash line of an entry that moves cash contributes
    /// `credit - debit` to the section of its account. Over a balanced entry
    /// these contributions sum to the net cash movement.
    fn cash_flow(&self, entries: &[&JournalEntry]) -> LedgerResult<CashFlowDraft> {
        let mut operating = zero();
        let mut investing = zero();
        let mut financing = zero();

        for entry in entries {
            let mut moves_cash = false;
            for line in &entry.lines {
                if self.chart.require(&line.account_code)?.subclass == AccountSubclass::Cash {
                    moves_cash = true;
                }
            }
            if !moves_cash {
                continue;
            }

            for line in &entry.lines {
                let account = self.chart.require(&line.account_code)?;
                let contribution = &line.credit - &line.debit;
                match cash_flow_section(account.subclass) {
                    Some(CashFlowSection::Operating) => operating += contribution,
                    Some(CashFlowSection::Investing) => investing += contribution,
                    Some(CashFlowSection::Financing) => financing += contribution,
                    None => {}
                }
            }
        }

        let net_change = &operating + &investing + &financing;
        Ok(CashFlowDraft {
            operating,
            investing,
            financing,
            net_change,
        })
    }

    fn tax_attributes(&self, entries: &[&JournalEntry]) -> LedgerResult<TaxAttributes> {
        let mut attributes = TaxAttributes {
            vatable_revenue: zero(),
            vatable_purchases: zero(),
            non_deductible_expenses: zero(),
            wht_applicable_payments: zero(),
            capital_expenditure: zero(),
        };

        for entry in entries {
            for line in &entry.lines {
                let account = self.chart.require(&line.account_code)?;
                let Some((side, amount)) = line.side() else {
                    continue;
                };
                let effect = account.balance_effect(side, amount);

                match account.class {
                    AccountClass::Revenue if account.vat_applicable => {
                        attributes.vatable_revenue += effect;
                    }
                    AccountClass::Expense => {
                        if account.vat_applicable {
                            attributes.vatable_purchases += &effect;
                        }
                        if !account.tax_deductible {
                            attributes.non_deductible_expenses += &effect;
                        }
                        if account.wht_applicable {
                            attributes.wht_applicable_payments += &effect;
                        }
                    }
                    AccountClass::Asset if account.subclass == AccountSubclass::NonCurrentAsset => {
                        if account.vat_applicable {
                            attributes.vatable_purchases += &effect;
                        }
                        attributes.capital_expenditure += effect;
                    }
                    _ => {}
                }
            }
        }

        Ok(attributes)
    }
}

impl<S: LedgerStorage> JournalEngine<S> {
    /// Derive statements from the current ledger state
    pub fn derive_statements(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<StatementDraft> {
        let entries = self.storage().list_entries(None, end)?;
        StatementDeriver::new(self.chart()).derive(&entries, start, end)
    }
}
