//! Chart of accounts: static registry of account codes and their tax attributes

use bigdecimal::BigDecimal;
use std::collections::HashMap;

use crate::types::*;

/// Account codes the engine relies on by default
pub mod codes {
    pub const CASH_ON_HAND: &str = "1000";
    pub const BANK: &str = "1020";
    pub const ACCOUNTS_RECEIVABLE: &str = "1100";
    pub const VAT_INPUT: &str = "1300";
    pub const PROPERTY_PLANT_EQUIPMENT: &str = "1500";
    pub const ACCOUNTS_PAYABLE: &str = "2000";
    pub const VAT_OUTPUT: &str = "2100";
    pub const WHT_PAYABLE: &str = "2110";
    pub const PAYE_PAYABLE: &str = "2120";
    pub const INCOME_TAX_PAYABLE: &str = "2300";
    pub const LOANS_PAYABLE: &str = "2500";
    pub const OWNERS_CAPITAL: &str = "3000";
    pub const RETAINED_EARNINGS: &str = "3100";
    pub const DRAWINGS: &str = "3200";
    pub const SALES_REVENUE: &str = "4000";
    pub const SERVICE_REVENUE: &str = "4100";
    pub const INTEREST_INCOME: &str = "4200";
    pub const OTHER_INCOME: &str = "4900";
    pub const COST_OF_SALES: &str = "5000";
    pub const SALARIES: &str = "5500";
    pub const PENSION: &str = "5510";
    pub const RENT: &str = "5600";
    pub const UTILITIES: &str = "5700";
    pub const TELECOM: &str = "5710";
    pub const TRANSPORT: &str = "5800";
    pub const BANK_CHARGES: &str = "5900";
    pub const PROFESSIONAL_FEES: &str = "6000";
    pub const MARKETING: &str = "6200";
    pub const DEPRECIATION: &str = "6500";
    pub const FINES_PENALTIES: &str = "6800";
    pub const DONATIONS: &str = "6900";
    pub const OTHER_EXPENSES: &str = "6990";
}

/// Read-only lookup of accounts by code, class and subclass
#[derive(Debug, Clone)]
pub struct ChartOfAccounts {
    accounts: Vec<Account>,
    index: HashMap<String, usize>,
}

impl ChartOfAccounts {
    /// Build a chart from a list of accounts, rejecting duplicate codes
    pub fn from_accounts(accounts: Vec<Account>) -> LedgerResult<Self> {
        let mut index = HashMap::with_capacity(accounts.len());
        for (position, account) in accounts.iter().enumerate() {
            if account.code.trim().is_empty() {
                return Err(LedgerError::Validation(
                    "Account code cannot be empty".to_string(),
                ));
            }
            if index.insert(account.code.clone(), position).is_some() {
                return Err(LedgerError::Validation(format!(
                    "Account code '{}' appears more than once in the chart",
                    account.code
                )));
            }
        }
        Ok(Self { accounts, index })
    }

    /// Standard chart of accounts for a small business
    pub fn standard() -> LedgerResult<Self> {
        use codes::*;
        use AccountClass::*;
        use AccountSubclass as Sub;

        let rate = |percent: i64| BigDecimal::from(percent) / BigDecimal::from(100);

        let accounts = vec![
            // Assets
            Account::new(CASH_ON_HAND, "Cash on Hand", Asset, Sub::Cash),
            Account::new(BANK, "Bank - Current Account", Asset, Sub::Cash),
            Account::new(ACCOUNTS_RECEIVABLE, "Accounts Receivable", Asset, Sub::CurrentAsset),
            Account::new("1200", "Inventory", Asset, Sub::CurrentAsset),
            Account::new(VAT_INPUT, "VAT Input Recoverable", Asset, Sub::CurrentAsset),
            Account::new("1310", "WHT Credit Notes", Asset, Sub::CurrentAsset),
            Account::new(
                PROPERTY_PLANT_EQUIPMENT,
                "Property, Plant and Equipment",
                Asset,
                Sub::NonCurrentAsset,
            )
            .vatable(),
            // Liabilities
            Account::new(ACCOUNTS_PAYABLE, "Accounts Payable", Liability, Sub::CurrentLiability),
            Account::new(VAT_OUTPUT, "VAT Output Payable", Liability, Sub::CurrentLiability),
            Account::new(WHT_PAYABLE, "WHT Payable", Liability, Sub::CurrentLiability),
            Account::new(PAYE_PAYABLE, "PAYE Payable", Liability, Sub::CurrentLiability),
            Account::new("2130", "Pension Payable", Liability, Sub::CurrentLiability),
            Account::new(
                INCOME_TAX_PAYABLE,
                "Income Tax Payable",
                Liability,
                Sub::CurrentLiability,
            ),
            Account::new(LOANS_PAYABLE, "Loans Payable", Liability, Sub::NonCurrentLiability),
            // Equity
            Account::new(OWNERS_CAPITAL, "Owner's Capital", Equity, Sub::Capital),
            Account::new(RETAINED_EARNINGS, "Retained Earnings", Equity, Sub::RetainedEarnings),
            Account::new(DRAWINGS, "Owner's Drawings", Equity, Sub::Drawings),
            // Revenue
            Account::new(SALES_REVENUE, "Sales Revenue", Revenue, Sub::OperatingRevenue).vatable(),
            Account::new(SERVICE_REVENUE, "Service Revenue", Revenue, Sub::OperatingRevenue)
                .vatable(),
            Account::new(INTEREST_INCOME, "Interest Income", Revenue, Sub::OtherIncome),
            Account::new(OTHER_INCOME, "Other Income", Revenue, Sub::OtherIncome),
            // Expenses
            Account::new(COST_OF_SALES, "Cost of Sales", Expense, Sub::CostOfSales)
                .vatable()
                .with_wht(rate(5)),
            Account::new(SALARIES, "Salaries and Wages", Expense, Sub::OperatingExpense),
            Account::new(PENSION, "Pension Contributions", Expense, Sub::OperatingExpense),
            Account::new(RENT, "Rent", Expense, Sub::OperatingExpense).with_wht(rate(10)),
            Account::new(UTILITIES, "Utilities", Expense, Sub::OperatingExpense).vatable(),
            Account::new(TELECOM, "Telephone and Internet", Expense, Sub::OperatingExpense)
                .vatable(),
            Account::new(TRANSPORT, "Transport and Fuel", Expense, Sub::OperatingExpense),
            Account::new(BANK_CHARGES, "Bank Charges", Expense, Sub::OperatingExpense),
            Account::new(
                PROFESSIONAL_FEES,
                "Professional Fees",
                Expense,
                Sub::OperatingExpense,
            )
            .vatable()
            .with_wht(rate(10)),
            Account::new(MARKETING, "Advertising and Marketing", Expense, Sub::OperatingExpense)
                .vatable(),
            Account::new(DEPRECIATION, "Depreciation", Expense, Sub::OperatingExpense)
                .non_deductible(),
            Account::new(FINES_PENALTIES, "Fines and Penalties", Expense, Sub::OperatingExpense)
                .non_deductible(),
            Account::new(DONATIONS, "Donations", Expense, Sub::OperatingExpense).non_deductible(),
            Account::new(OTHER_EXPENSES, "Other Expenses", Expense, Sub::OperatingExpense),
        ];

        Self::from_accounts(accounts)
    }

    /// Look up an account by code
    pub fn get(&self, code: &str) -> Option<&Account> {
        self.index.get(code).map(|&position| &self.accounts[position])
    }

    /// Look up an account by code, failing with `UnknownAccount`
    pub fn require(&self, code: &str) -> LedgerResult<&Account> {
        self.get(code)
            .ok_or_else(|| LedgerError::UnknownAccount(code.to_string()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Accounts of one class, in chart order
    pub fn by_class(&self, class: AccountClass) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.class == class)
            .collect()
    }

    /// Accounts of one subclass, in chart order
    pub fn by_subclass(&self, subclass: AccountSubclass) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.subclass == subclass)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
