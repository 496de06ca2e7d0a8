//! Who is being taxed and on what figures

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::cgt::AssetDisposal;
use super::stamp_duty::StampableDocument;
use super::wht::WhtPayment;
use super::{FieldError, TaxEngineResult, TaxError};
use crate::ledger::StatementDraft;
use crate::utils::decimal::{deserialize_decimal, zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxpayerType {
    Company,
    Individual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxProfile {
    pub taxpayer_type: TaxpayerType,
    pub tax_year: i32,
    pub jurisdiction: String,
}

impl TaxProfile {
    pub fn company(tax_year: i32, jurisdiction: impl Into<String>) -> Self {
        Self {
            taxpayer_type: TaxpayerType::Company,
            tax_year,
            jurisdiction: jurisdiction.into(),
        }
    }

    pub fn individual(tax_year: i32, jurisdiction: impl Into<String>) -> Self {
        Self {
            taxpayer_type: TaxpayerType::Individual,
            tax_year,
            jurisdiction: jurisdiction.into(),
        }
    }
}

/// Financial figures for one tax period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialInputs {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub turnover: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub other_income: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub cost_of_sales: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub operating_expenses: BigDecimal,
    /// Part of operating expenses that is added back for tax
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub non_deductible_expenses: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub capital_allowances: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub pension_contributions: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub vatable_sales: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub vatable_purchases: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub vat_credit_brought_forward: BigDecimal,
    /// Whether the company is in a sector liable to the NASENI levy
    #[serde(default)]
    pub naseni_applicable: bool,
    #[serde(default)]
    pub wht_payments: Vec<WhtPayment>,
    #[serde(default)]
    pub disposals: Vec<AssetDisposal>,
    #[serde(default)]
    pub documents: Vec<StampableDocument>,
}

impl FinancialInputs {
    pub fn new(turnover: BigDecimal) -> Self {
        Self {
            turnover,
            other_income: zero(),
            cost_of_sales: zero(),
            operating_expenses: zero(),
            non_deductible_expenses: zero(),
            capital_allowances: zero(),
            pension_contributions: zero(),
            vatable_sales: zero(),
            vatable_purchases: zero(),
            vat_credit_brought_forward: zero(),
            naseni_applicable: false,
            wht_payments: Vec::new(),
            disposals: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Figures taken from a derived statement draft
    pub fn from_statement(statement: &StatementDraft) -> Self {
        let income = &statement.income_statement;
        let attributes = &statement.tax_attributes;
        Self {
            other_income: income.other_income.clone(),
            cost_of_sales: income.cost_of_sales.clone(),
            operating_expenses: income.operating_expenses.clone(),
            non_deductible_expenses: attributes.non_deductible_expenses.clone(),
            vatable_sales: attributes.vatable_revenue.clone(),
            vatable_purchases: attributes.vatable_purchases.clone(),
            ..Self::new(income.revenue.clone())
        }
    }

    pub fn profit_before_tax(&self) -> BigDecimal {
        &self.turnover + &self.other_income - &self.cost_of_sales - &self.operating_expenses
    }

    /// Field-level problems with the figures
    pub fn field_errors(&self) -> Vec<FieldError> {
        let amounts = [
            ("turnover", &self.turnover),
            ("other_income", &self.other_income),
            ("cost_of_sales", &self.cost_of_sales),
            ("operating_expenses", &self.operating_expenses),
            ("non_deductible_expenses", &self.non_deductible_expenses),
            ("capital_allowances", &self.capital_allowances),
            ("pension_contributions", &self.pension_contributions),
            ("vatable_sales", &self.vatable_sales),
            ("vatable_purchases", &self.vatable_purchases),
            ("vat_credit_brought_forward", &self.vat_credit_brought_forward),
        ];

        let mut errors: Vec<FieldError> = amounts
            .iter()
            .filter(|(_, value)| **value < zero())
            .map(|(field, _)| FieldError::new(*field, "must not be negative"))
            .collect();

        if self.non_deductible_expenses > self.operating_expenses {
            errors.push(FieldError::new(
                "non_deductible_expenses",
                "cannot exceed operating_expenses",
            ));
        }
        for (index, payment) in self.wht_payments.iter().enumerate() {
            if payment.gross_amount < zero() {
                errors.push(FieldError::new(
                    format!("wht_payments[{index}].gross_amount"),
                    "must not be negative",
                ));
            }
        }
        for (index, disposal) in self.disposals.iter().enumerate() {
            errors.extend(disposal.field_errors(&format!("disposals[{index}]")));
        }
        for (index, document) in self.documents.iter().enumerate() {
            if document.amount < zero() {
                errors.push(FieldError::new(
                    format!("documents[{index}].amount"),
                    "must not be negative",
                ));
            }
        }
        errors
    }
}

/// A full computation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputationRequest {
    pub profile: TaxProfile,
    pub inputs: FinancialInputs,
}

impl TaxComputationRequest {
    pub fn new(profile: TaxProfile, inputs: FinancialInputs) -> Self {
        Self { profile, inputs }
    }

    /// Reject malformed requests before any rulebook is loaded
    pub fn validate(&self) -> TaxEngineResult<()> {
        let mut errors = Vec::new();
        if self.profile.jurisdiction.trim().is_empty() {
            errors.push(FieldError::new("profile.jurisdiction", "must not be empty"));
        }
        if !(1900..=2100).contains(&self.profile.tax_year) {
            errors.push(FieldError::new("profile.tax_year", "out of range"));
        }
        errors.extend(self.inputs.field_errors());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TaxError::Validation(errors))
        }
    }
}
