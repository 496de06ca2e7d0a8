//! Value Added Tax

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::profile::FinancialInputs;
use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{FieldError, TaxEngineResult, TaxError, Traced};
use crate::utils::decimal::{non_negative, round_currency, zero};

/// VAT on a single amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatCalculation {
    /// Amount before VAT
    pub base_amount: BigDecimal,
    /// Rate as a fraction, e.g. 0.075
    pub rate: BigDecimal,
    pub vat_amount: BigDecimal,
    /// Amount including VAT
    pub total_amount: BigDecimal,
}

impl VatCalculation {
    /// VAT on top of a net amount
    pub fn exclusive(base_amount: BigDecimal, rate: BigDecimal) -> TaxEngineResult<Self> {
        validate_rate(&rate)?;

        let vat_amount = round_currency(&(&base_amount * &rate));
        let total_amount = &base_amount + &vat_amount;

        Ok(Self {
            base_amount,
            rate,
            vat_amount,
            total_amount,
        })
    }

    /// Split a VAT-inclusive amount into base and VAT.
    ///
    /// The base is derived by subtraction so the two parts always add back to
    /// the original total.
    pub fn inclusive(total_amount: BigDecimal, rate: BigDecimal) -> TaxEngineResult<Self> {
        validate_rate(&rate)?;

        let divisor = BigDecimal::from(1) + &rate;
        let base_amount = round_currency(&(&total_amount / &divisor));
        let vat_amount = &total_amount - &base_amount;

        Ok(Self {
            base_amount,
            rate,
            vat_amount,
            total_amount,
        })
    }
}

fn validate_rate(rate: &BigDecimal) -> TaxEngineResult<()> {
    if *rate < zero() || *rate >= BigDecimal::from(1) {
        return Err(TaxError::Validation(vec![FieldError::new(
            "rate",
            format!("VAT rate {rate} must be a fraction in [0, 1)"),
        )]));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatInputs {
    pub vatable_sales: BigDecimal,
    pub vatable_purchases: BigDecimal,
    pub credit_brought_forward: BigDecimal,
}

impl From<&FinancialInputs> for VatInputs {
    fn from(inputs: &FinancialInputs) -> Self {
        Self {
            vatable_sales: inputs.vatable_sales.clone(),
            vatable_purchases: inputs.vatable_purchases.clone(),
            credit_brought_forward: inputs.vat_credit_brought_forward.clone(),
        }
    }
}

/// VAT return for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatResult {
    pub rate: BigDecimal,
    pub output_vat: BigDecimal,
    pub input_vat: BigDecimal,
    pub credit_brought_forward: BigDecimal,
    /// Amount to remit, never negative
    pub net_vat_payable: BigDecimal,
    /// Excess input VAT carried to the next period
    pub credit_carried_forward: BigDecimal,
}

impl VatResult {
    /// Output VAT on sales less input VAT on purchases and any credit carried
    /// in from the previous period
    pub fn compute(book: &TaxRuleBook, inputs: &VatInputs) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "vat");
        ctx.input("vatable_sales", "Vatable sales", inputs.vatable_sales.clone());
        ctx.input(
            "vatable_purchases",
            "Vatable purchases",
            inputs.vatable_purchases.clone(),
        );
        let rate = ctx.evaluate("vat_rate", "rate", "VAT rate")?;

        let output_vat = round_currency(&(&inputs.vatable_sales * &rate));
        ctx.derived("output_vat", "Output VAT", output_vat.clone(), "vatable_sales * rate");

        let input_vat = round_currency(&(&inputs.vatable_purchases * &rate));
        ctx.derived("input_vat", "Input VAT", input_vat.clone(), "vatable_purchases * rate");

        let credit_brought_forward = inputs.credit_brought_forward.clone();
        if credit_brought_forward > zero() {
            ctx.input(
                "credit_brought_forward",
                "Credit brought forward",
                credit_brought_forward.clone(),
            );
        }

        let position = &output_vat - &input_vat - &credit_brought_forward;
        let net_vat_payable = non_negative(position.clone());
        let credit_carried_forward = non_negative(zero() - position);

        ctx.derived(
            "net_payable",
            "Net VAT payable",
            net_vat_payable.clone(),
            "max(output_vat - input_vat - credit_brought_forward, 0)",
        );
        if credit_carried_forward > zero() {
            ctx.note(
                "credit_carried_forward",
                "Credit carried forward",
                credit_carried_forward.clone(),
                "input VAT exceeds output VAT",
            );
        }

        let result = Self {
            rate,
            output_vat,
            input_vat,
            credit_brought_forward,
            net_vat_payable,
            credit_carried_forward,
        };
        Ok(Traced::new(result, ctx.into_report()))
    }
}
