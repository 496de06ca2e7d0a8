//! Withholding tax deducted at source on payments

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{TaxEngineResult, Traced};
use crate::utils::decimal::{deserialize_decimal, round_currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhtKind {
    Rent,
    Dividend,
    Interest,
    Royalty,
    ProfessionalFees,
    Commission,
    Contracts,
    DirectorsFees,
}

impl WhtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhtKind::Rent => "rent",
            WhtKind::Dividend => "dividend",
            WhtKind::Interest => "interest",
            WhtKind::Royalty => "royalty",
            WhtKind::ProfessionalFees => "professional_fees",
            WhtKind::Commission => "commission",
            WhtKind::Contracts => "contracts",
            WhtKind::DirectorsFees => "directors_fees",
        }
    }

    pub fn rule_key(&self) -> String {
        format!("wht_{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayeeType {
    Company,
    Individual,
}

/// A payment from which tax must be withheld
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhtPayment {
    pub kind: WhtKind,
    pub payee: PayeeType,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub gross_amount: BigDecimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl WhtPayment {
    pub fn new(kind: WhtKind, payee: PayeeType, gross_amount: BigDecimal) -> Self {
        Self {
            kind,
            payee,
            gross_amount,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhtLine {
    pub kind: WhtKind,
    pub payee: PayeeType,
    pub gross_amount: BigDecimal,
    pub rate: BigDecimal,
    pub tax_withheld: BigDecimal,
    /// Amount actually paid to the payee
    pub net_amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhtResult {
    pub lines: Vec<WhtLine>,
    pub total_gross: BigDecimal,
    pub total_withheld: BigDecimal,
    pub total_net: BigDecimal,
}

impl WhtResult {
    /// Withholding on each payment at the rate for its kind and payee.
    ///
    /// An individual payee uses `wht_<kind>_individual` when the rulebook has
    /// it, otherwise the general `wht_<kind>` rate.
    pub fn compute(book: &TaxRuleBook, payments: &[WhtPayment]) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "wht");
        let mut lines = Vec::with_capacity(payments.len());

        for (index, payment) in payments.iter().enumerate() {
            let step = format!("{}.{}", index + 1, payment.kind.as_str());
            let general = payment.kind.rule_key();
            let individual = format!("{general}_individual");
            let key = match payment.payee {
                PayeeType::Individual if ctx.has_rule(&individual) => individual,
                _ => general,
            };

            ctx.input(
                &format!("gross_{}", index + 1),
                &format!("Gross {} payment", payment.kind.as_str()),
                payment.gross_amount.clone(),
            );
            let rate = ctx.evaluate_as(&key, "rate", &format!("{step}.rate"), "WHT rate")?;
            let tax_withheld = round_currency(&(&payment.gross_amount * &rate));
            ctx.derived(
                &format!("{step}.withheld"),
                "Tax withheld",
                tax_withheld.clone(),
                "gross_amount * rate",
            );

            lines.push(WhtLine {
                kind: payment.kind,
                payee: payment.payee,
                gross_amount: payment.gross_amount.clone(),
                net_amount: &payment.gross_amount - &tax_withheld,
                rate,
                tax_withheld,
            });
        }

        let total_gross: BigDecimal = lines.iter().map(|line| &line.gross_amount).sum();
        let total_withheld: BigDecimal = lines.iter().map(|line| &line.tax_withheld).sum();
        let total_net = &total_gross - &total_withheld;
        ctx.derived(
            "total_withheld",
            "Total WHT withheld",
            total_withheld.clone(),
            "sum of tax withheld",
        );

        let result = Self {
            lines,
            total_gross,
            total_withheld,
            total_net,
        };
        Ok(Traced::new(result, ctx.into_report()))
    }
}
