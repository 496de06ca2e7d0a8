//! Statutory company levies: NITDA, Police Trust Fund and NASENI

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::profile::FinancialInputs;
use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{TaxEngineResult, Traced};
use crate::utils::decimal::zero;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyLeviesInputs {
    pub turnover: BigDecimal,
    pub profit_before_tax: BigDecimal,
    /// Profit after income tax
    pub net_profit: BigDecimal,
    pub naseni_applicable: bool,
}

impl CompanyLeviesInputs {
    /// Levy inputs from the period figures and the income tax already due
    pub fn from_financials(inputs: &FinancialInputs, income_tax: &BigDecimal) -> Self {
        let profit_before_tax = inputs.profit_before_tax();
        Self {
            turnover: inputs.turnover.clone(),
            net_profit: &profit_before_tax - income_tax,
            profit_before_tax,
            naseni_applicable: inputs.naseni_applicable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyLeviesResult {
    pub nitda: BigDecimal,
    pub police_trust_fund: BigDecimal,
    pub naseni: BigDecimal,
    pub total: BigDecimal,
}

impl CompanyLeviesResult {
    pub fn compute(
        book: &TaxRuleBook,
        inputs: &CompanyLeviesInputs,
    ) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "levies");
        ctx.input("turnover", "Turnover", inputs.turnover.clone());
        ctx.input(
            "profit_before_tax",
            "Profit before tax",
            inputs.profit_before_tax.clone(),
        );
        ctx.input("net_profit", "Net profit", inputs.net_profit.clone());

        let nitda_threshold = ctx.evaluate(
            "levy_nitda_turnover_threshold",
            "nitda_threshold",
            "NITDA turnover threshold",
        )?;
        let nitda = if inputs.turnover >= nitda_threshold {
            ctx.evaluate("levy_nitda", "nitda", "NITDA levy")?
        } else {
            ctx.note("nitda", "NITDA levy", zero(), "turnover below threshold");
            zero()
        };

        let police_trust_fund =
            ctx.evaluate("levy_police_trust_fund", "police_trust_fund", "Police Trust Fund levy")?;

        let naseni = if inputs.naseni_applicable {
            ctx.evaluate("levy_naseni", "naseni", "NASENI levy")?
        } else {
            ctx.note("naseni", "NASENI levy", zero(), "sector not liable");
            zero()
        };

        let total = &nitda + &police_trust_fund + &naseni;
        ctx.derived(
            "total",
            "Total levies",
            total.clone(),
            "nitda + police_trust_fund + naseni",
        );

        let result = Self {
            nitda,
            police_trust_fund,
            naseni,
            total,
        };
        Ok(Traced::new(result, ctx.into_report()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::rulebook::RuleBookStore;

    #[test]
    fn test_levies_above_nitda_threshold() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let inputs = CompanyLeviesInputs {
            turnover: BigDecimal::from(150_000_000),
            profit_before_tax: BigDecimal::from(20_000_000),
            net_profit: BigDecimal::from(14_000_000),
            naseni_applicable: true,
        };

        let traced = CompanyLeviesResult::compute(&book, &inputs).unwrap();
        assert_eq!(traced.result.nitda, BigDecimal::from(200_000));
        assert_eq!(traced.result.police_trust_fund, BigDecimal::from(700));
        assert_eq!(traced.result.naseni, BigDecimal::from(50_000));
        assert_eq!(traced.result.total, BigDecimal::from(250_700));
    }

    #[test]
    fn test_small_turnover_skips_nitda() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let inputs = CompanyLeviesInputs {
            turnover: BigDecimal::from(10_000_000),
            profit_before_tax: BigDecimal::from(-1_000_000),
            net_profit: BigDecimal::from(-1_000_000),
            naseni_applicable: false,
        };

        let traced = CompanyLeviesResult::compute(&book, &inputs).unwrap();
        assert_eq!(traced.result.nitda, zero());
        // loss is capped at zero by the rule
        assert_eq!(traced.result.police_trust_fund, zero());
        assert_eq!(traced.result.total, zero());
        assert!(traced.report.find("levies.nitda").unwrap().notes.is_some());
    }
}
