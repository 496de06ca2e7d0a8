//! Tertiary education tax

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{TaxEngineResult, Traced};
use crate::utils::decimal::{non_negative, round_currency, zero};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TetInputs {
    pub turnover: BigDecimal,
    pub assessable_profit: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TetResult {
    pub assessable_profit: BigDecimal,
    pub rate: BigDecimal,
    /// Small companies are exempt
    pub exempt: bool,
    pub tax: BigDecimal,
}

impl TetResult {
    /// Education tax on assessable profit, for companies above the
    /// small-company turnover
    pub fn compute(book: &TaxRuleBook, inputs: &TetInputs) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "tet");
        ctx.input("turnover", "Turnover", inputs.turnover.clone());
        ctx.input(
            "assessable_profit",
            "Assessable profit",
            inputs.assessable_profit.clone(),
        );

        let exempt = if ctx.has_rule("small_company_turnover") {
            let threshold = ctx.evaluate(
                "small_company_turnover",
                "small_company_turnover",
                "Small company turnover",
            )?;
            inputs.turnover <= threshold
        } else {
            false
        };

        let rate = ctx.evaluate("tet_rate", "rate", "TET rate")?;
        let base = non_negative(inputs.assessable_profit.clone());
        let tax = if exempt {
            ctx.note("tax", "Tertiary education tax", zero(), "small company, exempt");
            zero()
        } else {
            let tax = round_currency(&(&base * &rate));
            ctx.derived(
                "tax",
                "Tertiary education tax",
                tax.clone(),
                "max(assessable_profit, 0) * rate",
            );
            tax
        };

        let result = Self {
            assessable_profit: inputs.assessable_profit.clone(),
            rate,
            exempt,
            tax,
        };
        Ok(Traced::new(result, ctx.into_report()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::rulebook::RuleBookStore;

    #[test]
    fn test_tet_on_assessable_profit() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let traced = TetResult::compute(
            &book,
            &TetInputs {
                turnover: BigDecimal::from(200_000_000),
                assessable_profit: BigDecimal::from(40_000_000),
            },
        )
        .unwrap();
        assert!(!traced.result.exempt);
        assert_eq!(traced.result.tax, BigDecimal::from(1_200_000));
    }

    #[test]
    fn test_small_company_exempt() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let traced = TetResult::compute(
            &book,
            &TetInputs {
                turnover: BigDecimal::from(20_000_000),
                assessable_profit: BigDecimal::from(5_000_000),
            },
        )
        .unwrap();
        assert!(traced.result.exempt);
        assert_eq!(traced.result.tax, zero());
    }

    #[test]
    fn test_loss_gives_no_tax() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let traced = TetResult::compute(
            &book,
            &TetInputs {
                turnover: BigDecimal::from(90_000_000),
                assessable_profit: BigDecimal::from(-3_000_000),
            },
        )
        .unwrap();
        assert_eq!(traced.result.tax, zero());
    }
}
