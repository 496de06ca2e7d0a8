//! Company income tax and personal income tax

use bigdecimal::BigDecimal;
use log::debug;
use serde::{Deserialize, Serialize};

use super::bands::BandResult;
use super::profile::{FinancialInputs, TaxpayerType};
use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{TaxEngineResult, Traced};
use crate::utils::decimal::{round_currency, zero};

/// Income tax for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxComputation {
    pub taxpayer_type: TaxpayerType,
    /// Assessable profit for a company, gross income for an individual
    pub assessable_income: BigDecimal,
    pub taxable_income: BigDecimal,
    pub band_tax: BigDecimal,
    /// `None` when no minimum tax applies
    pub minimum_tax: Option<BigDecimal>,
    pub minimum_tax_applied: bool,
    pub tax_due: BigDecimal,
    pub bands: Vec<BandResult>,
}

impl IncomeTaxComputation {
    pub fn compute(
        book: &TaxRuleBook,
        taxpayer_type: TaxpayerType,
        inputs: &FinancialInputs,
    ) -> TaxEngineResult<Traced<Self>> {
        match taxpayer_type {
            TaxpayerType::Company => Self::company(book, inputs),
            TaxpayerType::Individual => Self::individual(book, inputs),
        }
    }

    /// Company income tax: band tax on taxable profit, floored by the minimum
    /// tax for companies above the small-company turnover
    pub fn company(book: &TaxRuleBook, inputs: &FinancialInputs) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "cit");
        bind_inputs(&mut ctx, inputs);
        ctx.input(
            "capital_allowances",
            "Capital allowances",
            inputs.capital_allowances.clone(),
        );

        let assessable_profit =
            ctx.evaluate("cit_assessable_profit", "assessable_profit", "Assessable profit")?;
        let taxable_profit =
            ctx.evaluate("cit_taxable_profit", "taxable_profit", "Taxable profit")?;

        let computation = ctx.bands("cit_bands", &taxable_profit)?;
        let band_tax = round_currency(&computation.total_tax);
        ctx.derived("band_tax", "Tax from bands", band_tax.clone(), "sum of band tax");

        let minimum_tax = if ctx.has_rule("cit_minimum_tax") {
            let small_company = ctx.has_rule("small_company_turnover")
                && inputs.turnover
                    <= ctx.evaluate(
                        "small_company_turnover",
                        "small_company_turnover",
                        "Small company turnover",
                    )?;
            if small_company {
                ctx.note(
                    "minimum_tax",
                    "Minimum tax",
                    zero(),
                    "small company, minimum tax does not apply",
                );
                None
            } else {
                Some(ctx.evaluate("cit_minimum_tax", "minimum_tax", "Minimum tax")?)
            }
        } else {
            None
        };

        Ok(finish(
            ctx,
            TaxpayerType::Company,
            assessable_profit,
            taxable_profit,
            band_tax,
            minimum_tax,
            computation.bands,
        ))
    }

    /// Personal income tax on business income after the consolidated relief
    /// allowance and pension contributions
    pub fn individual(
        book: &TaxRuleBook,
        inputs: &FinancialInputs,
    ) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "pit");
        bind_inputs(&mut ctx, inputs);
        ctx.input(
            "pension_contributions",
            "Pension contributions",
            inputs.pension_contributions.clone(),
        );

        let gross_income = ctx.evaluate("pit_gross_income", "gross_income", "Gross income")?;
        ctx.evaluate(
            "pit_consolidated_relief",
            "consolidated_relief",
            "Consolidated relief allowance",
        )?;
        ctx.evaluate("pit_pension_relief", "pension_relief", "Pension relief")?;
        let taxable_income =
            ctx.evaluate("pit_taxable_income", "taxable_income", "Taxable income")?;

        let computation = ctx.bands("pit_bands", &taxable_income)?;
        let band_tax = round_currency(&computation.total_tax);
        ctx.derived("band_tax", "Tax from bands", band_tax.clone(), "sum of band tax");

        let minimum_tax = if ctx.has_rule("pit_minimum_tax") && gross_income > zero() {
            Some(ctx.evaluate("pit_minimum_tax", "minimum_tax", "Minimum tax")?)
        } else {
            None
        };

        Ok(finish(
            ctx,
            TaxpayerType::Individual,
            gross_income,
            taxable_income,
            band_tax,
            minimum_tax,
            computation.bands,
        ))
    }

    /// Tax due as a fraction of taxable income, zero when nothing is taxable
    pub fn effective_rate(&self) -> BigDecimal {
        if self.taxable_income <= zero() {
            return zero();
        }
        (&self.tax_due / &self.taxable_income).with_scale_round(4, bigdecimal::RoundingMode::HalfUp)
    }
}

fn bind_inputs(ctx: &mut RuleContext<'_>, inputs: &FinancialInputs) {
    ctx.input("turnover", "Turnover", inputs.turnover.clone());
    ctx.input("other_income", "Other income", inputs.other_income.clone());
    ctx.input("cost_of_sales", "Cost of sales", inputs.cost_of_sales.clone());
    ctx.input(
        "operating_expenses",
        "Operating expenses",
        inputs.operating_expenses.clone(),
    );
    ctx.input(
        "non_deductible_expenses",
        "Non-deductible expenses",
        inputs.non_deductible_expenses.clone(),
    );
}

fn finish(
    mut ctx: RuleContext<'_>,
    taxpayer_type: TaxpayerType,
    assessable_income: BigDecimal,
    taxable_income: BigDecimal,
    band_tax: BigDecimal,
    minimum_tax: Option<BigDecimal>,
    bands: Vec<BandResult>,
) -> Traced<IncomeTaxComputation> {
    let (tax_due, minimum_tax_applied) = match &minimum_tax {
        Some(minimum) if *minimum > band_tax => (minimum.clone(), true),
        _ => (band_tax.clone(), false),
    };

    if minimum_tax_applied {
        ctx.note(
            "tax_due",
            "Income tax due",
            tax_due.clone(),
            "minimum tax exceeds tax from bands",
        );
    } else {
        ctx.derived(
            "tax_due",
            "Income tax due",
            tax_due.clone(),
            "max(band_tax, minimum_tax)",
        );
    }
    debug!(
        "{:?} income tax: taxable {} due {} (minimum applied: {})",
        taxpayer_type, taxable_income, tax_due, minimum_tax_applied
    );

    let computation = IncomeTaxComputation {
        taxpayer_type,
        assessable_income,
        taxable_income,
        band_tax,
        minimum_tax,
        minimum_tax_applied,
        tax_due,
        bands,
    };
    Traced::new(computation, ctx.into_report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::rulebook::RuleBookStore;

    fn book() -> std::sync::Arc<TaxRuleBook> {
        RuleBookStore::builtin().load(2025, "NG").unwrap()
    }

    #[test]
    fn test_company_band_tax() {
        let inputs = FinancialInputs {
            cost_of_sales: BigDecimal::from(60_000_000),
            operating_expenses: BigDecimal::from(60_000_000),
            non_deductible_expenses: BigDecimal::from(5_000_000),
            capital_allowances: BigDecimal::from(5_000_000),
            ..FinancialInputs::new(BigDecimal::from(200_000_000))
        };

        let traced = IncomeTaxComputation::company(&book(), &inputs).unwrap();
        let result = &traced.result;
        // 200M - 120M + 5M add-back = 85M; less 5M allowances = 80M
        assert_eq!(result.assessable_income, BigDecimal::from(85_000_000));
        assert_eq!(result.taxable_income, BigDecimal::from(80_000_000));
        // 25M at 0 + 55M at 20%
        assert_eq!(result.band_tax, BigDecimal::from(11_000_000));
        assert_eq!(result.minimum_tax, Some(BigDecimal::from(1_000_000)));
        assert!(!result.minimum_tax_applied);
        assert_eq!(result.tax_due, BigDecimal::from(11_000_000));
        assert_eq!(
            result.effective_rate(),
            crate::utils::decimal::parse_decimal("0.1375").unwrap()
        );
    }

    #[test]
    fn test_company_minimum_tax_applies_on_loss() {
        let inputs = FinancialInputs {
            operating_expenses: BigDecimal::from(120_000_000),
            ..FinancialInputs::new(BigDecimal::from(100_000_000))
        };

        let traced = IncomeTaxComputation::company(&book(), &inputs).unwrap();
        assert_eq!(traced.result.taxable_income, zero());
        assert!(traced.result.minimum_tax_applied);
        assert_eq!(traced.result.tax_due, BigDecimal::from(500_000));
        assert!(traced.report.find("cit.tax_due").unwrap().notes.is_some());
    }

    #[test]
    fn test_small_company_has_no_minimum_tax() {
        let inputs = FinancialInputs {
            operating_expenses: BigDecimal::from(150_000),
            ..FinancialInputs::new(BigDecimal::from(500_000))
        };

        let traced = IncomeTaxComputation::company(&book(), &inputs).unwrap();
        assert_eq!(traced.result.minimum_tax, None);
        assert_eq!(traced.result.tax_due, zero());
        assert_eq!(traced.result.bands.len(), 1);
    }

    #[test]
    fn test_individual_reliefs_and_bands() {
        let inputs = FinancialInputs {
            operating_expenses: BigDecimal::from(1_000_000),
            pension_contributions: BigDecimal::from(200_000),
            ..FinancialInputs::new(BigDecimal::from(4_000_000))
        };

        let traced = IncomeTaxComputation::individual(&book(), &inputs).unwrap();
        let result = &traced.result;
        // gross 3M; relief 200k + 600k; pension 200k; taxable 2M
        assert_eq!(result.assessable_income, BigDecimal::from(3_000_000));
        assert_eq!(result.taxable_income, BigDecimal::from(2_000_000));
        // 21k + 33k + 75k + 95k + 400k * 0.21 (84k)
        assert_eq!(result.band_tax, BigDecimal::from(308_000));
        assert!(!result.minimum_tax_applied);
        assert_eq!(
            traced
                .report
                .find("pit.consolidated_relief")
                .and_then(|row| row.citation.as_deref()),
            Some("PITA-S33")
        );
    }

    #[test]
    fn test_individual_minimum_tax_when_reliefs_cover_income() {
        let inputs = FinancialInputs::new(BigDecimal::from(240_000));
        let traced = IncomeTaxComputation::individual(&book(), &inputs).unwrap();
        assert_eq!(traced.result.taxable_income, zero());
        assert!(traced.result.minimum_tax_applied);
        assert_eq!(traced.result.tax_due, BigDecimal::from(2_400));
    }
}
