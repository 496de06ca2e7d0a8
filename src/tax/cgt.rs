//! Capital gains tax on asset disposals

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{FieldError, TaxEngineResult, Traced};
use crate::utils::decimal::{deserialize_decimal, round_currency, zero};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDisposal {
    pub description: String,
    #[serde(default)]
    pub disposal_date: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub proceeds: BigDecimal,
    /// Acquisition cost plus improvements
    #[serde(deserialize_with = "deserialize_decimal")]
    pub cost: BigDecimal,
    #[serde(default = "zero", deserialize_with = "deserialize_decimal")]
    pub disposal_costs: BigDecimal,
    /// Exempt disposals (e.g. principal residence, government securities)
    #[serde(default)]
    pub exempt: bool,
}

impl AssetDisposal {
    pub fn new(description: impl Into<String>, proceeds: BigDecimal, cost: BigDecimal) -> Self {
        Self {
            description: description.into(),
            disposal_date: None,
            proceeds,
            cost,
            disposal_costs: zero(),
            exempt: false,
        }
    }

    pub fn gain(&self) -> BigDecimal {
        &self.proceeds - &self.cost - &self.disposal_costs
    }

    pub(crate) fn field_errors(&self, prefix: &str) -> Vec<FieldError> {
        [
            ("proceeds", &self.proceeds),
            ("cost", &self.cost),
            ("disposal_costs", &self.disposal_costs),
        ]
        .iter()
        .filter(|(_, value)| **value < zero())
        .map(|(field, _)| FieldError::new(format!("{prefix}.{field}"), "must not be negative"))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposalResult {
    pub description: String,
    /// Negative for a loss
    pub gain: BigDecimal,
    pub chargeable_gain: BigDecimal,
    pub tax: BigDecimal,
    pub exempt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CgtResult {
    pub rate: BigDecimal,
    pub disposals: Vec<DisposalResult>,
    pub total_chargeable_gain: BigDecimal,
    /// Losses are reported but never offset against gains
    pub total_losses: BigDecimal,
    pub total_tax: BigDecimal,
}

impl CgtResult {
    pub fn compute(
        book: &TaxRuleBook,
        disposals: &[AssetDisposal],
    ) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "cgt");
        let rate = ctx.evaluate("cgt_rate", "rate", "CGT rate")?;

        let mut results = Vec::with_capacity(disposals.len());
        let mut total_losses = zero();

        for (index, disposal) in disposals.iter().enumerate() {
            let step = format!("disposal.{}", index + 1);
            let gain = disposal.gain();

            let (chargeable_gain, note) = if disposal.exempt {
                (zero(), Some("exempt disposal"))
            } else if gain < zero() {
                total_losses += zero() - &gain;
                (zero(), Some("capital loss, not offset against gains"))
            } else {
                (gain.clone(), None)
            };
            let tax = round_currency(&(&chargeable_gain * &rate));

            let label = format!("Chargeable gain: {}", disposal.description);
            match note {
                Some(note) => ctx.note(&format!("{step}.gain"), &label, chargeable_gain.clone(), note),
                None => ctx.derived(
                    &format!("{step}.gain"),
                    &label,
                    chargeable_gain.clone(),
                    "proceeds - cost - disposal_costs",
                ),
            }
            ctx.derived(&format!("{step}.tax"), "CGT", tax.clone(), "chargeable_gain * rate");

            results.push(DisposalResult {
                description: disposal.description.clone(),
                gain,
                chargeable_gain,
                tax,
                exempt: disposal.exempt,
            });
        }

        let total_chargeable_gain: BigDecimal =
            results.iter().map(|result| &result.chargeable_gain).sum();
        let total_tax: BigDecimal = results.iter().map(|result| &result.tax).sum();
        ctx.derived("total_tax", "Total CGT", total_tax.clone(), "sum of disposal tax");

        let result = Self {
            rate,
            disposals: results,
            total_chargeable_gain,
            total_losses,
            total_tax,
        };
        Ok(Traced::new(result, ctx.into_report()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::rulebook::RuleBookStore;

    #[test]
    fn test_gains_taxed_losses_not_offset() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let mut exempt = AssetDisposal::new(
            "Treasury bills",
            BigDecimal::from(1_000_000),
            BigDecimal::from(900_000),
        );
        exempt.exempt = true;
        let mut land = AssetDisposal::new(
            "Plot of land",
            BigDecimal::from(5_000_000),
            BigDecimal::from(3_000_000),
        );
        land.disposal_costs = BigDecimal::from(200_000);

        let disposals = vec![
            land,
            AssetDisposal::new("Old van", BigDecimal::from(400_000), BigDecimal::from(900_000)),
            exempt,
        ];

        let traced = CgtResult::compute(&book, &disposals).unwrap();
        let result = &traced.result;
        assert_eq!(result.disposals[0].chargeable_gain, BigDecimal::from(1_800_000));
        assert_eq!(result.disposals[0].tax, BigDecimal::from(180_000));
        assert_eq!(result.disposals[1].gain, BigDecimal::from(-500_000));
        assert_eq!(result.disposals[1].tax, zero());
        assert_eq!(result.disposals[2].tax, zero());
        assert_eq!(result.total_losses, BigDecimal::from(500_000));
        assert_eq!(result.total_tax, BigDecimal::from(180_000));
        assert!(traced.report.find("cgt.disposal.2.gain").unwrap().notes.is_some());
    }

    #[test]
    fn test_negative_amounts_reported() {
        let disposal = AssetDisposal::new("Bad", BigDecimal::from(-1), BigDecimal::from(0));
        let errors = disposal.field_errors("disposals[0]");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "disposals[0].proceeds");
    }
}
