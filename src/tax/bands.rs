//! Progressive band apportionment

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{TaxEngineResult, TaxError};
use crate::reconciliation::ReconciliationRow;
use crate::utils::decimal::{decimal_from_json, deserialize_decimal, non_negative, zero};

/// Width of a band. The top band may be open-ended, but only if it says so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandWidth {
    Finite(BigDecimal),
    Unbounded,
}

impl BandWidth {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, BandWidth::Unbounded)
    }
}

impl Serialize for BandWidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BandWidth::Finite(width) => width.serialize(serializer),
            BandWidth::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for BandWidth {
    /// Accepts a number or decimal string, or `null` / `"unbounded"` for an
    /// open top band
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Null => Ok(BandWidth::Unbounded),
            serde_json::Value::String(text)
                if text.eq_ignore_ascii_case("unbounded") || text.eq_ignore_ascii_case("infinity") =>
            {
                Ok(BandWidth::Unbounded)
            }
            other => decimal_from_json(other).map(BandWidth::Finite).ok_or_else(|| {
                serde::de::Error::custom(format!("expected a band width, found {other}"))
            }),
        }
    }
}

/// One tier of a progressive schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBand {
    pub label: String,
    /// Band width, not the cumulative upper bound
    pub threshold: BandWidth,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub rate: BigDecimal,
}

impl TaxBand {
    pub fn finite(label: impl Into<String>, width: BigDecimal, rate: BigDecimal) -> Self {
        Self {
            label: label.into(),
            threshold: BandWidth::Finite(width),
            rate,
        }
    }

    pub fn unbounded(label: impl Into<String>, rate: BigDecimal) -> Self {
        Self {
            label: label.into(),
            threshold: BandWidth::Unbounded,
            rate,
        }
    }
}

/// Contribution of one band to the total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandResult {
    pub label: String,
    pub rate: BigDecimal,
    pub amount_in_band: BigDecimal,
    pub tax: BigDecimal,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandComputation {
    pub base_amount: BigDecimal,
    pub total_tax: BigDecimal,
    /// Bands actually touched, lowest first
    pub bands: Vec<BandResult>,
}

impl BandComputation {
    /// One reconciliation row per touched band
    pub fn reconciliation_rows(
        &self,
        step_prefix: &str,
        rule_key: &str,
        citation: Option<&str>,
    ) -> Vec<ReconciliationRow> {
        self.bands
            .iter()
            .enumerate()
            .map(|(index, band)| {
                let row = ReconciliationRow::new(
                    format!("{step_prefix}.band.{}", index + 1),
                    band.label.clone(),
                    band.tax.clone(),
                )
                .formula(format!("{} * {}", band.amount_in_band, band.rate))
                .rule(rule_key, citation.map(str::to_string));
                match &band.note {
                    Some(note) => row.notes(note.clone()),
                    None => row,
                }
            })
            .collect()
    }
}

/// Apportions a base amount across an ordered band schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressiveBandCalculator {
    bands: Vec<TaxBand>,
}

impl ProgressiveBandCalculator {
    /// Validate and wrap a band schedule.
    ///
    /// Rejects an empty schedule, non-positive widths, negative rates and an
    /// unbounded band anywhere but last.
    pub fn new(bands: Vec<TaxBand>) -> TaxEngineResult<Self> {
        if bands.is_empty() {
            return Err(TaxError::Band("band schedule is empty".to_string()));
        }

        let last = bands.len() - 1;
        for (index, band) in bands.iter().enumerate() {
            if band.rate < zero() {
                return Err(TaxError::Band(format!(
                    "band '{}' has a negative rate",
                    band.label
                )));
            }
            match &band.threshold {
                BandWidth::Unbounded if index != last => {
                    return Err(TaxError::Band(format!(
                        "band '{}' is unbounded but is not the last band",
                        band.label
                    )));
                }
                BandWidth::Finite(width) if *width <= zero() => {
                    return Err(TaxError::Band(format!(
                        "band '{}' has a non-positive width",
                        band.label
                    )));
                }
                _ => {}
            }
        }

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[TaxBand] {
        &self.bands
    }

    /// Apportion `amount` across the bands.
    ///
    /// A negative amount is treated as zero. When the schedule's last band is
    /// finite and some amount remains, the excess is taxed at the last band's
    /// rate and the band result carries a note saying so.
    pub fn calculate(&self, amount: &BigDecimal) -> BandComputation {
        let base_amount = non_negative(amount.clone());
        let mut remaining = base_amount.clone();
        let mut total_tax = zero();
        let mut results = Vec::new();

        let last = self.bands.len() - 1;
        for (index, band) in self.bands.iter().enumerate() {
            if remaining <= zero() {
                break;
            }

            let (amount_in_band, note) = match &band.threshold {
                BandWidth::Unbounded => (remaining.clone(), None),
                BandWidth::Finite(width) if index == last && remaining > *width => (
                    remaining.clone(),
                    Some(format!(
                        "{} above the last band width of {} taxed at the last band rate",
                        &remaining - width,
                        width
                    )),
                ),
                BandWidth::Finite(width) => (remaining.clone().min(width.clone()), None),
            };

            let tax = &amount_in_band * &band.rate;
            total_tax += &tax;
            remaining -= &amount_in_band;

            results.push(BandResult {
                label: band.label.clone(),
                rate: band.rate.clone(),
                amount_in_band,
                tax,
                note,
            });
        }

        BandComputation {
            base_amount,
            total_tax,
            bands: results,
        }
    }
}
