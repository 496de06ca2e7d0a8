//! Stamp duty on instruments and electronic transfers

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::rules::RuleContext;
use super::rulebook::TaxRuleBook;
use super::{TaxEngineResult, Traced};
use crate::utils::decimal::{deserialize_decimal, zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Flat duty above the transfer threshold
    ElectronicTransfer,
    Receipt,
    Lease,
    Conveyance,
    ShareCapital,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::ElectronicTransfer => "electronic_transfer",
            DocumentKind::Receipt => "receipt",
            DocumentKind::Lease => "lease",
            DocumentKind::Conveyance => "conveyance",
            DocumentKind::ShareCapital => "share_capital",
        }
    }

    pub fn rule_key(&self) -> String {
        format!("stamp_duty_{}", self.as_str())
    }

    fn has_transfer_threshold(&self) -> bool {
        matches!(self, DocumentKind::ElectronicTransfer | DocumentKind::Receipt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampableDocument {
    pub kind: DocumentKind,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: BigDecimal,
    #[serde(default)]
    pub description: Option<String>,
}

impl StampableDocument {
    pub fn new(kind: DocumentKind, amount: BigDecimal) -> Self {
        Self {
            kind,
            amount,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampDutyLine {
    pub kind: DocumentKind,
    pub amount: BigDecimal,
    pub duty: BigDecimal,
    /// Below the threshold for its kind
    pub below_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampDutyResult {
    pub lines: Vec<StampDutyLine>,
    pub total_duty: BigDecimal,
}

impl StampDutyResult {
    /// Duty per document. Each document's rule sees its value as `amount`.
    pub fn compute(
        book: &TaxRuleBook,
        documents: &[StampableDocument],
    ) -> TaxEngineResult<Traced<Self>> {
        let mut ctx = RuleContext::new(book, "stamp_duty");
        let needs_threshold = documents
            .iter()
            .any(|document| document.kind.has_transfer_threshold());
        let threshold = if needs_threshold {
            Some(ctx.evaluate(
                "stamp_duty_transfer_threshold",
                "transfer_threshold",
                "Electronic transfer threshold",
            )?)
        } else {
            None
        };

        let mut lines = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let step = format!("{}.{}", index + 1, document.kind.as_str());
            let below_threshold = match &threshold {
                Some(threshold) if document.kind.has_transfer_threshold() => {
                    document.amount < *threshold
                }
                _ => false,
            };

            let duty = if below_threshold {
                ctx.note(
                    &step,
                    &format!("Stamp duty on {}", document.kind.as_str()),
                    zero(),
                    "below transfer threshold",
                );
                zero()
            } else {
                ctx.set("amount", document.amount.clone());
                ctx.evaluate_as(
                    &document.kind.rule_key(),
                    "duty",
                    &step,
                    &format!("Stamp duty on {}", document.kind.as_str()),
                )?
            };

            lines.push(StampDutyLine {
                kind: document.kind,
                amount: document.amount.clone(),
                duty,
                below_threshold,
            });
        }

        let total_duty: BigDecimal = lines.iter().map(|line| &line.duty).sum();
        ctx.derived("total", "Total stamp duty", total_duty.clone(), "sum of duty");

        Ok(Traced::new(Self { lines, total_duty }, ctx.into_report()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::rulebook::RuleBookStore;
    use std::str::FromStr;

    #[test]
    fn test_duty_per_document() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let documents = vec![
            StampableDocument::new(DocumentKind::ElectronicTransfer, BigDecimal::from(50_000)),
            StampableDocument::new(DocumentKind::ElectronicTransfer, BigDecimal::from(9_999)),
            StampableDocument::new(DocumentKind::Lease, BigDecimal::from(1_000_000)),
        ];

        let traced = StampDutyResult::compute(&book, &documents).unwrap();
        let lines = &traced.result.lines;
        assert_eq!(lines[0].duty, BigDecimal::from(50));
        assert!(lines[1].below_threshold);
        assert_eq!(lines[1].duty, zero());
        assert_eq!(lines[2].duty, BigDecimal::from(7_800));
        assert_eq!(
            traced.result.total_duty,
            BigDecimal::from_str("7850").unwrap()
        );
        assert_eq!(
            traced.report.find("stamp_duty.3.lease").and_then(|r| r.citation.as_deref()),
            Some("SDA-SCH")
        );
    }

    #[test]
    fn test_no_documents() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        let traced = StampDutyResult::compute(&book, &[]).unwrap();
        assert_eq!(traced.result.total_duty, zero());
    }
}
