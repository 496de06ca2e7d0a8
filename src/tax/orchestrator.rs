//! Full tax computation for a profile and a period's figures

use bigdecimal::BigDecimal;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::bands::BandResult;
use super::cgt::{AssetDisposal, CgtResult};
use super::income::IncomeTaxComputation;
use super::levies::{CompanyLeviesInputs, CompanyLeviesResult};
use super::profile::{FinancialInputs, TaxComputationRequest, TaxProfile, TaxpayerType};
use super::rulebook::{RuleBookMetadata, RuleBookStore, TaxRuleBook};
use super::stamp_duty::{StampDutyResult, StampableDocument};
use super::tet::{TetInputs, TetResult};
use super::vat::{VatInputs, VatResult};
use super::wht::{WhtPayment, WhtResult};
use super::{TaxComponent, TaxEngineResult, Traced};
use crate::ledger::StatementDraft;
use crate::reconciliation::{ReconciliationReport, ReconciliationRow};
use crate::utils::decimal::zero;

/// Result of one computation request. Sub-results are `None` when the tax
/// does not apply to the request and `Unavailable` when it could not be
/// computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxResult {
    pub profile: TaxProfile,
    pub taxable_income: BigDecimal,
    /// Income tax (CIT or PIT) due
    pub total_tax_due: BigDecimal,
    pub effective_rate: BigDecimal,
    pub bands: Vec<BandResult>,
    pub income_tax: IncomeTaxComputation,
    pub vat: Option<TaxComponent<VatResult>>,
    pub wht: Option<TaxComponent<WhtResult>>,
    pub cgt: Option<TaxComponent<CgtResult>>,
    pub tet: Option<TaxComponent<TetResult>>,
    pub stamp_duty: Option<TaxComponent<StampDutyResult>>,
    pub levies: Option<TaxComponent<CompanyLeviesResult>>,
    pub reconciliation_report: ReconciliationReport,
    pub rulebook_metadata: RuleBookMetadata,
}

impl TaxResult {
    /// True when every sub-result was computed and no row degraded
    pub fn is_complete(&self) -> bool {
        let all_available = [
            self.vat.as_ref().map(TaxComponent::is_available),
            self.wht.as_ref().map(TaxComponent::is_available),
            self.cgt.as_ref().map(TaxComponent::is_available),
            self.tet.as_ref().map(TaxComponent::is_available),
            self.stamp_duty.as_ref().map(TaxComponent::is_available),
            self.levies.as_ref().map(TaxComponent::is_available),
        ]
        .into_iter()
        .flatten()
        .all(|available| available);

        all_available && self.reconciliation_report.is_clean()
    }

    /// Income tax plus every computed liability of the taxpayer.
    ///
    /// WHT is excluded: it is deducted from payees and only remitted.
    pub fn combined_liability(&self) -> BigDecimal {
        let mut total = self.total_tax_due.clone();
        if let Some(vat) = self.vat.as_ref().and_then(TaxComponent::computed) {
            total += &vat.net_vat_payable;
        }
        if let Some(cgt) = self.cgt.as_ref().and_then(TaxComponent::computed) {
            total += &cgt.total_tax;
        }
        if let Some(tet) = self.tet.as_ref().and_then(TaxComponent::computed) {
            total += &tet.tax;
        }
        if let Some(duty) = self.stamp_duty.as_ref().and_then(TaxComponent::computed) {
            total += &duty.total_duty;
        }
        if let Some(levies) = self.levies.as_ref().and_then(TaxComponent::computed) {
            total += &levies.total;
        }
        total
    }
}

/// Loads the rulebook for a request and runs every applicable calculator
#[derive(Debug, Clone)]
pub struct TaxComputationOrchestrator {
    store: Arc<RuleBookStore>,
}

impl TaxComputationOrchestrator {
    pub fn new(store: Arc<RuleBookStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RuleBookStore {
        &self.store
    }

    /// Run a full computation.
    ///
    /// Fails only on an invalid request, a missing or corrupt rulebook, or a
    /// rulebook without the income tax rules. Any other calculator that fails
    /// is reported as unavailable and the rest still run.
    pub fn compute(&self, request: &TaxComputationRequest) -> TaxEngineResult<TaxResult> {
        request.validate()?;
        let book = self.rulebook(&request.profile)?;
        let profile = &request.profile;
        let inputs = &request.inputs;

        let mut report = ReconciliationReport::new();
        let income = IncomeTaxComputation::compute(&book, profile.taxpayer_type, inputs)?;
        report.extend(income.report);
        let income_tax = income.result;

        let vat = Some(merge(
            &mut report,
            "vat",
            VatResult::compute(&book, &VatInputs::from(inputs)),
        ));
        let wht = (!inputs.wht_payments.is_empty()).then(|| {
            merge(&mut report, "wht", WhtResult::compute(&book, &inputs.wht_payments))
        });
        let cgt = (!inputs.disposals.is_empty())
            .then(|| merge(&mut report, "cgt", CgtResult::compute(&book, &inputs.disposals)));
        let stamp_duty = (!inputs.documents.is_empty()).then(|| {
            merge(
                &mut report,
                "stamp_duty",
                StampDutyResult::compute(&book, &inputs.documents),
            )
        });

        let (tet, levies) = match profile.taxpayer_type {
            TaxpayerType::Company => {
                let tet_inputs = TetInputs {
                    turnover: inputs.turnover.clone(),
                    assessable_profit: income_tax.assessable_income.clone(),
                };
                let tet = merge(&mut report, "tet", TetResult::compute(&book, &tet_inputs));
                let levy_inputs = CompanyLeviesInputs::from_financials(inputs, &income_tax.tax_due);
                let levies = merge(
                    &mut report,
                    "levies",
                    CompanyLeviesResult::compute(&book, &levy_inputs),
                );
                (Some(tet), Some(levies))
            }
            TaxpayerType::Individual => (None, None),
        };

        let result = TaxResult {
            profile: profile.clone(),
            taxable_income: income_tax.taxable_income.clone(),
            total_tax_due: income_tax.tax_due.clone(),
            effective_rate: income_tax.effective_rate(),
            bands: income_tax.bands.clone(),
            income_tax,
            vat,
            wht,
            cgt,
            tet,
            stamp_duty,
            levies,
            reconciliation_report: report,
            rulebook_metadata: book.metadata.clone(),
        };

        info!(
            "Computed {:?} tax for {} {}: income tax {}, complete: {}",
            profile.taxpayer_type,
            profile.jurisdiction,
            profile.tax_year,
            result.total_tax_due,
            result.is_complete()
        );
        Ok(result)
    }

    /// Run a full computation on the figures of a derived statement draft
    pub fn compute_from_statement(
        &self,
        profile: TaxProfile,
        statement: &StatementDraft,
    ) -> TaxEngineResult<TaxResult> {
        let inputs = FinancialInputs::from_statement(statement);
        self.compute(&TaxComputationRequest::new(profile, inputs))
    }

    pub fn compute_vat(
        &self,
        profile: &TaxProfile,
        inputs: &VatInputs,
    ) -> TaxEngineResult<Traced<VatResult>> {
        let book = self.rulebook(profile)?;
        VatResult::compute(&book, inputs)
    }

    pub fn compute_wht(
        &self,
        profile: &TaxProfile,
        payments: &[WhtPayment],
    ) -> TaxEngineResult<Traced<WhtResult>> {
        let book = self.rulebook(profile)?;
        WhtResult::compute(&book, payments)
    }

    pub fn compute_cgt(
        &self,
        profile: &TaxProfile,
        disposals: &[AssetDisposal],
    ) -> TaxEngineResult<Traced<CgtResult>> {
        let book = self.rulebook(profile)?;
        CgtResult::compute(&book, disposals)
    }

    pub fn compute_tet(
        &self,
        profile: &TaxProfile,
        inputs: &TetInputs,
    ) -> TaxEngineResult<Traced<TetResult>> {
        let book = self.rulebook(profile)?;
        TetResult::compute(&book, inputs)
    }

    pub fn compute_stamp_duty(
        &self,
        profile: &TaxProfile,
        documents: &[StampableDocument],
    ) -> TaxEngineResult<Traced<StampDutyResult>> {
        let book = self.rulebook(profile)?;
        StampDutyResult::compute(&book, documents)
    }

    pub fn compute_levies(
        &self,
        profile: &TaxProfile,
        inputs: &CompanyLeviesInputs,
    ) -> TaxEngineResult<Traced<CompanyLeviesResult>> {
        let book = self.rulebook(profile)?;
        CompanyLeviesResult::compute(&book, inputs)
    }

    fn rulebook(&self, profile: &TaxProfile) -> TaxEngineResult<Arc<TaxRuleBook>> {
        self.store.load(profile.tax_year, &profile.jurisdiction)
    }
}

/// Fold a sub-calculator outcome into the main report
fn merge<T>(
    report: &mut ReconciliationReport,
    step: &str,
    outcome: TaxEngineResult<Traced<T>>,
) -> TaxComponent<T> {
    match outcome {
        Ok(traced) => {
            report.extend(traced.report);
            TaxComponent::Computed(traced.result)
        }
        Err(err) => {
            warn!("{} unavailable: {}", step, err);
            let reason = err.to_string();
            report.flag(step, format!("{step} unavailable: {reason}"));
            report.push(
                ReconciliationRow::new(
                    format!("{step}.unavailable"),
                    format!("{step} not computed"),
                    zero(),
                )
                .notes(reason.clone()),
            );
            TaxComponent::Unavailable { reason }
        }
    }
}
