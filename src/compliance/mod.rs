//! Compliance checks over business facts
//!
//! The checker is a pure function of the facts and thresholds it is given. A
//! failed check is data, not an error: the caller decides through a
//! [`CompliancePolicy`] whether it blocks anything.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::StatementDraft;
use crate::utils::decimal::{deserialize_decimal, zero};

/// Statutory thresholds the rules compare against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceThresholds {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub vat_registration_turnover: BigDecimal,
    pub pension_min_employees: u32,
    pub itf_min_employees: u32,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub itf_turnover: BigDecimal,
    pub nsitf_min_employees: u32,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub audit_turnover: BigDecimal,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub audit_total_assets: BigDecimal,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            vat_registration_turnover: BigDecimal::from(25_000_000),
            pension_min_employees: 3,
            itf_min_employees: 5,
            itf_turnover: BigDecimal::from(50_000_000),
            nsitf_min_employees: 1,
            audit_turnover: BigDecimal::from(120_000_000),
            audit_total_assets: BigDecimal::from(60_000_000),
        }
    }
}

/// Flat facts about the business. Missing keys default to zero / false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessFacts {
    #[serde(deserialize_with = "deserialize_decimal")]
    pub turnover: BigDecimal,
    #[serde(alias = "totalAssets", deserialize_with = "deserialize_decimal")]
    pub total_assets: BigDecimal,
    #[serde(alias = "employeeCount")]
    pub employee_count: u32,
    #[serde(alias = "vatRegistered")]
    pub vat_registered: bool,
    #[serde(alias = "whtApplicablePayments", deserialize_with = "deserialize_decimal")]
    pub wht_applicable_payments: BigDecimal,
    #[serde(alias = "whtDeducted")]
    pub wht_deducted: bool,
    #[serde(alias = "pensionRegistered")]
    pub pension_registered: bool,
    #[serde(alias = "itfRegistered")]
    pub itf_registered: bool,
    #[serde(alias = "nsitfRegistered")]
    pub nsitf_registered: bool,
    #[serde(alias = "accountsAudited")]
    pub accounts_audited: bool,
}

impl Default for BusinessFacts {
    fn default() -> Self {
        Self {
            turnover: zero(),
            total_assets: zero(),
            employee_count: 0,
            vat_registered: false,
            wht_applicable_payments: zero(),
            wht_deducted: false,
            pension_registered: false,
            itf_registered: false,
            nsitf_registered: false,
            accounts_audited: false,
        }
    }
}

impl BusinessFacts {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Take turnover, assets and WHT-applicable payments from a statement
    pub fn with_statement(mut self, statement: &StatementDraft) -> Self {
        self.turnover =
            &statement.income_statement.revenue + &statement.income_statement.other_income;
        self.total_assets = statement.balance_sheet.total_assets.clone();
        self.wht_applicable_payments = statement.tax_attributes.wht_applicable_payments.clone();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCategory {
    Vat,
    Wht,
    Pension,
    Itf,
    Nsitf,
    Audit,
}

/// Outcome of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub rule_id: String,
    pub category: ComplianceCategory,
    pub passed: bool,
    /// Severity when the rule fails
    pub severity: Severity,
    pub message: String,
    pub details: Option<String>,
    pub recommendation: Option<String>,
}

impl ComplianceResult {
    fn pass(rule_id: &str, category: ComplianceCategory, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            category,
            passed: true,
            severity: Severity::Info,
            message: message.into(),
            details: None,
            recommendation: None,
        }
    }

    fn fail(
        rule_id: &str,
        category: ComplianceCategory,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            category,
            passed: false,
            severity,
            message: message.into(),
            details: None,
            recommendation: Some(recommendation.into()),
        }
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub id: Uuid,
    pub rule_id: String,
    pub severity: Severity,
    pub category: ComplianceCategory,
    pub message: String,
    pub recommendation: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ComplianceAlert {
    /// Passing rules become info alerts
    pub fn from_result(result: &ComplianceResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            rule_id: result.rule_id.clone(),
            severity: if result.passed {
                Severity::Info
            } else {
                result.severity
            },
            category: result.category,
            message: result.message.clone(),
            recommendation: result.recommendation.clone(),
            resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn resolve(&mut self) {
        if !self.resolved {
            self.resolved = true;
            self.resolved_at = Some(Utc::now());
        }
    }

    pub fn is_open(&self) -> bool {
        !self.resolved
    }
}

type Rule = fn(&BusinessFacts, &ComplianceThresholds) -> ComplianceResult;

/// Runs the fixed compliance rule list
#[derive(Debug, Clone, Default)]
pub struct ComplianceChecker {
    thresholds: ComplianceThresholds,
}

impl ComplianceChecker {
    const RULES: [Rule; 6] = [
        vat_registration,
        wht_deduction,
        pension_contribution,
        itf_contribution,
        nsitf_contribution,
        statutory_audit,
    ];

    pub fn new(thresholds: ComplianceThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ComplianceThresholds {
        &self.thresholds
    }

    /// One result per rule, in rule order
    pub fn check(&self, facts: &BusinessFacts) -> Vec<ComplianceResult> {
        let results: Vec<ComplianceResult> = Self::RULES
            .iter()
            .map(|rule| rule(facts, &self.thresholds))
            .collect();
        debug!(
            "Compliance check: {} of {} rules passed",
            results.iter().filter(|result| result.passed).count(),
            results.len()
        );
        results
    }

    /// One alert per rule
    pub fn alerts(&self, facts: &BusinessFacts) -> Vec<ComplianceAlert> {
        self.check(facts)
            .iter()
            .map(ComplianceAlert::from_result)
            .collect()
    }
}

fn vat_registration(facts: &BusinessFacts, thresholds: &ComplianceThresholds) -> ComplianceResult {
    const ID: &str = "vat_registration";
    let above = facts.turnover >= thresholds.vat_registration_turnover;
    match (above, facts.vat_registered) {
        (true, false) => ComplianceResult::fail(
            ID,
            ComplianceCategory::Vat,
            Severity::Error,
            "Turnover is at or above the VAT registration threshold but the business is not registered",
            "Register for VAT and start charging output VAT",
        )
        .details(format!(
            "turnover {} against threshold {}",
            facts.turnover, thresholds.vat_registration_turnover
        )),
        (_, true) => ComplianceResult::pass(ID, ComplianceCategory::Vat, "Registered for VAT"),
        (false, false) => ComplianceResult::pass(
            ID,
            ComplianceCategory::Vat,
            "Turnover is below the VAT registration threshold",
        ),
    }
}

fn wht_deduction(facts: &BusinessFacts, _: &ComplianceThresholds) -> ComplianceResult {
    const ID: &str = "wht_deduction";
    if facts.wht_applicable_payments > zero() && !facts.wht_deducted {
        ComplianceResult::fail(
            ID,
            ComplianceCategory::Wht,
            Severity::Warning,
            "Payments subject to withholding tax were made without deduction",
            "Deduct WHT at source and remit it by the statutory deadline",
        )
        .details(format!(
            "WHT-applicable payments {}",
            facts.wht_applicable_payments
        ))
    } else {
        ComplianceResult::pass(ID, ComplianceCategory::Wht, "No undeducted WHT payments")
    }
}

fn pension_contribution(
    facts: &BusinessFacts,
    thresholds: &ComplianceThresholds,
) -> ComplianceResult {
    const ID: &str = "pension_contribution";
    if facts.employee_count >= thresholds.pension_min_employees && !facts.pension_registered {
        ComplianceResult::fail(
            ID,
            ComplianceCategory::Pension,
            Severity::Error,
            format!(
                "{} employees and no contributory pension scheme",
                facts.employee_count
            ),
            "Register employees with a pension fund administrator and remit contributions",
        )
    } else {
        ComplianceResult::pass(ID, ComplianceCategory::Pension, "Pension obligations met")
    }
}

fn itf_contribution(facts: &BusinessFacts, thresholds: &ComplianceThresholds) -> ComplianceResult {
    const ID: &str = "itf_contribution";
    let liable = facts.employee_count >= thresholds.itf_min_employees
        || facts.turnover >= thresholds.itf_turnover;
    if liable && !facts.itf_registered {
        ComplianceResult::fail(
            ID,
            ComplianceCategory::Itf,
            Severity::Warning,
            "Business is liable to the Industrial Training Fund levy but is not registered",
            "Register with the ITF and pay 1% of annual payroll",
        )
    } else {
        ComplianceResult::pass(ID, ComplianceCategory::Itf, "ITF obligations met")
    }
}

fn nsitf_contribution(
    facts: &BusinessFacts,
    thresholds: &ComplianceThresholds,
) -> ComplianceResult {
    const ID: &str = "nsitf_contribution";
    if facts.employee_count >= thresholds.nsitf_min_employees && !facts.nsitf_registered {
        ComplianceResult::fail(
            ID,
            ComplianceCategory::Nsitf,
            Severity::Warning,
            "Employer is not registered with the NSITF",
            "Register with the NSITF and contribute 1% of monthly payroll",
        )
    } else {
        ComplianceResult::pass(ID, ComplianceCategory::Nsitf, "NSITF obligations met")
    }
}

fn statutory_audit(facts: &BusinessFacts, thresholds: &ComplianceThresholds) -> ComplianceResult {
    const ID: &str = "statutory_audit";
    let required = facts.turnover > thresholds.audit_turnover
        || facts.total_assets > thresholds.audit_total_assets;
    match (required, facts.accounts_audited) {
        (true, false) => ComplianceResult::fail(
            ID,
            ComplianceCategory::Audit,
            Severity::Error,
            "Annual accounts must be audited at this size",
            "Engage an external auditor before filing",
        )
        .details(format!(
            "turnover {}, total assets {}",
            facts.turnover, facts.total_assets
        )),
        (false, _) => ComplianceResult::pass(
            ID,
            ComplianceCategory::Audit,
            "Small company, exempt from statutory audit",
        ),
        (true, true) => {
            ComplianceResult::pass(ID, ComplianceCategory::Audit, "Accounts are audited")
        }
    }
}

/// How the caller treats open alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompliancePolicy {
    /// Open errors block
    Strict,
    #[default]
    Advisory,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Proceed,
    ProceedWithWarnings(Vec<String>),
    Blocked(Vec<String>),
}

impl CompliancePolicy {
    pub fn evaluate(&self, alerts: &[ComplianceAlert]) -> PolicyOutcome {
        if *self == CompliancePolicy::Off {
            return PolicyOutcome::Proceed;
        }

        let open = |severity: Severity| -> Vec<String> {
            alerts
                .iter()
                .filter(|alert| alert.is_open() && alert.severity == severity)
                .map(|alert| format!("{}: {}", alert.rule_id, alert.message))
                .collect()
        };
        let errors = open(Severity::Error);
        let warnings = open(Severity::Warning);

        match self {
            CompliancePolicy::Strict if !errors.is_empty() => PolicyOutcome::Blocked(errors),
            _ => {
                let mut messages = errors;
                messages.extend(warnings);
                if messages.is_empty() {
                    PolicyOutcome::Proceed
                } else {
                    PolicyOutcome::ProceedWithWarnings(messages)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result<'a>(results: &'a [ComplianceResult], id: &str) -> &'a ComplianceResult {
        results.iter().find(|result| result.rule_id == id).unwrap()
    }

    #[test]
    fn test_small_sole_business_passes() {
        let facts = BusinessFacts {
            turnover: BigDecimal::from(5_000_000),
            ..BusinessFacts::default()
        };
        let results = ComplianceChecker::default().check(&facts);
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|result| result.passed));
    }

    #[test]
    fn test_growing_business_flags() {
        let facts = BusinessFacts {
            turnover: BigDecimal::from(130_000_000),
            employee_count: 6,
            wht_applicable_payments: BigDecimal::from(1_000_000),
            ..BusinessFacts::default()
        };
        let results = ComplianceChecker::default().check(&facts);

        let vat = result(&results, "vat_registration");
        assert!(!vat.passed);
        assert_eq!(vat.severity, Severity::Error);
        assert!(vat.recommendation.is_some());
        assert!(!result(&results, "wht_deduction").passed);
        assert!(!result(&results, "pension_contribution").passed);
        assert!(!result(&results, "itf_contribution").passed);
        assert!(!result(&results, "nsitf_contribution").passed);
        assert!(!result(&results, "statutory_audit").passed);
    }

    #[test]
    fn test_itf_by_turnover_alone() {
        let facts = BusinessFacts {
            turnover: BigDecimal::from(60_000_000),
            vat_registered: true,
            ..BusinessFacts::default()
        };
        let results = ComplianceChecker::default().check(&facts);
        assert!(!result(&results, "itf_contribution").passed);
        assert!(result(&results, "pension_contribution").passed);
    }

    #[test]
    fn test_facts_from_camel_case_map() {
        let facts = BusinessFacts::from_json_str(
            r#"{"turnover": 30000000, "employeeCount": 2, "vatRegistered": true}"#,
        )
        .unwrap();
        assert_eq!(facts.employee_count, 2);
        assert!(facts.vat_registered);
        assert!(!facts.itf_registered);
    }

    #[test]
    fn test_policy_outcomes() {
        let facts = BusinessFacts {
            turnover: BigDecimal::from(30_000_000),
            employee_count: 1,
            ..BusinessFacts::default()
        };
        let mut alerts = ComplianceChecker::default().alerts(&facts);
        assert_eq!(alerts.len(), 6);

        assert!(matches!(
            CompliancePolicy::Strict.evaluate(&alerts),
            PolicyOutcome::Blocked(_)
        ));
        assert!(matches!(
            CompliancePolicy::Advisory.evaluate(&alerts),
            PolicyOutcome::ProceedWithWarnings(_)
        ));
        assert_eq!(CompliancePolicy::Off.evaluate(&alerts), PolicyOutcome::Proceed);

        // resolving the VAT error leaves only the NSITF warning
        for alert in alerts.iter_mut().filter(|alert| alert.severity == Severity::Error) {
            alert.resolve();
        }
        assert!(alerts.iter().any(|alert| alert.resolved_at.is_some()));
        match CompliancePolicy::Strict.evaluate(&alerts) {
            PolicyOutcome::ProceedWithWarnings(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].starts_with("nsitf_contribution"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_thresholds_from_config_json() {
        let thresholds: ComplianceThresholds =
            serde_json::from_str(r#"{"vat_registration_turnover": "50000000"}"#).unwrap();
        assert_eq!(thresholds.vat_registration_turnover, BigDecimal::from(50_000_000));
        assert_eq!(thresholds.pension_min_employees, 3);
    }
}
