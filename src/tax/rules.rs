//! Evaluation of rulebook rules into reconciliation rows

use bigdecimal::BigDecimal;
use log::warn;

use super::bands::BandComputation;
use super::formula::{FormulaEvaluator, Variables};
use super::rulebook::{RuleType, TaxRule, TaxRuleBook};
use super::{TaxEngineResult, TaxError};
use crate::reconciliation::{ReconciliationReport, ReconciliationRow};
use crate::utils::decimal::zero;

/// Working state for one calculator: the rulebook, the variables bound so far
/// and the rows recorded so far. Every evaluated rule binds its result as a
/// variable so later formulas can refer to it.
pub struct RuleContext<'a> {
    book: &'a TaxRuleBook,
    evaluator: FormulaEvaluator,
    variables: Variables,
    step_prefix: String,
    report: ReconciliationReport,
}

impl<'a> RuleContext<'a> {
    pub fn new(book: &'a TaxRuleBook, step_prefix: impl Into<String>) -> Self {
        Self {
            book,
            evaluator: FormulaEvaluator::new(),
            variables: Variables::new(),
            step_prefix: step_prefix.into(),
            report: ReconciliationReport::new(),
        }
    }

    pub fn book(&self) -> &TaxRuleBook {
        self.book
    }

    /// Bind a variable without recording a row
    pub fn set(&mut self, name: &str, value: BigDecimal) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&BigDecimal> {
        self.variables.get(name)
    }

    /// Bind an input figure and record it
    pub fn input(&mut self, name: &str, label: &str, value: BigDecimal) {
        self.record(ReconciliationRow::new(
            self.step_id(&format!("input.{name}")),
            label,
            value.clone(),
        ));
        self.set(name, value);
    }

    pub fn has_rule(&self, key: &str) -> bool {
        self.book.rule(key).is_some()
    }

    pub fn citation_of(&self, key: &str) -> Option<String> {
        self.book.rule(key).and_then(|rule| rule.citation.clone())
    }

    /// Evaluate rule `key`, bind the result to `bind` and record a row under
    /// the step of the same name
    pub fn evaluate(&mut self, key: &str, bind: &str, label: &str) -> TaxEngineResult<BigDecimal> {
        self.evaluate_as(key, bind, bind, label)
    }

    /// Evaluate rule `key` under an explicit step name.
    ///
    /// A missing rule, or one that is not a formula rule, is a configuration
    /// error. A formula that fails to evaluate degrades to zero: the row is
    /// kept, annotated and flagged as an issue on the report.
    pub fn evaluate_as(
        &mut self,
        key: &str,
        bind: &str,
        step: &str,
        label: &str,
    ) -> TaxEngineResult<BigDecimal> {
        let book = self.book;
        let rule = book.require(key)?;
        let formula = formula_of(key, rule)?;
        let step_id = self.step_id(step);

        let row = match self.evaluator.evaluate(&formula, &self.variables) {
            Ok(raw) => {
                let value = rule.adjust(raw);
                ReconciliationRow::new(step_id, label, value).formula(formula)
            }
            Err(err) => {
                warn!("Rule '{}' failed at step {}: {}", key, step_id, err);
                self.report
                    .flag(step_id.clone(), format!("rule '{key}' could not be evaluated: {err}"));
                ReconciliationRow::new(step_id, label, zero())
                    .formula(formula)
                    .notes(format!("formula error: {err}; recorded as zero"))
            }
        }
        .rule(key, rule.citation.clone());

        let value = row.value.clone();
        self.record(row);
        self.set(bind, value.clone());
        Ok(value)
    }

    /// Apply the band schedule of rule `key` to `base` and record one row per
    /// band touched
    pub fn bands(&mut self, key: &str, base: &BigDecimal) -> TaxEngineResult<BandComputation> {
        let calculator = self.book.band_calculator(key)?;
        let computation = calculator.calculate(base);
        let citation = self.citation_of(key);
        for row in computation.reconciliation_rows(&self.step_prefix, key, citation.as_deref()) {
            self.record(row);
        }
        Ok(computation)
    }

    pub fn record(&mut self, row: ReconciliationRow) {
        self.report.push(row);
    }

    /// Record a derived figure that is not itself a rule
    pub fn derived(&mut self, step: &str, label: &str, value: BigDecimal, formula: &str) {
        let row = ReconciliationRow::new(self.step_id(step), label, value).formula(formula);
        self.record(row);
    }

    pub fn note(&mut self, step: &str, label: &str, value: BigDecimal, notes: &str) {
        let row = ReconciliationRow::new(self.step_id(step), label, value).notes(notes);
        self.record(row);
    }

    pub fn into_report(self) -> ReconciliationReport {
        self.report
    }

    pub fn step_id(&self, step: &str) -> String {
        format!("{}.{}", self.step_prefix, step)
    }
}

fn formula_of(key: &str, rule: &TaxRule) -> TaxEngineResult<String> {
    match (rule.rule_type, &rule.formula) {
        (RuleType::ProgressiveBands, _) => Err(TaxError::Configuration(format!(
            "rule '{key}' is a band schedule, not a formula"
        ))),
        (_, Some(formula)) => Ok(formula.clone()),
        (_, None) => Err(TaxError::Configuration(format!(
            "rule '{key}' has no formula"
        ))),
    }
}
