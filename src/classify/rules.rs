//! Rule-based classifier: a priority-ordered pattern table, first match wins

use log::debug;
use regex::{Regex, RegexBuilder};

use super::{Classification, ClassificationSource, Direction, FlowType};
use crate::ledger::chart::codes;
use crate::types::RawTransaction;

/// Confidence assigned when no rule matches
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// One row of the classification table
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    pub pattern: Regex,
    pub category: String,
    pub flow_type: FlowType,
    pub account_hint: String,
    pub direction: Direction,
    pub confidence: f64,
}

impl ClassificationRule {
    /// Compile a rule. Patterns match case-insensitively against the narration.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        category: impl Into<String>,
        flow_type: FlowType,
        account_hint: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: RegexBuilder::new(pattern).case_insensitive(true).build()?,
            category: category.into(),
            flow_type,
            account_hint: account_hint.into(),
            direction: Direction::Any,
            confidence: 0.85,
        })
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Check if this rule matches the given narration and direction
    pub fn matches(&self, text: &str, inflow: bool) -> bool {
        self.direction.admits(inflow) && self.pattern.is_match(text)
    }

    fn to_classification(&self) -> Classification {
        Classification {
            category: self.category.clone(),
            flow_type: self.flow_type,
            account_code: self.account_hint.clone(),
            confidence: self.confidence,
            source: ClassificationSource::Rule,
            rule_name: Some(self.name.clone()),
        }
    }
}

/// Classifier over an ordered rule table.
///
/// Rule order is the priority order: more specific patterns sit above generic
/// ones, and the first rule that matches decides the classification.
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    rules: Vec<ClassificationRule>,
}

impl RuleBasedClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Classifier with the built-in table for small-business bank narrations
    pub fn standard() -> Result<Self, regex::Error> {
        Ok(Self::new(standard_rules()?))
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a narration. `inflow` is true for money received.
    pub fn classify_text(&self, text: &str, inflow: bool) -> Classification {
        match self.rules.iter().find(|rule| rule.matches(text, inflow)) {
            Some(rule) => {
                debug!("narration {:?} matched rule {}", text, rule.name);
                rule.to_classification()
            }
            None => {
                debug!("narration {:?} matched no rule, using fallback", text);
                fallback(inflow)
            }
        }
    }

    pub fn classify(&self, transaction: &RawTransaction) -> Classification {
        self.classify_text(&transaction.description, transaction.is_inflow())
    }
}

/// Default classification by sign: credits are other income, debits other expense
pub fn fallback(inflow: bool) -> Classification {
    let (category, flow_type, account_code) = if inflow {
        ("other-income", FlowType::Income, codes::OTHER_INCOME)
    } else {
        ("other-expense", FlowType::Expense, codes::OTHER_EXPENSES)
    };
    Classification {
        category: category.to_string(),
        flow_type,
        account_code: account_code.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        source: ClassificationSource::Fallback,
        rule_name: None,
    }
}

/// Built-in priority table
pub fn standard_rules() -> Result<Vec<ClassificationRule>, regex::Error> {
    use Direction::*;
    use FlowType::*;

    Ok(vec![
        // Statutory remittances before anything mentioning salary or pension
        ClassificationRule::new(
            "tax-remittance",
            r"\b(paye|firs|lirs|irs|vat remittance|wht remittance|tax remittance|tax payment)\b",
            "tax-payment",
            Liability,
            codes::INCOME_TAX_PAYABLE,
        )?
        .direction(Outflow)
        .confidence(0.9),
        ClassificationRule::new(
            "pension",
            r"\b(pension|pfa|rsa contribution)\b",
            "pension-expense",
            Expense,
            codes::PENSION,
        )?
        .direction(Outflow)
        .confidence(0.9),
        ClassificationRule::new(
            "salary",
            r"\b(salary|salaries|payroll|wages?|staff pay)\b",
            "salary-expense",
            Expense,
            codes::SALARIES,
        )?
        .direction(Outflow)
        .confidence(0.9),
        ClassificationRule::new(
            "loan-received",
            r"\b(loan disbursement|loan credit|loan drawdown)\b",
            "loan-received",
            Liability,
            codes::LOANS_PAYABLE,
        )?
        .direction(Inflow)
        .confidence(0.85),
        ClassificationRule::new(
            "loan-repayment",
            r"\bloan (repayment|installment|instalment)\b",
            "loan-repayment",
            Liability,
            codes::LOANS_PAYABLE,
        )?
        .direction(Outflow)
        .confidence(0.85),
        ClassificationRule::new(
            "capital",
            r"\b(capital injection|owner contribution|share capital)\b",
            "owner-capital",
            Equity,
            codes::OWNERS_CAPITAL,
        )?
        .direction(Inflow)
        .confidence(0.85),
        ClassificationRule::new(
            "drawings",
            r"\b(drawings|owner withdrawal|personal use)\b",
            "owner-drawings",
            Equity,
            codes::DRAWINGS,
        )?
        .direction(Outflow)
        .confidence(0.8),
        ClassificationRule::new(
            "bank-charges",
            r"\b(bank charges?|sms (alert|charge)|maintenance fee|cot|emtl|transfer fee)\b",
            "bank-charges",
            Expense,
            codes::BANK_CHARGES,
        )?
        .direction(Outflow)
        .confidence(0.9),
        ClassificationRule::new(
            "interest-income",
            r"\b(interest (earned|credit|income)|credit interest)\b",
            "interest-income",
            Income,
            codes::INTEREST_INCOME,
        )?
        .direction(Inflow)
        .confidence(0.85),
        ClassificationRule::new(
            "rent",
            r"\b(rent|lease|tenancy)\b",
            "rent-expense",
            Expense,
            codes::RENT,
        )?
        .direction(Outflow)
        .confidence(0.85),
        ClassificationRule::new(
            "utilities",
            r"\b(electricity|nepa|phcn|ikedc|ekedc|aedc|prepaid meter|water (bill|board)|diesel)\b",
            "utilities",
            Expense,
            codes::UTILITIES,
        )?
        .direction(Outflow)
        .confidence(0.85),
        ClassificationRule::new(
            "telecom",
            r"\b(mtn|airtel|glo|9mobile|airtime|data (bundle|subscription)|internet)\b",
            "telecom",
            Expense,
            codes::TELECOM,
        )?
        .direction(Outflow)
        .confidence(0.8),
        ClassificationRule::new(
            "transport",
            r"\b(fuel|petrol|uber|bolt|transport|logistics|delivery fee)\b",
            "transport",
            Expense,
            codes::TRANSPORT,
        )?
        .direction(Outflow)
        .confidence(0.75),
        ClassificationRule::new(
            "professional-fees",
            r"\b(audit|legal|lawyer|consult(ing|ancy|ant)?|professional fees?|accountant)\b",
            "professional-fees",
            Expense,
            codes::PROFESSIONAL_FEES,
        )?
        .direction(Outflow)
        .confidence(0.8),
        ClassificationRule::new(
            "marketing",
            r"\b(advert(isement|ising)?|marketing|promo(tion)?|sponsored)\b",
            "marketing",
            Expense,
            codes::MARKETING,
        )?
        .direction(Outflow)
        .confidence(0.75),
        // Asset purchases before generic purchases
        ClassificationRule::new(
            "asset-purchase",
            r"\b(equipment|laptop|computer|furniture|generator|vehicle|machinery)\b",
            "asset-purchase",
            Asset,
            codes::PROPERTY_PLANT_EQUIPMENT,
        )?
        .direction(Outflow)
        .confidence(0.75),
        ClassificationRule::new(
            "sales",
            r"\b(invoice|payment received|sales?|pos settlement|customer payment|transfer from)\b",
            "sales-income",
            Income,
            codes::SALES_REVENUE,
        )?
        .direction(Inflow)
        .confidence(0.8),
        ClassificationRule::new(
            "cost-of-sales",
            r"\b(purchase|supplier|stock|inventory|goods|raw materials?)\b",
            "cost-of-sales",
            Expense,
            codes::COST_OF_SALES,
        )?
        .direction(Outflow)
        .confidence(0.7),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RuleBasedClassifier {
        RuleBasedClassifier::standard().unwrap()
    }

    #[test]
    fn test_salary_payment() {
        let classification = classifier().classify_text("Salary payment", false);
        assert_eq!(classification.category, "salary-expense");
        assert_eq!(classification.flow_type, FlowType::Expense);
        assert_eq!(classification.account_code, codes::SALARIES);
        assert_eq!(classification.source, ClassificationSource::Rule);
    }

    #[test]
    fn test_invoice_payment_received() {
        let classification = classifier().classify_text("Invoice payment received", true);
        assert_eq!(classification.category, "sales-income");
        assert_eq!(classification.account_code, codes::SALES_REVENUE);
    }

    #[test]
    fn test_priority_order_specific_before_generic() {
        // Mentions both pension and salary; pension sits higher in the table
        let classification = classifier().classify_text("Pension on salary for March", false);
        assert_eq!(classification.category, "pension-expense");

        // Laptop purchase is an asset, not cost of sales
        let classification = classifier().classify_text("Purchase of laptop", false);
        assert_eq!(classification.category, "asset-purchase");
    }

    #[test]
    fn test_direction_limits_rules() {
        // Paying a supplier invoice is not sales income
        let classification = classifier().classify_text("Supplier invoice settlement", false);
        assert_eq!(classification.category, "cost-of-sales");
    }

    #[test]
    fn test_fallback_by_sign() {
        let credit = classifier().classify_text("XYZ 0192", true);
        assert_eq!(credit.category, "other-income");
        assert_eq!(credit.source, ClassificationSource::Fallback);
        assert_eq!(credit.confidence, FALLBACK_CONFIDENCE);

        let debit = classifier().classify_text("XYZ 0192", false);
        assert_eq!(debit.category, "other-expense");
        assert_eq!(debit.account_code, codes::OTHER_EXPENSES);
    }

    #[test]
    fn test_whole_word_matching() {
        // "rent" inside another word is not a match
        let classification = classifier().classify_text("Parental gift", false);
        assert_eq!(classification.category, "other-expense");
    }
}
