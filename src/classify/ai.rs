//! Strategy chain: rule-based classification with an optional AI collaborator

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{Classification, ClassificationSource, FlowType, RuleBasedClassifier};
use crate::config::ClassificationConfig;
use crate::ledger::chart::ChartOfAccounts;
use crate::types::RawTransaction;

/// Suggestion returned by an AI classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub category: String,
    pub flow_type: FlowType,
    pub account_code: String,
    pub confidence: f64,
}

/// Errors from the AI collaborator
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("AI classifier unavailable: {0}")]
    Unavailable(String),
    #[error("AI classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("AI suggestion rejected: {0}")]
    InvalidSuggestion(String),
}

/// External AI classification service
///
/// This is the only asynchronous seam in the core. Implementations may call a
/// remote model; the chain bounds every call with a timeout.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn suggest(
        &self,
        transaction: &RawTransaction,
        rule_based: &Classification,
    ) -> Result<AiSuggestion, ClassifierError>;
}

/// Rule-based classifier, optionally followed by an AI classifier.
///
/// The AI is consulted only when the rule-based confidence is below the
/// threshold. Its suggestion replaces the rule result only if it names a known
/// account whose class matches the suggested flow type and it is more confident.
/// Errors and timeouts keep the rule-based result.
pub struct ClassificationChain {
    rules: RuleBasedClassifier,
    chart: Arc<ChartOfAccounts>,
    ai: Option<Arc<dyn AiClassifier>>,
    threshold: f64,
    timeout: Duration,
}

impl ClassificationChain {
    /// Chain without an AI collaborator
    pub fn new(rules: RuleBasedClassifier, chart: Arc<ChartOfAccounts>) -> Self {
        let defaults = ClassificationConfig::default();
        Self {
            rules,
            chart,
            ai: None,
            threshold: defaults.ai_confidence_threshold,
            timeout: defaults.ai_timeout(),
        }
    }

    pub fn with_config(mut self, config: &ClassificationConfig) -> Self {
        self.threshold = config.ai_confidence_threshold;
        self.timeout = config.ai_timeout();
        self
    }

    pub fn with_ai(mut self, ai: Arc<dyn AiClassifier>) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Deterministic rule-based classification
    pub fn classify(&self, transaction: &RawTransaction) -> Classification {
        self.rules.classify(transaction)
    }

    /// Rule-based classification, deferring to the AI collaborator when the
    /// rule-based confidence is below the threshold
    pub async fn classify_with_ai(&self, transaction: &RawTransaction) -> Classification {
        let rule_based = self.rules.classify(transaction);

        let ai = match &self.ai {
            Some(ai) if rule_based.confidence < self.threshold => ai,
            _ => return rule_based,
        };

        let call = ai.suggest(transaction, &rule_based);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.timeout)),
        };

        match outcome.and_then(|suggestion| self.accept(suggestion, &rule_based)) {
            Ok(classification) => {
                debug!(
                    "transaction {} classified by AI as {} ({:?})",
                    transaction.id, classification.category, classification.source
                );
                classification
            }
            Err(err) => {
                warn!(
                    "keeping rule-based classification for transaction {}: {}",
                    transaction.id, err
                );
                rule_based
            }
        }
    }

    fn accept(
        &self,
        suggestion: AiSuggestion,
        rule_based: &Classification,
    ) -> Result<Classification, ClassifierError> {
        let account = self.chart.get(&suggestion.account_code).ok_or_else(|| {
            ClassifierError::InvalidSuggestion(format!(
                "unknown account '{}'",
                suggestion.account_code
            ))
        })?;

        if account.class != suggestion.flow_type.account_class() {
            return Err(ClassifierError::InvalidSuggestion(format!(
                "account '{}' does not fit flow type {:?}",
                suggestion.account_code, suggestion.flow_type
            )));
        }

        if !(0.0..=1.0).contains(&suggestion.confidence) {
            return Err(ClassifierError::InvalidSuggestion(format!(
                "confidence {} outside [0, 1]",
                suggestion.confidence
            )));
        }

        if suggestion.confidence <= rule_based.confidence {
            return Err(ClassifierError::InvalidSuggestion(format!(
                "confidence {} not above rule-based {}",
                suggestion.confidence, rule_based.confidence
            )));
        }

        let source = if suggestion.category == rule_based.category {
            ClassificationSource::Hybrid
        } else {
            ClassificationSource::Ai
        };

        Ok(Classification {
            category: suggestion.category,
            flow_type: suggestion.flow_type,
            account_code: suggestion.account_code,
            confidence: suggestion.confidence,
            source,
            rule_name: rule_based.rule_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::chart::codes;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    struct FixedAi(AiSuggestion);

    #[async_trait]
    impl AiClassifier for FixedAi {
        async fn suggest(
            &self,
            _transaction: &RawTransaction,
            _rule_based: &Classification,
        ) -> Result<AiSuggestion, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    struct SlowAi;

    #[async_trait]
    impl AiClassifier for SlowAi {
        async fn suggest(
            &self,
            _transaction: &RawTransaction,
            _rule_based: &Classification,
        ) -> Result<AiSuggestion, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(ClassifierError::Unavailable("never reached".to_string()))
        }
    }

    struct DownAi;

    #[async_trait]
    impl AiClassifier for DownAi {
        async fn suggest(
            &self,
            _transaction: &RawTransaction,
            _rule_based: &Classification,
        ) -> Result<AiSuggestion, ClassifierError> {
            Err(ClassifierError::Unavailable("connection refused".to_string()))
        }
    }

    fn chain() -> ClassificationChain {
        ClassificationChain::new(
            RuleBasedClassifier::standard().unwrap(),
            Arc::new(ChartOfAccounts::standard().unwrap()),
        )
        .with_config(&ClassificationConfig {
            ai_confidence_threshold: 0.6,
            ai_timeout_ms: 50,
        })
    }

    fn unknown_debit() -> RawTransaction {
        RawTransaction::new(
            "t-1",
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            "TRF/ACME/0193",
            BigDecimal::from(-25000),
            "NGN",
        )
    }

    fn rent_suggestion(confidence: f64) -> AiSuggestion {
        AiSuggestion {
            category: "rent-expense".to_string(),
            flow_type: FlowType::Expense,
            account_code: codes::RENT.to_string(),
            confidence,
        }
    }

    #[tokio::test]
    async fn test_ai_used_below_threshold() {
        let chain = chain().with_ai(Arc::new(FixedAi(rent_suggestion(0.9))));
        let classification = chain.classify_with_ai(&unknown_debit()).await;
        assert_eq!(classification.category, "rent-expense");
        assert_eq!(classification.source, ClassificationSource::Ai);
    }

    #[tokio::test]
    async fn test_ai_not_consulted_above_threshold() {
        let chain = chain().with_ai(Arc::new(FixedAi(rent_suggestion(0.99))));
        let mut transaction = unknown_debit();
        transaction.description = "Salary payment".to_string();
        let classification = chain.classify_with_ai(&transaction).await;
        assert_eq!(classification.category, "salary-expense");
        assert_eq!(classification.source, ClassificationSource::Rule);
    }

    #[tokio::test]
    async fn test_timeout_keeps_rule_result() {
        let chain = chain().with_ai(Arc::new(SlowAi));
        let classification = chain.classify_with_ai(&unknown_debit()).await;
        assert_eq!(classification.category, "other-expense");
        assert_eq!(classification.source, ClassificationSource::Fallback);
    }

    #[tokio::test]
    async fn test_unavailable_keeps_rule_result() {
        let chain = chain().with_ai(Arc::new(DownAi));
        let classification = chain.classify_with_ai(&unknown_debit()).await;
        assert_eq!(classification.category, "other-expense");
    }

    #[tokio::test]
    async fn test_suggestion_with_mismatched_account_rejected() {
        let mut suggestion = rent_suggestion(0.9);
        suggestion.account_code = codes::SALES_REVENUE.to_string();
        let chain = chain().with_ai(Arc::new(FixedAi(suggestion)));
        let classification = chain.classify_with_ai(&unknown_debit()).await;
        assert_eq!(classification.category, "other-expense");
    }

    #[tokio::test]
    async fn test_agreeing_suggestion_is_hybrid() {
        let suggestion = AiSuggestion {
            category: "other-expense".to_string(),
            flow_type: FlowType::Expense,
            account_code: codes::OTHER_EXPENSES.to_string(),
            confidence: 0.7,
        };
        let chain = chain().with_ai(Arc::new(FixedAi(suggestion)));
        let classification = chain.classify_with_ai(&unknown_debit()).await;
        assert_eq!(classification.source, ClassificationSource::Hybrid);
        assert_eq!(classification.confidence, 0.7);
    }
}
