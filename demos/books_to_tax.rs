//! Import a small bank statement, derive statements and compute tax.
//!
//! Run with `RUST_LOG=info` to see the pipeline log.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use log::info;
use taxbook_core::{
    compliance::{BusinessFacts, ComplianceChecker},
    config::EngineConfig,
    import::{BankImporter, BankTransaction, BankTransactionType},
    ledger::{ChartOfAccounts, JournalEngine},
    tax::{RuleBookStore, TaxComputationOrchestrator, TaxProfile},
    utils::MemoryStorage,
    ClassificationChain, RuleBasedClassifier,
};

fn statement() -> Vec<BankTransaction> {
    let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).expect("valid date");
    vec![
        BankTransaction::new(
            "stmt-001",
            day(2),
            "Invoice payment received",
            BigDecimal::from(2_400_000),
            BankTransactionType::Credit,
        ),
        BankTransaction::new(
            "stmt-002",
            day(5),
            "Transfer",
            BigDecimal::from(350_000),
            BankTransactionType::Debit,
        )
        .with_narration("Office rent January"),
        BankTransaction::new(
            "stmt-003",
            day(28),
            "Salary payment",
            BigDecimal::from(900_000),
            BankTransactionType::Debit,
        ),
        BankTransaction::new(
            "stmt-004",
            day(30),
            "POS settlement",
            BigDecimal::from(610_000),
            BankTransactionType::Credit,
        ),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let config = EngineConfig::default();
    config.validate()?;

    let chart = Arc::new(ChartOfAccounts::standard()?);
    let engine = Arc::new(
        JournalEngine::new(MemoryStorage::new(), Arc::clone(&chart)).with_config(&config),
    );
    let chain = ClassificationChain::new(RuleBasedClassifier::standard()?, chart)
        .with_config(&config.classification);
    let importer = BankImporter::new(Arc::clone(&engine), chain);

    let batch = importer.import_batch(&statement()).await;
    for result in &batch.results {
        println!(
            "{:<10} {:<28} {:>12} {}",
            result.transaction_id,
            result.description,
            result.amount,
            result.category.as_deref().unwrap_or("-")
        );
    }

    let draft = engine.derive_statements(None, None)?;
    println!("\nRevenue:            {}", draft.income_statement.revenue);
    println!("Operating expenses: {}", draft.income_statement.operating_expenses);
    println!("Net profit:         {}", draft.income_statement.net_profit);

    let store = Arc::new(RuleBookStore::from_config(&config));
    let orchestrator = TaxComputationOrchestrator::new(store);
    let result = orchestrator.compute_from_statement(TaxProfile::company(2025, "NG"), &draft)?;
    info!("Computed with rulebook {}", result.rulebook_metadata.version);

    println!("\nReconciliation");
    for row in result.reconciliation_report.rows() {
        println!(
            "  {:<28} {:>14} {}",
            row.step_id,
            row.value,
            row.citation.as_deref().unwrap_or("")
        );
    }
    println!("\nIncome tax due:     {}", result.total_tax_due);
    println!("Combined liability: {}", result.combined_liability());

    let facts = BusinessFacts::default().with_statement(&draft);
    let alerts = ComplianceChecker::new(config.compliance.clone()).alerts(&facts);
    for alert in alerts {
        println!("[{:?}] {}: {}", alert.severity, alert.rule_id, alert.message);
    }

    Ok(())
}
