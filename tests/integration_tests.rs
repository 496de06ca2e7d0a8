//! Integration tests for taxbook-core

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use taxbook_core::{
    compliance::{BusinessFacts, ComplianceChecker, CompliancePolicy, PolicyOutcome},
    import::{BankImporter, BankTransaction, BankTransactionType},
    ledger::{chart::codes, ChartOfAccounts, JournalEngine},
    tax::{
        formula::variables, FinancialInputs, FormulaEvaluator, RuleBookKey, RuleBookStore,
        TaxComputationOrchestrator, TaxComputationRequest, TaxProfile,
    },
    tax::rulebook::InMemorySource,
    tax::TaxError,
    utils::MemoryStorage,
    ClassificationChain, LedgerStorage, RuleBasedClassifier,
};

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn importer() -> BankImporter<MemoryStorage> {
    let chart = Arc::new(ChartOfAccounts::standard().unwrap());
    let engine = Arc::new(JournalEngine::new(MemoryStorage::new(), Arc::clone(&chart)));
    let chain = ClassificationChain::new(RuleBasedClassifier::standard().unwrap(), chart);
    BankImporter::new(engine, chain)
}

#[tokio::test]
async fn test_books_to_tax_workflow() {
    let importer = importer();
    let transactions = vec![
        BankTransaction::new(
            "txn-1",
            date(3),
            "Salary payment",
            BigDecimal::from(150_000),
            BankTransactionType::Debit,
        ),
        BankTransaction::new(
            "txn-2",
            date(5),
            "Invoice payment received",
            BigDecimal::from(500_000),
            BankTransactionType::Credit,
        ),
    ];

    let batch = importer.import_batch(&transactions).await;
    assert_eq!(batch.imported, 2);
    assert_eq!(batch.summary.net_amount, BigDecimal::from(350_000));
    assert_eq!(batch.results[0].category.as_deref(), Some("salary-expense"));
    assert_eq!(batch.results[1].category.as_deref(), Some("sales-income"));

    let engine = importer.engine();
    let salary = engine
        .storage()
        .get_entry(batch.results[0].journal_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert!(salary.touches(codes::SALARIES));
    assert!(salary.touches(codes::BANK));

    let invoice = engine
        .storage()
        .get_entry(batch.results[1].journal_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert!(invoice.touches(codes::BANK));
    assert!(invoice.touches(codes::SALES_REVENUE));

    let trial_balance = engine.trial_balance(None).unwrap();
    assert!(trial_balance.is_balanced);

    let statement = engine.derive_statements(None, None).unwrap();
    assert_eq!(statement.income_statement.revenue, BigDecimal::from(500_000));
    assert_eq!(
        statement.income_statement.operating_expenses,
        BigDecimal::from(150_000)
    );
    assert_eq!(statement.income_statement.net_profit, BigDecimal::from(350_000));
    assert!(statement.balance_sheet.is_balanced);

    let orchestrator = TaxComputationOrchestrator::new(Arc::new(RuleBookStore::builtin()));
    let result = orchestrator
        .compute_from_statement(TaxProfile::company(2025, "NG"), &statement)
        .unwrap();

    assert_eq!(result.taxable_income, BigDecimal::from(350_000));
    // Below the small-company threshold: zero-rated band, no minimum tax
    assert_eq!(result.total_tax_due, BigDecimal::from(0));
    assert_eq!(result.rulebook_metadata.tax_year, 2025);

    let band_rows: Vec<_> = result
        .reconciliation_report
        .rows_with_prefix("cit.band.")
        .collect();
    assert!(!band_rows.is_empty());
    for row in band_rows {
        assert_eq!(row.citation.as_deref(), Some("CITA-S40"));
        assert_eq!(row.rule_key.as_deref(), Some("cit_bands"));
    }
}

#[tokio::test]
async fn test_reimporting_a_statement_posts_once() {
    let importer = importer();
    let transaction = BankTransaction::new(
        "txn-dup",
        date(10),
        "POS settlement",
        BigDecimal::from(42_000),
        BankTransactionType::Credit,
    );

    let first = importer.import_one(&transaction).await;
    let second = importer.import_one(&transaction).await;

    assert!(first.success);
    assert!(!second.success);
    assert!(second.skipped);
    assert_eq!(second.journal_id, first.journal_id);
    assert_eq!(importer.engine().storage().entry_count().unwrap(), 1);
}

#[test]
fn test_missing_rulebook_is_a_configuration_error() {
    let orchestrator = TaxComputationOrchestrator::new(Arc::new(RuleBookStore::builtin()));
    let request = TaxComputationRequest::new(
        TaxProfile::company(1999, "NG"),
        FinancialInputs::new(BigDecimal::from(1_000_000)),
    );

    match orchestrator.compute(&request) {
        Err(TaxError::Configuration(message)) => assert!(message.contains("1999")),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn test_rulebook_is_loaded_once() {
    let store = RuleBookStore::builtin();
    let first = store.load(2025, "NG").unwrap();
    let second = store.load(2025, "ng").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.cached_count(), 1);
}

#[test]
fn test_partial_rulebook_degrades_sub_results() {
    let full: serde_json::Value =
        serde_json::from_str(include_str!("../rulebooks/NG_2025.json")).unwrap();
    let mut partial = full.clone();
    partial["rules"].as_object_mut().unwrap().remove("vat_rate");

    let key = RuleBookKey::new(2025, "NG");
    let source = InMemorySource::new().with_document(&key, partial.to_string());
    let orchestrator =
        TaxComputationOrchestrator::new(Arc::new(RuleBookStore::new(vec![Box::new(source)])));

    let inputs = FinancialInputs {
        vatable_sales: BigDecimal::from(1_000_000),
        ..FinancialInputs::new(BigDecimal::from(1_000_000))
    };
    let result = orchestrator
        .compute(&TaxComputationRequest::new(TaxProfile::company(2025, "NG"), inputs))
        .unwrap();

    assert!(!result.vat.as_ref().unwrap().is_available());
    assert!(!result.is_complete());
    assert!(result.reconciliation_report.find("vat.unavailable").is_some());
}

#[test]
fn test_formula_evaluator() {
    let evaluator = FormulaEvaluator::new();
    let vars = variables([
        ("gross_income", BigDecimal::from(100_000)),
        ("rate", BigDecimal::from(25) / BigDecimal::from(100)),
    ]);

    assert_eq!(
        evaluator.evaluate("gross_income * rate", &vars).unwrap(),
        BigDecimal::from(25_000)
    );
    assert!(evaluator.evaluate("gross_income; rm -rf /", &vars).is_err());
    assert!(evaluator.evaluate("gross * rate", &vars).is_err());
    assert!(evaluator.evaluate("(gross_income", &vars).is_err());
}

#[test]
fn test_compliance_gate() {
    let facts = BusinessFacts {
        turnover: BigDecimal::from(40_000_000),
        employee_count: 8,
        vat_registered: false,
        ..BusinessFacts::default()
    };

    let alerts = ComplianceChecker::default().alerts(&facts);
    assert!(alerts.iter().any(|alert| alert.rule_id == "vat_registration"));

    match CompliancePolicy::Strict.evaluate(&alerts) {
        PolicyOutcome::Blocked(messages) => {
            assert!(messages.iter().any(|m| m.starts_with("vat_registration")))
        }
        other => panic!("expected blocked, got {other:?}"),
    }
    assert!(matches!(
        CompliancePolicy::Off.evaluate(&alerts),
        PolicyOutcome::Proceed
    ));
}
