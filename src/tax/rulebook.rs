//! Versioned tax rulebooks and the process-wide rulebook cache
//!
//! A rulebook is a JSON document scoped to one jurisdiction and tax year,
//! resolved by the name `<jurisdiction>_<taxYear>`. Once parsed and validated
//! it is immutable and shared behind an `Arc`.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::bands::{ProgressiveBandCalculator, TaxBand};
use super::{TaxEngineResult, TaxError};
use crate::config::EngineConfig;
use crate::utils::decimal::{deserialize_opt_decimal, parse_decimal};

const BUILTIN_NG_2025: &str = include_str!("../../rulebooks/NG_2025.json");

/// Cache key for a rulebook
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleBookKey {
    pub tax_year: i32,
    pub jurisdiction: String,
}

impl RuleBookKey {
    pub fn new(tax_year: i32, jurisdiction: impl AsRef<str>) -> Self {
        Self {
            tax_year,
            jurisdiction: jurisdiction.as_ref().trim().to_uppercase(),
        }
    }

    /// Document name, e.g. `NG_2025`
    pub fn document_name(&self) -> String {
        format!("{}_{}", self.jurisdiction, self.tax_year)
    }
}

impl fmt::Display for RuleBookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBookMetadata {
    pub tax_year: i32,
    pub jurisdiction: String,
    pub version: String,
    pub effective_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

/// A legal reference that rules point to by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Formula is a single literal value
    Constant,
    Expression,
    ProgressiveBands,
    /// Floor applied to a computed tax
    MinTax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingModeSpec {
    #[default]
    HalfUp,
    HalfEven,
    Up,
    Down,
    Ceiling,
    Floor,
}

impl From<RoundingModeSpec> for RoundingMode {
    fn from(mode: RoundingModeSpec) -> Self {
        match mode {
            RoundingModeSpec::HalfUp => RoundingMode::HalfUp,
            RoundingModeSpec::HalfEven => RoundingMode::HalfEven,
            RoundingModeSpec::Up => RoundingMode::Up,
            RoundingModeSpec::Down => RoundingMode::Down,
            RoundingModeSpec::Ceiling => RoundingMode::Ceiling,
            RoundingModeSpec::Floor => RoundingMode::Floor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounding {
    pub scale: i64,
    #[serde(default)]
    pub mode: RoundingModeSpec,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Caps {
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub min: Option<BigDecimal>,
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub max: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub rounding: Option<Rounding>,
    #[serde(default)]
    pub caps: Option<Caps>,
    #[serde(default)]
    pub bands: Option<Vec<TaxBand>>,
    /// Id of an entry in the rulebook's citations
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TaxRule {
    /// Clamp to the caps, then round
    pub fn adjust(&self, value: BigDecimal) -> BigDecimal {
        let mut value = value;
        if let Some(caps) = &self.caps {
            if let Some(min) = &caps.min {
                if value < *min {
                    value = min.clone();
                }
            }
            if let Some(max) = &caps.max {
                if value > *max {
                    value = max.clone();
                }
            }
        }
        match &self.rounding {
            Some(rounding) => value.with_scale_round(rounding.scale, rounding.mode.into()),
            None => value,
        }
    }

    fn validate(&self, key: &str, citations: &[Citation]) -> Result<(), String> {
        match self.rule_type {
            RuleType::ProgressiveBands => {
                let bands = self
                    .bands
                    .clone()
                    .ok_or_else(|| format!("rule '{key}' has no bands"))?;
                ProgressiveBandCalculator::new(bands)
                    .map_err(|err| format!("rule '{key}': {err}"))?;
            }
            RuleType::Constant => {
                let formula = self.non_empty_formula(key)?;
                if parse_decimal(formula).is_none() {
                    return Err(format!("constant rule '{key}' is not a number: {formula}"));
                }
            }
            RuleType::Expression | RuleType::MinTax => {
                self.non_empty_formula(key)?;
            }
        }

        if let Some(rounding) = &self.rounding {
            if !(0..=10).contains(&rounding.scale) {
                return Err(format!("rule '{key}' has rounding scale {}", rounding.scale));
            }
        }
        if let Some(Caps {
            min: Some(min),
            max: Some(max),
        }) = &self.caps
        {
            if min > max {
                return Err(format!("rule '{key}' has min cap above max cap"));
            }
        }
        if let Some(id) = &self.citation {
            if !citations.iter().any(|citation| &citation.id == id) {
                return Err(format!("rule '{key}' cites unknown citation '{id}'"));
            }
        }
        Ok(())
    }

    fn non_empty_formula(&self, key: &str) -> Result<&str, String> {
        match self.formula.as_deref().map(str::trim) {
            Some(formula) if !formula.is_empty() => Ok(formula),
            _ => Err(format!("rule '{key}' has no formula")),
        }
    }
}

/// A validated rulebook document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRuleBook {
    pub metadata: RuleBookMetadata,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub rules: BTreeMap<String, TaxRule>,
}

impl TaxRuleBook {
    /// Parse and validate a rulebook document
    pub fn from_json_str(json: &str) -> TaxEngineResult<Self> {
        let book: TaxRuleBook = serde_json::from_str(json)
            .map_err(|err| TaxError::Configuration(format!("malformed rulebook: {err}")))?;
        book.validate()?;
        Ok(book)
    }

    pub fn validate(&self) -> TaxEngineResult<()> {
        let fail = |message: String| -> TaxEngineResult<()> {
            Err(TaxError::Configuration(format!(
                "rulebook {}: {message}",
                self.key()
            )))
        };

        if self.metadata.jurisdiction.trim().is_empty() {
            return fail("jurisdiction is empty".to_string());
        }
        if self.metadata.version.trim().is_empty() {
            return fail("version is empty".to_string());
        }
        if self.metadata.tax_year < 1900 {
            return fail(format!("tax year {} is out of range", self.metadata.tax_year));
        }
        if let Some(expiry) = self.metadata.expiry_date {
            if expiry < self.metadata.effective_date {
                return fail("expiry date precedes effective date".to_string());
            }
        }
        if self.rules.is_empty() {
            return fail("no rules".to_string());
        }
        for (key, rule) in &self.rules {
            if let Err(message) = rule.validate(key, &self.citations) {
                return fail(message);
            }
        }
        Ok(())
    }

    pub fn key(&self) -> RuleBookKey {
        RuleBookKey::new(self.metadata.tax_year, &self.metadata.jurisdiction)
    }

    pub fn rule(&self, key: &str) -> Option<&TaxRule> {
        self.rules.get(key)
    }

    /// Look up a rule that must exist
    pub fn require(&self, key: &str) -> TaxEngineResult<&TaxRule> {
        self.rule(key).ok_or_else(|| {
            TaxError::Configuration(format!("rulebook {} has no rule '{key}'", self.key()))
        })
    }

    pub fn citation(&self, id: &str) -> Option<&Citation> {
        self.citations.iter().find(|citation| citation.id == id)
    }

    /// Band calculator for a `progressive_bands` rule
    pub fn band_calculator(&self, key: &str) -> TaxEngineResult<ProgressiveBandCalculator> {
        let rule = self.require(key)?;
        match (&rule.rule_type, &rule.bands) {
            (RuleType::ProgressiveBands, Some(bands)) => {
                ProgressiveBandCalculator::new(bands.clone())
            }
            _ => Err(TaxError::Configuration(format!(
                "rule '{key}' is not a progressive_bands rule"
            ))),
        }
    }
}

/// Where rulebook documents come from
pub trait RuleBookSource: Send + Sync {
    /// Raw document for `key`, or `None` if this source has none
    fn fetch(&self, key: &RuleBookKey) -> TaxEngineResult<Option<String>>;

    fn describe(&self) -> String;
}

/// Reads `<dir>/<JURISDICTION>_<year>.json`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &RuleBookKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.document_name()))
    }
}

impl RuleBookSource for DirectorySource {
    fn fetch(&self, key: &RuleBookKey) -> TaxEngineResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TaxError::Configuration(format!(
                "cannot read {}: {err}",
                path.display()
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// Documents held in memory, keyed by document name
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<String, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, key: &RuleBookKey, json: impl Into<String>) -> Self {
        self.documents.insert(key.document_name(), json.into());
        self
    }
}

impl RuleBookSource for InMemorySource {
    fn fetch(&self, key: &RuleBookKey) -> TaxEngineResult<Option<String>> {
        Ok(self.documents.get(&key.document_name()).cloned())
    }

    fn describe(&self) -> String {
        format!("{} in-memory documents", self.documents.len())
    }
}

/// Rulebooks compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl RuleBookSource for BuiltinSource {
    fn fetch(&self, key: &RuleBookKey) -> TaxEngineResult<Option<String>> {
        Ok(match key.document_name().as_str() {
            "NG_2025" => Some(BUILTIN_NG_2025.to_string()),
            _ => None,
        })
    }

    fn describe(&self) -> String {
        "built-in rulebooks".to_string()
    }
}

type CacheSlot = Arc<OnceCell<Arc<TaxRuleBook>>>;

/// Loads rulebooks from an ordered list of sources and caches them for the
/// life of the store.
///
/// Each key is parsed at most once, even when several threads ask for it at
/// the same time. A failed load is not cached, so a later call retries.
pub struct RuleBookStore {
    sources: Vec<Box<dyn RuleBookSource>>,
    cache: RwLock<HashMap<RuleBookKey, CacheSlot>>,
}

impl RuleBookStore {
    pub fn new(sources: Vec<Box<dyn RuleBookSource>>) -> Self {
        Self {
            sources,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Store backed only by the built-in rulebooks
    pub fn builtin() -> Self {
        Self::new(vec![Box::new(BuiltinSource)])
    }

    /// Configured rulebook directory first, then the built-ins
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut sources: Vec<Box<dyn RuleBookSource>> = Vec::new();
        if let Some(dir) = &config.rulebook_dir {
            sources.push(Box::new(DirectorySource::new(dir)));
        }
        sources.push(Box::new(BuiltinSource));
        Self::new(sources)
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(vec![Box::new(DirectorySource::new(dir.as_ref()))])
    }

    /// Load (or return the cached) rulebook for a tax year and jurisdiction
    pub fn load(&self, tax_year: i32, jurisdiction: &str) -> TaxEngineResult<Arc<TaxRuleBook>> {
        self.load_key(&RuleBookKey::new(tax_year, jurisdiction))
    }

    pub fn load_key(&self, key: &RuleBookKey) -> TaxEngineResult<Arc<TaxRuleBook>> {
        let slot = self.slot(key)?;
        slot.get_or_try_init(|| self.read(key)).map(Arc::clone)
    }

    /// Number of rulebooks parsed so far
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .map(|cache| cache.values().filter(|slot| slot.get().is_some()).count())
            .unwrap_or(0)
    }

    fn slot(&self, key: &RuleBookKey) -> TaxEngineResult<CacheSlot> {
        let poisoned = || TaxError::Configuration("rulebook cache lock poisoned".to_string());

        if let Some(slot) = self.cache.read().map_err(|_| poisoned())?.get(key) {
            return Ok(Arc::clone(slot));
        }
        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        Ok(Arc::clone(cache.entry(key.clone()).or_default()))
    }

    fn read(&self, key: &RuleBookKey) -> TaxEngineResult<Arc<TaxRuleBook>> {
        for source in &self.sources {
            let Some(json) = source.fetch(key)? else {
                debug!("No rulebook {} in {}", key, source.describe());
                continue;
            };

            let book = TaxRuleBook::from_json_str(&json)?;
            if book.key() != *key {
                return Err(TaxError::Configuration(format!(
                    "document {} declares rulebook {}",
                    key,
                    book.key()
                )));
            }
            info!(
                "Loaded rulebook {} version {} from {}",
                key,
                book.metadata.version,
                source.describe()
            );
            return Ok(Arc::new(book));
        }

        Err(TaxError::Configuration(format!(
            "no rulebook found for {key}"
        )))
    }
}

impl fmt::Debug for RuleBookStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self.sources.iter().map(|source| source.describe()).collect();
        f.debug_struct("RuleBookStore")
            .field("sources", &sources)
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::str::FromStr;

    const MINIMAL: &str = r#"{
        "metadata": {"tax_year": 2030, "jurisdiction": "NG", "version": "test-1", "effective_date": "2030-01-01"},
        "citations": [{"id": "CITA-40", "title": "Companies Income Tax Act s.40"}],
        "rules": {
            "vat_rate": {"type": "constant", "formula": "0.075"},
            "cit_bands": {
                "type": "progressive_bands",
                "citation": "CITA-40",
                "bands": [
                    {"label": "Small", "threshold": 25000000, "rate": 0},
                    {"label": "Rest", "threshold": null, "rate": 0.3}
                ]
            }
        }
    }"#;

    struct CountingSource {
        inner: InMemorySource,
        fetches: Arc<AtomicUsize>,
    }

    impl RuleBookSource for CountingSource {
        fn fetch(&self, key: &RuleBookKey) -> TaxEngineResult<Option<String>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(key)
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_builtin_rulebook_is_valid() {
        let store = RuleBookStore::builtin();
        let book = store.load(2025, "ng").unwrap();
        assert_eq!(book.metadata.jurisdiction, "NG");
        assert!(book.rule("cit_bands").is_some());
        assert!(book.band_calculator("pit_bands").is_ok());
        assert_eq!(
            book.require("vat_rate").unwrap().formula.as_deref(),
            Some("0.075")
        );
    }

    #[test]
    fn test_builtin_rules_all_cite_a_known_source() {
        let book = RuleBookStore::builtin().load(2025, "NG").unwrap();
        for (key, rule) in &book.rules {
            let citation = rule
                .citation
                .as_deref()
                .unwrap_or_else(|| panic!("rule '{key}' has no citation"));
            assert!(book.citation(citation).is_some(), "rule '{key}' cites unknown '{citation}'");
        }
        assert_eq!(
            book.require("pit_gross_income").unwrap().citation.as_deref(),
            Some("PITA-S3")
        );
    }

    #[test]
    fn test_missing_rulebook_is_configuration_error() {
        let store = RuleBookStore::builtin();
        assert!(matches!(
            store.load(1999, "NG"),
            Err(TaxError::Configuration(_))
        ));
    }

    #[test]
    fn test_second_load_returns_cached_instance() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let key = RuleBookKey::new(2030, "NG");
        let store = RuleBookStore::new(vec![Box::new(CountingSource {
            inner: InMemorySource::new().with_document(&key, MINIMAL),
            fetches: Arc::clone(&fetches),
        })]);

        let first = store.load(2030, "NG").unwrap();
        let second = store.load(2030, "NG").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn test_concurrent_first_load_parses_once() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let key = RuleBookKey::new(2030, "NG");
        let store = Arc::new(RuleBookStore::new(vec![Box::new(CountingSource {
            inner: InMemorySource::new().with_document(&key, MINIMAL),
            fetches: Arc::clone(&fetches),
        })]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.load(2030, "NG").unwrap())
            })
            .collect();
        let books: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(books.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleBookStore::from_dir(dir.path());
        assert!(store.load(2030, "NG").is_err());

        std::fs::write(dir.path().join("NG_2030.json"), MINIMAL).unwrap();
        let book = store.load(2030, "NG").unwrap();
        assert_eq!(book.metadata.version, "test-1");
    }

    #[test]
    fn test_directory_source_takes_precedence_over_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let overridden = MINIMAL.replace("2030", "2025").replace("test-1", "local");
        std::fs::write(dir.path().join("NG_2025.json"), overridden).unwrap();

        let config = EngineConfig {
            rulebook_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };
        let store = RuleBookStore::from_config(&config);
        assert_eq!(store.load(2025, "NG").unwrap().metadata.version, "local");
    }

    #[test]
    fn test_mismatched_document_rejected() {
        let key = RuleBookKey::new(2031, "NG");
        let store =
            RuleBookStore::new(vec![Box::new(InMemorySource::new().with_document(&key, MINIMAL))]);
        assert!(matches!(
            store.load(2031, "NG"),
            Err(TaxError::Configuration(message)) if message.contains("declares")
        ));
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(TaxRuleBook::from_json_str("{not json").is_err());

        let open_middle = MINIMAL.replace(
            r#"{"label": "Small", "threshold": 25000000, "rate": 0}"#,
            r#"{"label": "Small", "threshold": null, "rate": 0}"#,
        );
        assert!(matches!(
            TaxRuleBook::from_json_str(&open_middle),
            Err(TaxError::Configuration(_))
        ));

        let bad_citation = MINIMAL.replace(r#""citation": "CITA-40""#, r#""citation": "NOPE""#);
        assert!(TaxRuleBook::from_json_str(&bad_citation).is_err());

        let bad_constant = MINIMAL.replace(r#""formula": "0.075""#, r#""formula": "rate""#);
        assert!(TaxRuleBook::from_json_str(&bad_constant).is_err());
    }

    #[test]
    fn test_caps_then_rounding() {
        let rule: TaxRule = serde_json::from_str(
            r#"{"type": "expression", "formula": "x", "caps": {"min": 0, "max": "100.555"},
                "rounding": {"scale": 2, "mode": "half_up"}}"#,
        )
        .unwrap();
        let dec = |text: &str| BigDecimal::from_str(text).unwrap();

        assert_eq!(rule.adjust(dec("-5")), dec("0"));
        assert_eq!(rule.adjust(dec("500")), dec("100.56"));
        assert_eq!(rule.adjust(dec("10.004")), dec("10.00"));
    }
}
