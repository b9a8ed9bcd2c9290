use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Shortest all-digit key treated as a barcode (EAN-8).
pub const MIN_BARCODE_LEN: usize = 8;

/// Search key for a product: a JAN/EAN/UPC barcode or a free-text keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_barcode(&self) -> bool {
        self.0.len() >= MIN_BARCODE_LEN && self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One offer as a source reported it, before filtering.
///
/// Fields are read-only after construction; `new` rejects an empty name so a
/// priced listing always carries one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateListing {
    identifier: Identifier,
    source_name: String,
    raw_name: String,
    price: u64,
    listing_url: String,
    condition_flags: BTreeSet<String>,
    image_url: Option<String>,
    category_id: Option<String>,
}

impl CandidateListing {
    pub fn new(
        identifier: &Identifier,
        source_name: &str,
        raw_name: &str,
        price: u64,
        listing_url: &str,
    ) -> Option<Self> {
        let raw_name = raw_name.trim();
        if raw_name.is_empty() {
            return None;
        }
        Some(Self {
            identifier: identifier.clone(),
            source_name: source_name.to_string(),
            raw_name: raw_name.to_string(),
            price,
            listing_url: listing_url.to_string(),
            condition_flags: BTreeSet::new(),
            image_url: None,
            category_id: None,
        })
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.condition_flags.insert(flag.into());
        self
    }

    pub fn with_image_url(mut self, url: Option<String>) -> Self {
        self.image_url = url.filter(|u| !u.is_empty());
        self
    }

    pub fn with_category_id(mut self, id: Option<String>) -> Self {
        self.category_id = id.filter(|c| !c.is_empty());
        self
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    pub fn condition_flags(&self) -> &BTreeSet<String> {
        &self.condition_flags
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }
}

/// The chosen best-price result for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub identifier: Identifier,
    pub canonical_name: String,
    pub price: u64,
    pub source_name: String,
    pub listing_url: String,
    pub image_url: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ConfigMissing,
    SourceUnavailable,
    Timeout,
    NavigationTimeout,
    BlockedByHost,
    SchemaMismatch,
    SelectorNotFound,
    Parse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConfigMissing => "config_missing",
            FailureKind::SourceUnavailable => "source_unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::NavigationTimeout => "navigation_timeout",
            FailureKind::BlockedByHost => "blocked_by_host",
            FailureKind::SchemaMismatch => "schema_mismatch",
            FailureKind::SelectorNotFound => "selector_not_found",
            FailureKind::Parse => "parse_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyReason {
    /// The source answered and had nothing to offer.
    NoListings,
    /// The source is optional and has no credentials or target configured.
    NotConfigured,
}

/// What one adapter produced for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FetchOutcome {
    Success(Vec<CandidateListing>),
    Empty(EmptyReason),
    Failure(FailureKind),
}

impl FetchOutcome {
    pub fn from_result(
        result: std::result::Result<Vec<CandidateListing>, crate::utils::error::SourceError>,
    ) -> Self {
        match result {
            Ok(candidates) if candidates.is_empty() => FetchOutcome::Empty(EmptyReason::NoListings),
            Ok(candidates) => FetchOutcome::Success(candidates),
            Err(e) if e.kind == FailureKind::ConfigMissing => {
                FetchOutcome::Empty(EmptyReason::NotConfigured)
            }
            Err(e) => FetchOutcome::Failure(e.kind),
        }
    }

    /// True when the source was actually queried and answered.
    pub fn answered(&self) -> bool {
        matches!(
            self,
            FetchOutcome::Success(_) | FetchOutcome::Empty(EmptyReason::NoListings)
        )
    }

    pub fn candidates(&self) -> &[CandidateListing] {
        match self {
            FetchOutcome::Success(c) => c,
            _ => &[],
        }
    }

    pub fn label(&self) -> String {
        match self {
            FetchOutcome::Success(c) => format!("{} listing(s)", c.len()),
            FetchOutcome::Empty(EmptyReason::NoListings) => "no listings".to_string(),
            FetchOutcome::Empty(EmptyReason::NotConfigured) => "not configured".to_string(),
            FetchOutcome::Failure(kind) => format!("failed: {}", kind),
        }
    }
}

/// The term an adapter searches with. For barcode identifiers it may be a
/// resolved product phrase instead of the raw code.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub identifier: Identifier,
    pub term: String,
}

impl SearchQuery {
    pub fn raw(identifier: &Identifier) -> Self {
        Self {
            identifier: identifier.clone(),
            term: identifier.as_str().to_string(),
        }
    }
}

/// Per-run request identity handed to every adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchContext {
    pub user_agent: String,
}

/// Everything the orchestrator learned about one identifier.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub identifier: Identifier,
    pub search_term: Option<String>,
    pub user_agent: String,
    pub per_source: BTreeMap<String, FetchOutcome>,
    /// Filtered candidates, grouped by adapter in adapter order.
    pub all_candidates: Vec<CandidateListing>,
}

impl RunReport {
    pub fn any_source_answered(&self) -> bool {
        self.per_source.values().any(FetchOutcome::answered)
    }
}

/// One cell of a sheet column, with its 1-based row number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetCell {
    pub row: usize,
    pub value: String,
}

/// Targeted overwrite of a single cell. `row` is 1-based, `column` 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: usize,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::SourceError;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[test]
    fn test_identifier_rejects_blank() {
        assert!(Identifier::parse("   ").is_none());
        assert_eq!(id("  iPhone ").as_str(), "iPhone");
    }

    #[test]
    fn test_barcode_heuristic() {
        assert!(id("4549995423319").is_barcode());
        assert!(id("49012345").is_barcode());
        assert!(!id("1234567").is_barcode());
        assert!(!id("iPhone 13").is_barcode());
        assert!(!id("45499954233AB").is_barcode());
    }

    #[test]
    fn test_candidate_requires_name() {
        let ident = id("4549995423319");
        assert!(CandidateListing::new(&ident, "a", "  ", 100, "https://a").is_none());
        let c = CandidateListing::new(&ident, "a", " X 128GB ", 100, "https://a")
            .unwrap()
            .with_flag("used")
            .with_image_url(Some(String::new()));
        assert_eq!(c.raw_name(), "X 128GB");
        assert!(c.condition_flags().contains("used"));
        assert_eq!(c.image_url(), None);
    }

    #[test]
    fn test_outcome_from_result() {
        let ident = id("kw");
        let c = CandidateListing::new(&ident, "a", "x", 1, "u").unwrap();

        assert_eq!(
            FetchOutcome::from_result(Ok(vec![])),
            FetchOutcome::Empty(EmptyReason::NoListings)
        );
        assert_eq!(
            FetchOutcome::from_result(Ok(vec![c.clone()])),
            FetchOutcome::Success(vec![c])
        );
        assert_eq!(
            FetchOutcome::from_result(Err(SourceError::config_missing("no key"))),
            FetchOutcome::Empty(EmptyReason::NotConfigured)
        );
        assert_eq!(
            FetchOutcome::from_result(Err(SourceError::new(FailureKind::BlockedByHost, "403"))),
            FetchOutcome::Failure(FailureKind::BlockedByHost)
        );
    }

    #[test]
    fn test_answered_distinguishes_unconfigured() {
        assert!(FetchOutcome::Empty(EmptyReason::NoListings).answered());
        assert!(!FetchOutcome::Empty(EmptyReason::NotConfigured).answered());
        assert!(!FetchOutcome::Failure(FailureKind::Timeout).answered());
    }
}
