use crate::domain::model::CandidateListing;

/// Substrings marking a listing as unusable: junk condition, no stock, or
/// sold without warranty.
pub const DEFAULT_EXCLUSION_PATTERNS: [&str; 12] = [
    "junk",
    "ジャンク",
    "sold out",
    "売り切れ",
    "売切",
    "在庫なし",
    "品切れ",
    "no warranty",
    "保証なし",
    "動作未確認",
    "部品取り",
    "難あり",
];

/// Read-only, shared for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    patterns: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUSION_PATTERNS)
    }
}

impl ExclusionRules {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }

    pub fn excludes(&self, candidate: &CandidateListing) -> bool {
        candidate.price() == 0
            || self.matches(candidate.raw_name())
            || candidate.condition_flags().iter().any(|f| self.matches(f))
    }

    /// Returns the surviving candidates in their original relative order.
    pub fn filter(&self, candidates: &[CandidateListing]) -> Vec<CandidateListing> {
        candidates
            .iter()
            .filter(|c| {
                let dropped = self.excludes(c);
                if dropped {
                    tracing::debug!(
                        source = c.source_name(),
                        price = c.price(),
                        "Filtered out listing: {}",
                        c.raw_name()
                    );
                }
                !dropped
            })
            .cloned()
            .collect()
    }
}
