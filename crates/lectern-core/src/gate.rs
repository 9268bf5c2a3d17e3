//! Accept/reject decision over ranked retrieval hits.
//!
//! A query is answered when the best hit clears the threshold for its search
//! mode, or when one of the top three hits shares enough of the query's
//! informative words (the keyword-overlap valve). Setting `min_overlap` above
//! `1.0` makes the valve unreachable and leaves pure score gating.

use std::sync::LazyLock;

use lectern_index::{Hit, SearchMode};
use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]{4,}").expect("valid regex"));

/// Hits inspected by the overlap valve.
const OVERLAP_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Threshold for hybrid and BM25 scores.
    pub min_score: f32,
    /// Threshold for vector similarity.
    pub min_similarity: f32,
    /// Fraction of query words a top hit must contain to vouch for the query.
    pub min_overlap: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            min_similarity: 0.35,
            min_overlap: 0.12,
        }
    }
}

/// Evidence behind a gate verdict, kept for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    pub accepted: bool,
    /// Maximum score over all hits; `None` when there were none.
    pub best_score: Option<f32>,
    /// Highest overlap fraction among the top hits.
    pub best_overlap: f32,
    /// Threshold applied for the search mode.
    pub threshold: f32,
    pub by_score: bool,
    pub by_overlap: bool,
}

impl GateDecision {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match (self.best_score, self.by_score, self.by_overlap) {
            (None, _, _) => "no hits",
            (_, true, _) => "score above threshold",
            (_, false, true) => "keyword overlap",
            _ => "low retrieval confidence",
        }
    }
}

/// Immutable gate; thresholds are fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceGate {
    config: GateConfig,
}

impl ConfidenceGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Score threshold for hits produced in `mode`.
    #[must_use]
    pub fn threshold(&self, mode: SearchMode) -> f32 {
        match mode {
            SearchMode::Hybrid | SearchMode::Bm25 => self.config.min_score,
            SearchMode::Vector => self.config.min_similarity,
        }
    }

    #[must_use]
    pub fn accept(&self, hits: &[Hit], mode: SearchMode, query: &str) -> bool {
        self.evaluate(hits, mode, query).accepted
    }

    #[must_use]
    pub fn evaluate(&self, hits: &[Hit], mode: SearchMode, query: &str) -> GateDecision {
        let threshold = self.threshold(mode);
        let best_score = hits
            .iter()
            .map(|h| h.score)
            .filter(|s| !s.is_nan())
            .reduce(f32::max);

        let tokens = query_tokens(query);
        let best_overlap = hits
            .iter()
            .take(OVERLAP_WINDOW)
            .map(|h| overlap_fraction(&tokens, &h.chunk.chunk_text))
            .fold(0.0_f32, f32::max);

        let by_score = best_score.is_some_and(|best| best >= threshold);
        let by_overlap = !hits.is_empty() && !tokens.is_empty() && best_overlap >= self.config.min_overlap;

        let decision = GateDecision {
            accepted: !hits.is_empty() && (by_score || by_overlap),
            best_score,
            best_overlap,
            threshold,
            by_score,
            by_overlap,
        };
        tracing::debug!(
            %mode,
            hits = hits.len(),
            best_score = ?decision.best_score,
            best_overlap = decision.best_overlap,
            threshold,
            accepted = decision.accepted,
            reason = decision.reason(),
            "confidence gate"
        );
        decision
    }
}

/// Lowercase ASCII words of at least four letters in order of appearance.
/// Repeated words are kept, so each occurrence weighs in the overlap fraction.
#[must_use]
pub fn query_tokens(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    WORD.find_iter(&lowered).map(|word| word.as_str().to_owned()).collect()
}

/// Fraction of `tokens` found as substrings of the lowercased `text`. Zero for no tokens.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn overlap_fraction(tokens: &[String], text: &str) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let found = tokens.iter().filter(|t| text.contains(t.as_str())).count();
    found as f32 / tokens.len() as f32
}
