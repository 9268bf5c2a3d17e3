//! Mode dispatch and score normalisation over a [`ChunkIndex`].

use std::sync::Arc;
use std::time::Duration;

use crate::store::ChunkIndex;
use crate::types::{Hit, ScoredChunk, SearchMode, SearchRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The index could not be reached, errored, or did not answer in time.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),
}

/// Issues searches and returns hits ranked by a single comparable `score`.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn ChunkIndex>,
    timeout: Duration,
}

impl Retriever {
    #[must_use]
    pub fn new(index: Arc<dyn ChunkIndex>) -> Self {
        Self {
            index,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound each search; a slower index is reported as unavailable.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search `k` hits in `mode`. `alpha` weights the semantic side of hybrid search.
    ///
    /// Results are sorted by descending score and never longer than `k`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Unavailable`] if the index fails or times out.
    pub async fn retrieve(
        &self,
        query: &str,
        mode: SearchMode,
        k: usize,
        alpha: f32,
    ) -> Result<Vec<Hit>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let request = SearchRequest {
            query: query.to_owned(),
            mode,
            k,
            alpha: alpha.clamp(0.0, 1.0),
        };
        let raw = tokio::time::timeout(self.timeout, self.index.search(request))
            .await
            .map_err(|_| {
                RetrievalError::Unavailable(format!(
                    "index search timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let mut hits: Vec<Hit> = raw.into_iter().map(|scored| into_hit(scored, mode)).collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        tracing::debug!(
            %mode,
            k,
            hits = hits.len(),
            top = hits.first().map(|h| h.score),
            "retrieval complete"
        );
        Ok(hits)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn into_hit(scored: ScoredChunk, mode: SearchMode) -> Hit {
    Hit {
        score: normalize_score(scored.score, scored.distance),
        chunk: scored.chunk,
        mode,
    }
}

/// The native score when present, else similarity derived from distance, else zero.
#[must_use]
pub fn normalize_score(score: Option<f32>, distance: Option<f32>) -> f32 {
    match (score, distance) {
        (Some(score), _) if score.is_finite() => score,
        (_, Some(distance)) if distance.is_finite() => (1.0 - distance).clamp(0.0, 1.0),
        _ => 0.0,
    }
}
