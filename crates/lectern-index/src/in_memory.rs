//! Process-local chunk index for tests and offline runs.
//!
//! `bm25` uses Okapi BM25, `vector` uses cosine similarity between term
//! frequency vectors (reported as a distance, as a vector database would), and
//! `hybrid` fuses the two with relative-score fusion weighted by `alpha`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::IndexError;
use crate::store::{BoxFuture, ChunkIndex};
use crate::types::{Chunk, ScoredChunk, SearchMode, SearchRequest};

const K1: f32 = 1.2;
const B: f32 = 0.75;

pub struct InMemoryIndex {
    class_name: String,
    /// `None` until the class is created.
    chunks: RwLock<Option<Vec<Chunk>>>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            chunks: RwLock::new(None),
        }
    }

    fn missing(&self) -> IndexError {
        IndexError::MissingClass(self.class_name.clone())
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new("TutorialChunk")
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f32> {
    let mut tf = HashMap::new();
    for token in tokens {
        *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Searchable text of a chunk, matching the properties queried remotely.
fn searchable(chunk: &Chunk) -> Vec<String> {
    let mut tokens = tokenize(&chunk.chunk_text);
    tokens.extend(tokenize(&chunk.page_title));
    tokens.extend(tokenize(&chunk.toc_title));
    tokens
}

fn cosine_similarity(a: &HashMap<&str, f32>, b: &HashMap<&str, f32>) -> f32 {
    let dot: f32 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[allow(clippy::cast_precision_loss)]
fn bm25_scores(query: &[String], docs: &[Vec<String>]) -> Vec<f32> {
    let n = docs.len() as f32;
    let avgdl = docs.iter().map(Vec::len).sum::<usize>() as f32 / n.max(1.0);
    let mut terms: Vec<&str> = query.iter().map(String::as_str).collect();
    terms.sort_unstable();
    terms.dedup();

    let tfs: Vec<HashMap<&str, f32>> = docs.iter().map(|d| term_frequencies(d)).collect();
    let idf: Vec<f32> = terms
        .iter()
        .map(|term| {
            let df = tfs.iter().filter(|tf| tf.contains_key(term)).count() as f32;
            (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
        })
        .collect();

    docs.iter()
        .zip(&tfs)
        .map(|(doc, tf)| {
            let dl = doc.len() as f32;
            terms
                .iter()
                .zip(&idf)
                .map(|(term, idf)| {
                    let f = tf.get(term).copied().unwrap_or(0.0);
                    idf * f * (K1 + 1.0) / (f + K1 * (1.0 - B + B * dl / avgdl.max(f32::EPSILON)))
                })
                .sum()
        })
        .collect()
}

fn vector_similarities(query: &[String], docs: &[Vec<String>]) -> Vec<f32> {
    let q = term_frequencies(query);
    docs.iter()
        .map(|d| cosine_similarity(&q, &term_frequencies(d)))
        .collect()
}

/// Scale to [0, 1] by the maximum; all-zero input stays zero.
fn relative(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(0.0_f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| s / max).collect()
}

fn rank(chunks: &[Chunk], request: &SearchRequest) -> Vec<ScoredChunk> {
    let query = tokenize(&request.query);
    let docs: Vec<Vec<String>> = chunks.iter().map(searchable).collect();

    let scored: Vec<(usize, f32, ScoredChunk)> = match request.mode {
        SearchMode::Bm25 => bm25_scores(&query, &docs)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .map(|(i, score)| {
                let hit = ScoredChunk {
                    chunk: chunks[i].clone(),
                    score: Some(score),
                    distance: None,
                };
                (i, score, hit)
            })
            .collect(),
        SearchMode::Vector => vector_similarities(&query, &docs)
            .into_iter()
            .enumerate()
            .map(|(i, similarity)| {
                let hit = ScoredChunk {
                    chunk: chunks[i].clone(),
                    score: None,
                    distance: Some(1.0 - similarity),
                };
                (i, similarity, hit)
            })
            .collect(),
        SearchMode::Hybrid => {
            let alpha = request.alpha.clamp(0.0, 1.0);
            let lexical = relative(&bm25_scores(&query, &docs));
            let semantic = relative(&vector_similarities(&query, &docs));
            lexical
                .into_iter()
                .zip(semantic)
                .enumerate()
                .map(|(i, (l, s))| {
                    let score = alpha * s + (1.0 - alpha) * l;
                    let hit = ScoredChunk {
                        chunk: chunks[i].clone(),
                        score: Some(score),
                        distance: None,
                    };
                    (i, score, hit)
                })
                .collect()
        }
    };

    let mut scored = scored;
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(request.k)
        .map(|(_, _, hit)| hit)
        .collect()
}

impl ChunkIndex for InMemoryIndex {
    fn health_check(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move { Ok(()) })
    }

    fn recreate(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let mut chunks = self
                .chunks
                .write()
                .map_err(|e| IndexError::Other(e.to_string()))?;
            *chunks = Some(Vec::new());
            Ok(())
        })
    }

    fn drop_class(&self) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let mut chunks = self
                .chunks
                .write()
                .map_err(|e| IndexError::Other(e.to_string()))?;
            *chunks = None;
            Ok(())
        })
    }

    fn insert_batch(&self, batch: Vec<Chunk>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let mut chunks = self
                .chunks
                .write()
                .map_err(|e| IndexError::Other(e.to_string()))?;
            let stored = chunks.as_mut().ok_or_else(|| self.missing())?;
            stored.extend(batch);
            Ok(())
        })
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, Result<Vec<ScoredChunk>, IndexError>> {
        Box::pin(async move {
            let chunks = self
                .chunks
                .read()
                .map_err(|e| IndexError::Other(e.to_string()))?;
            let stored = chunks.as_ref().ok_or_else(|| self.missing())?;
            Ok(rank(stored, &request))
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, IndexError>> {
        Box::pin(async move {
            let chunks = self
                .chunks
                .read()
                .map_err(|e| IndexError::Other(e.to_string()))?;
            let stored = chunks.as_ref().ok_or_else(|| self.missing())?;
            Ok(stored.len() as u64)
        })
    }
}
