use lectern_index::{ChunkerConfig, SearchMode};
use serde::{Deserialize, Serialize};

use crate::gate::GateConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_index_url() -> String {
    "http://localhost:8080".into()
}

fn default_class_name() -> String {
    "TutorialChunk".into()
}

fn default_vectorizer() -> String {
    "text2vec-transformers".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default = "default_class_name")]
    pub class_name: String,
    #[serde(default = "default_vectorizer")]
    pub vectorizer: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            class_name: default_class_name(),
            vectorizer: default_vectorizer(),
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".into()
}

fn default_llm_model() -> String {
    "deepseek-r1:1.5b".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            model: default_llm_model(),
        }
    }
}

fn default_k() -> usize {
    10
}

fn default_alpha() -> f32 {
    0.4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Hybrid blend weight: 0 is pure BM25, 1 is pure vector.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Retry a rejected question with a wider `k` and the other modes.
    #[serde(default)]
    pub escalate: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            k: default_k(),
            alpha: default_alpha(),
            escalate: false,
        }
    }
}

fn default_src() -> String {
    "data".into()
}

fn default_patterns() -> Vec<String> {
    [
        "**/*.md",
        "**/*.markdown",
        "**/*.html",
        "**/*.htm",
        "**/*.json",
        "**/*.jsonl",
        "**/*.ndjson",
        "**/*.txt",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_batch_size() -> usize {
    200
}

fn default_concurrency() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_src")]
    pub src: String,
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            patterns: default_patterns(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_require_citation() -> bool {
    true
}

fn default_max_context_chars() -> usize {
    6000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerConfig {
    #[serde(default = "default_require_citation")]
    pub require_citation: bool,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            require_citation: default_require_citation(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_index_timeout() -> u64 {
    30
}

fn default_llm_timeout() -> u64 {
    180
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_index_timeout")]
    pub index_seconds: u64,
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            index_seconds: default_index_timeout(),
            llm_seconds: default_llm_timeout(),
        }
    }
}
