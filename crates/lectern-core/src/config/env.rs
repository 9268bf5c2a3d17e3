use std::str::FromStr;

use lectern_index::SearchMode;

use super::Config;

/// Parse `key` from the environment, warning about and ignoring bad values.
fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_services();
        self.apply_env_overrides_retrieval();
    }

    fn apply_env_overrides_services(&mut self) {
        if let Ok(v) = std::env::var("WEAVIATE_URL") {
            self.index.url = v;
        }
        if let Ok(v) = std::env::var("WEAVIATE_CLASS") {
            self.index.class_name = v;
        }
        if let Ok(v) = std::env::var("OLLAMA_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("OLLAMA_MODEL") {
            self.llm.model = v;
        }
        if let Some(secs) = parsed::<u64>("LECTERN_TIMEOUT_INDEX") {
            self.timeouts.index_seconds = secs;
        }
        if let Some(secs) = parsed::<u64>("LECTERN_TIMEOUT_LLM") {
            self.timeouts.llm_seconds = secs;
        }
    }

    fn apply_env_overrides_retrieval(&mut self) {
        if let Some(score) = parsed::<f32>("OOD_MIN_SCORE") {
            self.gate.min_score = score;
        }
        if let Some(sim) = parsed::<f32>("OOD_MIN_SIM") {
            self.gate.min_similarity = sim;
        }
        if let Some(overlap) = parsed::<f32>("MIN_OVERLAP") {
            self.gate.min_overlap = overlap;
        }
        if let Some(mode) = parsed::<SearchMode>("LECTERN_RETRIEVAL_MODE") {
            self.retrieval.mode = mode;
        }
        if let Some(k) = parsed::<usize>("LECTERN_RETRIEVAL_K") {
            self.retrieval.k = k;
        }
        if let Some(alpha) = parsed::<f32>("LECTERN_RETRIEVAL_ALPHA") {
            self.retrieval.alpha = alpha.clamp(0.0, 1.0);
        }
        if let Some(escalate) = parsed::<bool>("LECTERN_RETRIEVAL_ESCALATE") {
            self.retrieval.escalate = escalate;
        }
    }
}
