//! Retrieve, gate, and answer a single question.

use std::fmt;

use lectern_index::{Hit, Retriever, SearchMode};
use lectern_llm::{CompletionProvider, LlmError, strip_reasoning};

use crate::config::Config;
use crate::gate::{ConfidenceGate, GateDecision};
use crate::prompt;

/// Reply when retrieval gives no confident evidence.
pub const OOD_REPLY: &str = "I don't know.";

/// Reply when the completion service fails.
pub const UNAVAILABLE_REPLY: &str = "The answer service is unavailable right now. Please try again.";

/// Reply when the model returns nothing usable twice.
pub const EMPTY_REPLY: &str =
    "Sorry, I couldn't put together an answer from the sources. Please try rephrasing the question.";

/// Upper bound on `k` for the widened retry.
const ESCALATED_K_CAP: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Answered,
    /// The gate (or the model itself) found no sufficient evidence.
    Rejected { reason: &'static str },
    /// The index could not be searched; treated as a rejection.
    RetrievalUnavailable(String),
    GenerationFailed(String),
    /// The model returned no usable text, even after the short retry.
    NoAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    /// Mode and `k` of the last retrieval attempt.
    pub mode: SearchMode,
    pub k: usize,
    pub alpha: f32,
    pub hits: usize,
    pub best_score: Option<f32>,
    pub best_overlap: f32,
    pub accepted: bool,
    pub attempts: usize,
}

impl Diagnostics {
    fn new(mode: SearchMode, k: usize, alpha: f32) -> Self {
        Self {
            mode,
            k,
            alpha,
            hits: 0,
            best_score: None,
            best_overlap: 0.0,
            accepted: false,
            attempts: 0,
        }
    }

    fn record(&mut self, mode: SearchMode, k: usize, hits: usize, decision: &GateDecision) {
        self.mode = mode;
        self.k = k;
        self.hits = hits;
        self.best_score = decision.best_score;
        self.best_overlap = decision.best_overlap;
        self.accepted = decision.accepted;
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={} k={} alpha={:.2} hits={} best=",
            self.mode, self.k, self.alpha, self.hits
        )?;
        match self.best_score {
            Some(best) => write!(f, "{best:.3}")?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            " overlap={:.2} accepted={} attempts={}",
            self.best_overlap, self.accepted, self.attempts
        )
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub outcome: Outcome,
    /// User-facing text.
    pub text: String,
    /// Hits of the last retrieval attempt.
    pub hits: Vec<Hit>,
    /// Source listing; empty unless the question was answered.
    pub sources: String,
    pub diagnostics: Diagnostics,
}

impl Answer {
    fn without_sources(outcome: Outcome, text: &str, hits: Vec<Hit>, diagnostics: Diagnostics) -> Self {
        Self {
            outcome,
            text: text.to_owned(),
            hits,
            sources: String::new(),
            diagnostics,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.outcome == Outcome::Answered
    }
}

/// Per-question defaults taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerSettings {
    pub mode: SearchMode,
    pub k: usize,
    pub alpha: f32,
    pub escalate: bool,
    pub require_citation: bool,
    pub max_context_chars: usize,
}

impl AnswerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.retrieval.mode,
            k: config.retrieval.k,
            alpha: config.retrieval.alpha,
            escalate: config.retrieval.escalate,
            require_citation: config.answer.require_citation,
            max_context_chars: config.answer.max_context_chars,
        }
    }
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Answerer<P> {
    retriever: Retriever,
    gate: ConfidenceGate,
    provider: P,
    settings: AnswerSettings,
}

impl<P: CompletionProvider> Answerer<P> {
    #[must_use]
    pub fn new(retriever: Retriever, gate: ConfidenceGate, provider: P, settings: AnswerSettings) -> Self {
        Self {
            retriever,
            gate,
            provider,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Answer with the configured mode, `k`, and `alpha`.
    pub async fn ask(&self, question: &str) -> Answer {
        let AnswerSettings { mode, k, alpha, .. } = self.settings;
        self.ask_with(question, mode, k, alpha).await
    }

    /// Answer a question. Never fails: infrastructure errors become outcomes
    /// with their own user-facing text.
    pub async fn ask_with(&self, question: &str, mode: SearchMode, k: usize, alpha: f32) -> Answer {
        let question = question.trim();
        let mut diagnostics = Diagnostics::new(mode, k, alpha);
        if question.is_empty() {
            return Answer::without_sources(
                Outcome::Rejected { reason: "empty question" },
                OOD_REPLY,
                Vec::new(),
                diagnostics,
            );
        }

        let mut last_hits = Vec::new();
        let mut last_reason = "no hits";
        for (mode, k) in self.attempts(mode, k) {
            diagnostics.attempts += 1;
            let hits = match self.retriever.retrieve(question, mode, k, alpha).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::error!(%mode, k, "retrieval failed: {e}");
                    return Answer::without_sources(
                        Outcome::RetrievalUnavailable(e.to_string()),
                        OOD_REPLY,
                        Vec::new(),
                        diagnostics,
                    );
                }
            };

            let decision = self.gate.evaluate(&hits, mode, question);
            diagnostics.record(mode, k, hits.len(), &decision);
            if decision.accepted {
                return self.generate(question, hits, diagnostics).await;
            }
            last_reason = decision.reason();
            last_hits = hits;
        }

        tracing::info!(reason = last_reason, attempts = diagnostics.attempts, "question rejected");
        Answer::without_sources(
            Outcome::Rejected { reason: last_reason },
            OOD_REPLY,
            last_hits,
            diagnostics,
        )
    }

    /// Retrieval attempts in order: the requested mode at `k`, then, when
    /// escalating, a wider `k` and each remaining mode.
    fn attempts(&self, mode: SearchMode, k: usize) -> Vec<(SearchMode, usize)> {
        if !self.settings.escalate {
            return vec![(mode, k)];
        }
        let wider = (2 * k).min(ESCALATED_K_CAP);
        let modes = std::iter::once(mode).chain(SearchMode::ALL.into_iter().filter(|m| *m != mode));

        let mut attempts = Vec::new();
        for m in modes {
            attempts.push((m, k));
            if wider > k {
                attempts.push((m, wider));
            }
        }
        attempts
    }

    async fn generate(&self, question: &str, hits: Vec<Hit>, diagnostics: Diagnostics) -> Answer {
        let context = prompt::context_blocks(&hits, self.settings.max_context_chars);

        let mut text = match self.complete(&prompt::answer_prompt(question, &context)).await {
            Ok(text) => text,
            Err(e) => return Self::generation_failed(&e, hits, diagnostics),
        };
        if text.is_empty() {
            tracing::warn!("empty completion, retrying with a brief prompt");
            text = match self.complete(&prompt::retry_prompt(question, &context)).await {
                Ok(text) => text,
                Err(e) => return Self::generation_failed(&e, hits, diagnostics),
            };
        }

        if text.is_empty() {
            tracing::warn!("empty completion after retry");
            return Answer::without_sources(Outcome::NoAnswer, EMPTY_REPLY, hits, diagnostics);
        }
        if text.trim_end_matches('.').eq_ignore_ascii_case(OOD_REPLY.trim_end_matches('.')) {
            tracing::info!("model found no answer in the sources");
            return Answer::without_sources(
                Outcome::Rejected {
                    reason: "model found no answer",
                },
                OOD_REPLY,
                hits,
                diagnostics,
            );
        }
        if self.settings.require_citation && !prompt::has_citation(&text) {
            text.push_str(" [1]");
        }

        Answer {
            outcome: Outcome::Answered,
            text,
            sources: prompt::sources_listing(&hits),
            hits,
            diagnostics,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let raw = self.provider.complete(prompt).await?;
        Ok(strip_reasoning(&raw))
    }

    fn generation_failed(error: &LlmError, hits: Vec<Hit>, diagnostics: Diagnostics) -> Answer {
        tracing::error!("completion failed: {error}");
        Answer::without_sources(
            Outcome::GenerationFailed(error.to_string()),
            UNAVAILABLE_REPLY,
            hits,
            diagnostics,
        )
    }
}
