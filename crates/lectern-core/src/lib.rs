//! Configuration, the retrieval confidence gate, and the answer path.

pub mod answer;
pub mod config;
pub mod gate;
pub mod prompt;

pub use answer::{Answer, AnswerSettings, Answerer, Diagnostics, Outcome};
pub use config::Config;
pub use gate::{ConfidenceGate, GateConfig, GateDecision};
