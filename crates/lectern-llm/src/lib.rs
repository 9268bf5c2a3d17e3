//! Completion-service abstraction and backend implementations.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod reasoning;

pub use error::LlmError;
pub use provider::CompletionProvider;
pub use reasoning::strip_reasoning;
