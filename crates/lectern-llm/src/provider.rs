use std::future::Future;

use crate::error::LlmError;

/// A blocking-style text completion backend: one prompt in, one reply out.
pub trait CompletionProvider: Send + Sync {
    /// Send a prompt and return the raw model reply.
    ///
    /// The reply is returned verbatim; reasoning markup is left for the caller
    /// to strip with [`crate::strip_reasoning`].
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached, rejects the request,
    /// or does not answer within its configured timeout.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Check that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not respond.
    fn health_check(&self) -> impl Future<Output = Result<(), LlmError>> + Send;

    fn name(&self) -> &str;
}
