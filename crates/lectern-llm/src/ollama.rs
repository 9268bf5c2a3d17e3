use std::time::Duration;

use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;

use crate::error::LlmError;
use crate::provider::CompletionProvider;

const DEFAULT_PORT: u16 = 11434;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every completion request; a slower reply is reported as [`LlmError::Timeout`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatMessageRequest::new(
            self.model.clone(),
            vec![ChatMessage::user(prompt.to_owned())],
        );

        let response = tokio::time::timeout(self.timeout, self.client.send_chat_messages(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: "ollama",
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| LlmError::Unavailable(format!("Ollama chat request failed: {e}")))?;

        tracing::debug!(
            model = %self.model,
            chars = response.message.content.len(),
            "ollama completion received"
        );
        Ok(response.message.content)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        tokio::time::timeout(self.timeout, self.client.list_local_models())
            .await
            .map_err(|_| LlmError::Timeout {
                provider: "ollama",
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                LlmError::Unavailable(format!("failed to connect to Ollama, is it running? {e}"))
            })?;
        Ok(())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), DEFAULT_PORT)
}
