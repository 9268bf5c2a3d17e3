use std::future::Future;
use std::time::Duration;

use crate::error::IndexError;

const BASE_BACKOFF_SECS: u64 = 1;

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(16))
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
}

/// Send an HTTP request, retrying up to `max_retries` times while the index answers
/// 429 or 503.
///
/// # Errors
///
/// Returns `IndexError::RateLimited` once all attempts are exhausted, or the
/// underlying transport error as `IndexError::Http`.
pub(crate) async fn send_with_retry<F, Fut>(
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, IndexError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = f().await?;
        let status = response.status();

        if is_retryable(status) {
            if attempt == max_retries {
                return Err(IndexError::RateLimited);
            }
            let delay = retry_delay(&response, attempt);
            tracing::warn!(
                status = status.as_u16(),
                "index busy, retrying in {}s ({}/{})",
                delay.as_secs(),
                attempt + 1,
                max_retries
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        return Ok(response);
    }

    Err(IndexError::RateLimited)
}
