//! Shared HTTP client construction for index backends.

use std::time::Duration;

/// Create an HTTP client bounded by `timeout` per request.
///
/// Config: 10s connect timeout, rustls TLS, `lectern/{version}` user-agent,
/// redirect limit 10.
#[must_use]
pub fn default_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}
