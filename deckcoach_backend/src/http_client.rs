use std::time::Duration;

use anyhow::{Context, Result};

pub fn build_http_client() -> Result<reqwest::Client> {
    build_http_client_with_timeout(None)
}

/// Build the shared client. System proxy discovery is opt-in through
/// `DECKCOACH_ENABLE_SYSTEM_PROXY`; on failure we retry with `no_proxy`.
pub fn build_http_client_with_timeout(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let allow_system_proxy = std::env::var("DECKCOACH_ENABLE_SYSTEM_PROXY")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if allow_system_proxy {
        match guarded_build(|| attempt_build(timeout, false)) {
            Ok(client) => return Ok(client),
            Err(e) => tracing::warn!(
                "HTTP client initialization with system proxy discovery failed ({:#}); retrying with no_proxy",
                e
            ),
        }
    }

    guarded_build(|| attempt_build(timeout, true)).context("Failed to initialize HTTP client")
}

// Proxy discovery inside reqwest can panic on some platforms.
fn guarded_build<F>(build: F) -> Result<reqwest::Client>
where
    F: FnOnce() -> Result<reqwest::Client, reqwest::Error> + std::panic::UnwindSafe,
{
    match std::panic::catch_unwind(build) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => anyhow::bail!("HTTP client builder panicked"),
    }
}

fn attempt_build(
    timeout: Option<Duration>,
    no_proxy: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if no_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}
