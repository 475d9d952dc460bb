use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

// --- PageFetcher trait ---

/// Capability: fetch one result page as HTML.
///
/// Implementations must return within `timeout` — the orchestrator relies
/// on this to keep the overall search deadline. Any non-success outcome
/// (network error, non-HTML body, timeout) is an error; the caller turns
/// it into a per-site failure, never a search failure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<String>;

    fn name(&self) -> &str;
}

// --- HTTP fetcher ---

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<String> {
        debug!(url, "Fetching page");

        let mut request = self.http.get(url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("unexpected HTTP status {status} from {url}"));
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.contains("html") && !content_type.contains("text") {
                return Err(anyhow!("non-HTML response ({content_type}) from {url}"));
            }
        }

        Ok(response.text().await?)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// --- Per-site rate gate ---

/// Enforces each site's minimum inter-request delay. Callers reserve a
/// slot under the lock, then sleep outside it, so two tasks hitting the
/// same site are spaced out without delaying requests to other sites.
pub struct RateGate {
    reservations: Mutex<HashMap<String, Instant>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            reservations: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `site` is allowed, honoring `min_delay`
    /// since the previous reservation for the same site.
    pub async fn pause(&self, site: &str, min_delay: Duration) {
        let ready_at = {
            let mut reservations = self.reservations.lock().await;
            let now = Instant::now();
            let ready_at = match reservations.get(site) {
                Some(previous) => (*previous + min_delay).max(now),
                None => now,
            };
            reservations.insert(site.to_string(), ready_at);
            ready_at
        };
        tokio::time::sleep_until(ready_at).await;
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_request_to_same_site_waits_out_the_delay() {
        let gate = RateGate::new();
        let start = Instant::now();

        gate.pause("Amazon US", Duration::from_millis(2000)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.pause("Amazon US", Duration::from_millis(2000)).await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn different_sites_do_not_delay_each_other() {
        let gate = RateGate::new();
        let start = Instant::now();

        gate.pause("Amazon US", Duration::from_millis(2000)).await;
        gate.pause("eBay US", Duration::from_millis(2000)).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
