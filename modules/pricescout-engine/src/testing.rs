// Test doubles for the engine's two capability seams:
// - MockFetcher (PageFetcher) — HashMap-based URL-substring → page/error
// - MockModel (CompletionModel) — canned replies routed by prompt kind
//
// Plus helpers for building toy site descriptors and catalogs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use ai_client::CompletionModel;
use pricescout_common::{SelectorSet, SiteDescriptor};

use crate::fetch::PageFetcher;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Page fetcher backed by a URL-substring table. Unregistered URLs error.
/// Builder pattern: `.on_page()`, `.failing()`, `.hanging()`.
pub struct MockFetcher {
    pages: HashMap<String, Result<String, String>>,
    hang: Vec<String>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            hang: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve `html` for any URL containing `fragment`.
    pub fn on_page(mut self, fragment: &str, html: &str) -> Self {
        self.pages
            .insert(fragment.to_string(), Ok(html.to_string()));
        self
    }

    /// Fail with `reason` for any URL containing `fragment`.
    pub fn failing(mut self, fragment: &str, reason: &str) -> Self {
        self.pages
            .insert(fragment.to_string(), Err(reason.to_string()));
        self
    }

    /// Never respond for any URL containing `fragment`, ignoring the
    /// timeout argument — exercises the caller-side deadline handling.
    pub fn hanging(mut self, fragment: &str) -> Self {
        self.hang.push(fragment.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.hang.iter().any(|fragment| url.contains(fragment)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Err(anyhow!("hang elapsed"));
        }

        for (fragment, outcome) in &self.pages {
            if url.contains(fragment) {
                return match outcome {
                    Ok(html) => Ok(html.clone()),
                    Err(reason) => Err(anyhow!("{reason}")),
                };
            }
        }
        Err(anyhow!("no fixture registered for {url}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

/// What the mock does when asked for a completion.
#[derive(Clone)]
pub enum ModelBehavior {
    /// Return this text.
    Reply(String),
    /// Fail with a transport-style error.
    Fail,
    /// Never respond, ignoring the timeout argument.
    Hang,
}

/// Completion model with separate behaviors for extraction prompts and
/// scoring prompts, plus per-name scoring overrides. Scoring prompts are
/// recognized by the rating instruction; everything else is extraction.
pub struct MockModel {
    extraction: ModelBehavior,
    scoring: ModelBehavior,
    scoring_by_name: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            extraction: ModelBehavior::Fail,
            scoring: ModelBehavior::Fail,
            scoring_by_name: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A model that fails every call — forces both fallbacks.
    pub fn offline() -> Self {
        Self::new()
    }

    /// A model that never answers — exercises sub-timeouts and deadlines.
    pub fn silent() -> Self {
        Self {
            extraction: ModelBehavior::Hang,
            scoring: ModelBehavior::Hang,
            scoring_by_name: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_extraction(mut self, behavior: ModelBehavior) -> Self {
        self.extraction = behavior;
        self
    }

    pub fn on_scoring(mut self, behavior: ModelBehavior) -> Self {
        self.scoring = behavior;
        self
    }

    /// Reply with `score` for scoring prompts that mention `name`.
    pub fn scoring_reply(self, name: &str, score: &str) -> Self {
        self.scoring_by_name
            .lock()
            .unwrap()
            .push((name.to_string(), score.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let is_scoring = prompt.contains("Rate how well");
        if is_scoring {
            let overrides = self.scoring_by_name.lock().unwrap().clone();
            for (name, score) in overrides {
                if prompt.contains(&name) {
                    return Ok(score);
                }
            }
        }

        let behavior = if is_scoring {
            &self.scoring
        } else {
            &self.extraction
        };
        match behavior {
            ModelBehavior::Reply(text) => Ok(text.clone()),
            ModelBehavior::Fail => Err(anyhow!("model offline")),
            ModelBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow!("hang elapsed"))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Descriptor helpers
// ---------------------------------------------------------------------------

/// A toy site whose URLs contain `host` and whose result pages use the
/// `.listing` / `.title` / `.price` / `a` structure from the fixtures.
pub fn test_site(name: &str, host: &str, country: &str) -> SiteDescriptor {
    SiteDescriptor {
        name: name.to_string(),
        base_url: format!("https://{host}"),
        search_path: "/search?q=".to_string(),
        countries: vec![country.to_string()],
        selectors: SelectorSet {
            product: ".listing".to_string(),
            title: ".title".to_string(),
            price: ".price".to_string(),
            link: "a".to_string(),
            currency: None,
        },
        headers: Vec::new(),
        rate_limit_ms: 100,
    }
}

/// A result page with one `.listing` block per (title, price) pair.
pub fn listing_page(rows: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (i, (title, price)) in rows.iter().enumerate() {
        body.push_str(&format!(
            r#"<div class="listing"><a href="/p/{i}"><span class="title">{title}</span></a><span class="price">{price}</span></div>"#
        ));
    }
    format!("<html><body>{body}</body></html>")
}
