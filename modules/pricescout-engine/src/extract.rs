//! Per-site offer extraction: LLM-first with a structural selector fallback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

use ai_client::util::strip_code_blocks;
use ai_client::CompletionModel;
use pricescout_common::price::{normalize_price, resolve_currency};
use pricescout_common::{Offer, SearchError, SiteDescriptor, SiteOutcome};

use crate::content::condense_listing;
use crate::fetch::{PageFetcher, RateGate};

/// Per-request fetch timeout, independent of and shorter than the overall
/// search deadline.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Sub-timeout for one extraction completion call.
pub const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(15);
/// Cap on offers accepted from one LLM extraction.
pub const MAX_LLM_OFFERS: usize = 25;
/// Cap on offers accepted from the selector fallback.
pub const MAX_FALLBACK_OFFERS: usize = 10;
/// Items below this extraction-supplied confidence are discarded.
pub const MIN_EXTRACTION_CONFIDENCE: f64 = 0.3;
/// Confidence assigned to fallback-extracted offers, which arrive unscored.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const NOISE_PHRASES: &[&str] = &[
    "shop on ebay",
    "visit store",
    "see all results",
    "more items",
    "sponsored",
    "advertisement",
    "shop now",
    "view all",
    "browse",
    "search results",
];

/// One product as the model returns it, per the JSON contract in the prompt.
#[derive(Debug, Deserialize)]
struct ExtractedProduct {
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    products: Vec<ExtractedProduct>,
}

pub struct OfferExtractor {
    model: Arc<dyn CompletionModel>,
    fetcher: Arc<dyn PageFetcher>,
    gate: RateGate,
}

impl OfferExtractor {
    pub fn new(model: Arc<dyn CompletionModel>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            model,
            fetcher,
            gate: RateGate::new(),
        }
    }

    /// Run one site's extraction under the shared deadline. Never raises:
    /// failures ride inside the outcome so no site can sink the search.
    pub async fn extract_site(
        &self,
        site: &SiteDescriptor,
        query: &str,
        country: &str,
        deadline: Instant,
    ) -> SiteOutcome {
        let url = site.search_url(query);

        self.gate
            .pause(&site.name, Duration::from_millis(site.rate_limit_ms))
            .await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return SiteOutcome::failed(&site.name, SearchError::DeadlineExceeded.to_string());
        }

        let html = match self
            .fetcher
            .fetch(&url, &site.headers, FETCH_TIMEOUT.min(remaining))
            .await
        {
            Ok(html) => html,
            Err(e) => {
                warn!(site = %site.name, url, error = %e, "Fetch failed");
                let failure = SearchError::SiteFetch {
                    site: site.name.clone(),
                    reason: e.to_string(),
                };
                return SiteOutcome::failed(&site.name, failure.to_string());
            }
        };

        let content = condense_listing(&html);
        if !content.is_empty() {
            match self
                .extract_with_model(&content, site, query, country, deadline)
                .await
            {
                Ok(offers) => {
                    info!(site = %site.name, count = offers.len(), "LLM extraction complete");
                    return SiteOutcome {
                        site: site.name.clone(),
                        offers,
                        error: None,
                    };
                }
                Err(e) => {
                    warn!(site = %site.name, error = %e, "LLM extraction failed, using selector fallback");
                }
            }
        }

        let offers = extract_with_selectors(&html, site, country);
        info!(site = %site.name, count = offers.len(), "Selector extraction complete");
        SiteOutcome {
            site: site.name.clone(),
            offers,
            error: None,
        }
    }

    async fn extract_with_model(
        &self,
        content: &str,
        site: &SiteDescriptor,
        query: &str,
        country: &str,
        deadline: Instant,
    ) -> Result<Vec<Offer>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("no deadline headroom left for extraction");
        }
        let timeout = EXTRACTION_TIMEOUT.min(remaining);

        let prompt = extraction_prompt(content, query, country, &site.name);
        let response = tokio::time::timeout(timeout, self.model.complete(&prompt, timeout))
            .await
            .map_err(|_| anyhow!("extraction call timed out"))??;

        let reply: ExtractionReply = serde_json::from_str(strip_code_blocks(&response))
            .map_err(|e| SearchError::ExtractionParse(e.to_string()))?;

        let mut offers = Vec::new();
        for product in reply.products {
            let title = product.title.trim();
            if title.is_empty() || is_generic_name(title) {
                continue;
            }
            let Some(price) = normalize_price(&product.price) else {
                continue;
            };
            if product.confidence < MIN_EXTRACTION_CONFIDENCE {
                continue;
            }
            let currency =
                resolve_currency(product.currency.as_deref(), country, &product.price);
            offers.push(Offer {
                product_name: title.to_string(),
                price,
                currency,
                link: resolve_link(&site.base_url, &product.link),
                site: site.name.clone(),
                country: country.to_string(),
                confidence: product.confidence.clamp(0.0, 1.0),
                fetched_at: Utc::now(),
            });
            if offers.len() >= MAX_LLM_OFFERS {
                break;
            }
        }
        Ok(offers)
    }
}

/// Structural extraction using the descriptor's selectors. Deterministic:
/// the same document and descriptor always yield the same offers.
pub fn extract_with_selectors(html: &str, site: &SiteDescriptor, country: &str) -> Vec<Offer> {
    let document = Html::parse_document(html);
    let Ok(product_sel) = Selector::parse(&site.selectors.product) else {
        return Vec::new();
    };
    let title_sel = Selector::parse(&site.selectors.title).ok();
    let price_sel = Selector::parse(&site.selectors.price).ok();
    let link_sel = Selector::parse(&site.selectors.link).ok();

    let mut offers = Vec::new();
    for block in document.select(&product_sel) {
        if offers.len() >= MAX_FALLBACK_OFFERS {
            break;
        }

        let title = title_sel
            .as_ref()
            .and_then(|s| block.select(s).next())
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if title.is_empty() || is_generic_name(&title) {
            continue;
        }

        let raw_price = price_sel
            .as_ref()
            .and_then(|s| block.select(s).next())
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        let Some(price) = normalize_price(&raw_price) else {
            continue;
        };

        let href = link_sel
            .as_ref()
            .and_then(|s| block.select(s).next())
            .and_then(|el| el.value().attr("href"))
            .unwrap_or_default();

        offers.push(Offer {
            product_name: title,
            price,
            currency: resolve_currency(None, country, &raw_price),
            link: resolve_link(&site.base_url, href),
            site: site.name.clone(),
            country: country.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            fetched_at: Utc::now(),
        });
    }
    offers
}

/// Reject boilerplate pseudo-listings: navigation labels, ad slots, and
/// names too short to be a product.
pub fn is_generic_name(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    if lower.len() < 10 {
        return true;
    }
    NOISE_PHRASES.iter().any(|term| lower.contains(term))
}

/// Resolve a possibly-relative link against the site's base address.
fn resolve_link(base_url: &str, href: &str) -> String {
    if href.is_empty() {
        return base_url.to_string();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/')),
    }
}

fn extraction_prompt(content: &str, query: &str, country: &str, site_name: &str) -> String {
    format!(
        r#"You are an expert e-commerce product extractor. Extract up to {MAX_LLM_OFFERS} relevant products from this webpage content that match the search query.

Search Query: "{query}"
Country: {country}
Website: {site_name}

Webpage Content:
{content}

Extract products in this exact JSON format:
{{
  "products": [
    {{
      "title": "Product name",
      "price": "numeric price only (no currency symbols)",
      "currency": "USD/INR/GBP/EUR/etc",
      "link": "relative or absolute URL",
      "confidence": 0.95
    }}
  ]
}}

Rules:
1. Only include products that actually match the search query
2. Extract exact product names from the content
3. Clean price to numbers only (remove currency symbols, commas)
4. Include relative URLs starting with / or absolute URLs
5. Confidence 0.9-1.0 for exact matches, 0.7-0.8 for good matches, 0.5-0.6 for related
6. Skip ads, navigation links, and irrelevant content
7. Focus on actual product listings with prices
8. Maximum {MAX_LLM_OFFERS} products

Respond only with valid JSON, no explanation."#
    )
}
