use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::price;

// --- Site catalog types ---

/// CSS selectors for pulling product blocks out of a site's result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSet {
    pub product: String,
    pub title: String,
    pub price: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Static configuration for one retail site. Loaded once at startup and
/// shared read-only across every concurrent fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDescriptor {
    pub name: String,
    pub base_url: String,
    pub search_path: String,
    pub countries: Vec<String>,
    pub selectors: SelectorSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// Minimum delay between consecutive requests to this site, in ms.
    pub rate_limit_ms: u64,
}

impl SiteDescriptor {
    pub fn supports_country(&self, country: &str) -> bool {
        self.countries.iter().any(|c| c == country)
    }

    /// Build the search URL by escaping the query into the search-path
    /// template.
    pub fn search_url(&self, query: &str) -> String {
        let escaped = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        format!("{}{}{}", self.base_url, self.search_path, escaped)
    }
}

// --- Offers ---

/// One extracted product offer. `confidence` starts at the extractor's
/// estimate (or zero) and is written exactly once more by the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub product_name: String,
    /// Normalized numeric price text ("1299.00"), kept as text since sites
    /// disagree on precision. Parse with [`Offer::price_value`] for sorting.
    pub price: String,
    pub currency: String,
    pub link: String,
    pub site: String,
    pub country: String,
    #[serde(default)]
    pub confidence: f64,
    pub fetched_at: DateTime<Utc>,
}

impl Offer {
    /// Numeric price, if the normalized text parses. Malformed prices are
    /// ranked last, never a crash.
    pub fn price_value(&self) -> Option<f64> {
        price::parse_price(&self.price)
    }
}

/// Result of one site's extraction attempt. Failures are carried as data,
/// never raised past the per-site task.
#[derive(Debug, Clone)]
pub struct SiteOutcome {
    pub site: String,
    pub offers: Vec<Offer>,
    pub error: Option<String>,
}

impl SiteOutcome {
    pub fn failed(site: &str, reason: impl Into<String>) -> Self {
        Self {
            site: site.to_string(),
            offers: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRequest {
    pub country: String,
    pub query: String,
}

/// Final ranked response: sorted by confidence descending, ties broken by
/// ascending numeric price, unparsable prices last.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Offer>,
    pub query: String,
    pub country: String,
    pub count: usize,
}

/// Incremental progress for the streaming search path. Ordered per site,
/// unordered across sites; consumed exactly once by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Searching {
        query: String,
        country: String,
        sites: usize,
    },
    SiteStarted {
        site: String,
    },
    SiteCompleted {
        site: String,
        offers: Vec<Offer>,
        count: usize,
    },
    SiteFailed {
        site: String,
        reason: String,
    },
    SearchCompleted {
        query: String,
        country: String,
        total: usize,
        timed_out: bool,
    },
}

impl ProgressEvent {
    /// The wire tag, used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Searching { .. } => "searching",
            ProgressEvent::SiteStarted { .. } => "site_started",
            ProgressEvent::SiteCompleted { .. } => "site_completed",
            ProgressEvent::SiteFailed { .. } => "site_failed",
            ProgressEvent::SearchCompleted { .. } => "search_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn descriptor() -> SiteDescriptor {
        SiteDescriptor {
            name: "Amazon US".to_string(),
            base_url: "https://www.amazon.com".to_string(),
            search_path: "/s?k=".to_string(),
            countries: vec!["US".to_string()],
            selectors: SelectorSet {
                product: ".s-result".to_string(),
                title: "h2".to_string(),
                price: ".price".to_string(),
                link: "a".to_string(),
                currency: None,
            },
            headers: Vec::new(),
            rate_limit_ms: 2000,
        }
    }

    #[test]
    fn search_url_escapes_the_query() {
        let url = descriptor().search_url("iPhone 15 128GB");
        assert_eq!(url, "https://www.amazon.com/s?k=iPhone%2015%20128GB");
    }

    #[test]
    fn country_support_is_exact_match() {
        let site = descriptor();
        assert!(site.supports_country("US"));
        assert!(!site.supports_country("ZZ"));
        assert!(!site.supports_country("us"));
    }

    #[test]
    fn progress_events_serialize_with_a_type_tag() {
        let event = ProgressEvent::SiteFailed {
            site: "eBay US".to_string(),
            reason: "connection refused".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "site_failed");
        assert_eq!(value["site"], "eBay US");
        assert_eq!(event.kind(), "site_failed");
    }

    #[test]
    fn offers_serialize_camel_case() {
        let offer = Offer {
            product_name: "Apple iPhone 15 - 128GB Black".to_string(),
            price: "799.00".to_string(),
            currency: "USD".to_string(),
            link: "https://example.com/p/1".to_string(),
            site: "Amazon US".to_string(),
            country: "US".to_string(),
            confidence: 0.95,
            fetched_at: Utc::now(),
        };
        let value = serde_json::to_value(&offer).unwrap();
        assert!(value.get("productName").is_some());
        assert!(value.get("fetchedAt").is_some());
        assert_eq!(offer.price_value(), Some(799.0));
    }
}
