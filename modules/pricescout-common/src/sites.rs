//! Builtin site catalog.
//!
//! One descriptor per retail site: base address, search-path template,
//! supported countries, structural selectors for the fallback extractor,
//! request headers, and a politeness delay. Constructed once at startup
//! and shared read-only for the life of the process.

use crate::types::{SelectorSet, SiteDescriptor};

const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Immutable registry of site descriptors.
pub struct SiteCatalog {
    sites: Vec<SiteDescriptor>,
}

impl SiteCatalog {
    pub fn new(sites: Vec<SiteDescriptor>) -> Self {
        Self { sites }
    }

    /// All descriptors supporting `country`.
    pub fn for_country(&self, country: &str) -> Vec<&SiteDescriptor> {
        self.sites
            .iter()
            .filter(|s| s.supports_country(country))
            .collect()
    }

    pub fn site_names(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// The builtin catalog of supported retail sites.
    pub fn builtin() -> Self {
        let mut sites = Vec::new();

        for (name, base_url, country) in [
            ("Amazon US", "https://www.amazon.com", "US"),
            ("Amazon Canada", "https://www.amazon.ca", "CA"),
            ("Amazon UK", "https://www.amazon.co.uk", "UK"),
            ("Amazon India", "https://www.amazon.in", "IN"),
            ("Amazon Germany", "https://www.amazon.de", "DE"),
            ("Amazon France", "https://www.amazon.fr", "FR"),
            ("Amazon Japan", "https://www.amazon.co.jp", "JP"),
            ("Amazon Australia", "https://www.amazon.com.au", "AU"),
        ] {
            sites.push(SiteDescriptor {
                name: name.to_string(),
                base_url: base_url.to_string(),
                search_path: "/s?k=".to_string(),
                countries: vec![country.to_string()],
                selectors: amazon_selectors(),
                headers: browser_headers(DESKTOP_UA),
                rate_limit_ms: 2000,
            });
        }

        for (name, base_url, country) in [
            ("eBay US", "https://www.ebay.com", "US"),
            ("eBay Canada", "https://www.ebay.ca", "CA"),
            ("eBay UK", "https://www.ebay.co.uk", "UK"),
        ] {
            sites.push(SiteDescriptor {
                name: name.to_string(),
                base_url: base_url.to_string(),
                search_path: "/sch/i.html?_nkw=".to_string(),
                countries: vec![country.to_string()],
                selectors: SelectorSet {
                    product: ".s-item".to_string(),
                    title: ".s-item__title".to_string(),
                    price: ".s-item__price".to_string(),
                    link: ".s-item__link".to_string(),
                    currency: None,
                },
                headers: browser_headers(DESKTOP_UA),
                rate_limit_ms: 1500,
            });
        }

        sites.push(SiteDescriptor {
            name: "Walmart US".to_string(),
            base_url: "https://www.walmart.com".to_string(),
            search_path: "/search?q=".to_string(),
            countries: vec!["US".to_string()],
            selectors: SelectorSet {
                product: "[data-testid='item-stack']".to_string(),
                title: "[data-automation-id='product-title']".to_string(),
                price: "[data-automation-id='product-price']".to_string(),
                link: "[data-automation-id='product-title'] a".to_string(),
                currency: None,
            },
            headers: browser_headers(MAC_UA),
            rate_limit_ms: 2500,
        });

        sites.push(SiteDescriptor {
            name: "Walmart Canada".to_string(),
            base_url: "https://www.walmart.ca".to_string(),
            search_path: "/search?q=".to_string(),
            countries: vec!["CA".to_string()],
            selectors: SelectorSet {
                product: "[data-testid='product-tile']".to_string(),
                title: "[data-testid='product-title']".to_string(),
                price: "[data-testid='price-current']".to_string(),
                link: "[data-testid='product-title'] a".to_string(),
                currency: None,
            },
            headers: browser_headers(MAC_UA),
            rate_limit_ms: 2500,
        });

        sites.push(SiteDescriptor {
            name: "Target US".to_string(),
            base_url: "https://www.target.com".to_string(),
            search_path: "/s?searchTerm=".to_string(),
            countries: vec!["US".to_string()],
            selectors: SelectorSet {
                product: "[data-test='product-card']".to_string(),
                title: "[data-test='product-title']".to_string(),
                price: "[data-test='product-price']".to_string(),
                link: "[data-test='product-title'] a".to_string(),
                currency: None,
            },
            headers: browser_headers(DESKTOP_UA),
            rate_limit_ms: 2500,
        });

        sites.push(SiteDescriptor {
            name: "Best Buy US".to_string(),
            base_url: "https://www.bestbuy.com".to_string(),
            search_path: "/site/searchpage.jsp?st=".to_string(),
            countries: vec!["US".to_string()],
            selectors: SelectorSet {
                product: ".sku-item".to_string(),
                title: ".sku-header a".to_string(),
                price: ".sr-price".to_string(),
                link: ".sku-header a".to_string(),
                currency: None,
            },
            headers: browser_headers(DESKTOP_UA),
            rate_limit_ms: 2500,
        });

        sites.push(SiteDescriptor {
            name: "Flipkart".to_string(),
            base_url: "https://www.flipkart.com".to_string(),
            search_path: "/search?q=".to_string(),
            countries: vec!["IN".to_string()],
            selectors: SelectorSet {
                product: "[data-id], ._75nlfW, .cPHDOP".to_string(),
                title: ".KzDlHZ, ._4rR01T, .s1Q9rs".to_string(),
                price: ".Nx9bqj, ._30jeq3".to_string(),
                link: ".CGtC98, ._1fQZEK, .s1Q9rs".to_string(),
                currency: None,
            },
            headers: indian_headers(),
            rate_limit_ms: 3000,
        });

        sites.push(SiteDescriptor {
            name: "Snapdeal".to_string(),
            base_url: "https://www.snapdeal.com".to_string(),
            search_path: "/search?keyword=".to_string(),
            countries: vec!["IN".to_string()],
            selectors: SelectorSet {
                product: ".product-tuple-listing".to_string(),
                title: ".product-title".to_string(),
                price: ".lfloat.product-price".to_string(),
                link: ".dp-widget-link".to_string(),
                currency: None,
            },
            headers: indian_headers(),
            rate_limit_ms: 4000,
        });

        sites.push(SiteDescriptor {
            name: "Myntra".to_string(),
            base_url: "https://www.myntra.com".to_string(),
            search_path: "/".to_string(),
            countries: vec!["IN".to_string()],
            selectors: SelectorSet {
                product: ".product-base".to_string(),
                title: ".product-product".to_string(),
                price: ".product-discountedPrice".to_string(),
                link: ".product-base a".to_string(),
                currency: None,
            },
            headers: browser_headers(DESKTOP_UA),
            rate_limit_ms: 3000,
        });

        Self::new(sites)
    }
}

fn amazon_selectors() -> SelectorSet {
    SelectorSet {
        product: "[data-component-type='s-search-result']".to_string(),
        title: "[data-cy='title-recipe-title'] span, h2 a span".to_string(),
        price: ".a-price-whole, .a-offscreen".to_string(),
        link: "h2 a".to_string(),
        currency: Some(".a-price-symbol".to_string()),
    }
}

fn browser_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), user_agent.to_string()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
    ]
}

fn indian_headers() -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), DESKTOP_UA.to_string()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        (
            "Accept-Language".to_string(),
            "en-IN,en-US;q=0.9,en;q=0.8,hi;q=0.7".to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_resolves_multiple_sites() {
        let catalog = SiteCatalog::builtin();
        let sites = catalog.for_country("US");
        assert!(sites.len() >= 5);
        assert!(sites.iter().all(|s| s.supports_country("US")));
    }

    #[test]
    fn unknown_country_resolves_nothing() {
        let catalog = SiteCatalog::builtin();
        assert!(catalog.for_country("ZZ").is_empty());
    }

    #[test]
    fn every_site_has_a_complete_descriptor() {
        let catalog = SiteCatalog::builtin();
        for name in catalog.site_names() {
            assert!(!name.is_empty());
        }
        for country in ["US", "CA", "UK", "IN", "DE", "FR", "JP", "AU"] {
            for site in catalog.for_country(country) {
                assert!(site.base_url.starts_with("https://"));
                assert!(!site.selectors.product.is_empty());
                assert!(site.rate_limit_ms > 0);
                assert!(
                    site.headers.iter().any(|(k, _)| k == "User-Agent"),
                    "{} is missing a User-Agent",
                    site.name
                );
            }
        }
    }
}
