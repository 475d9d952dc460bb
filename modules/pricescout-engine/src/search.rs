//! Fan a query out across a country's sites, merge what comes back, score
//! it, and rank it — all under one shared deadline.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{info, warn};

use ai_client::CompletionModel;
use pricescout_common::{Offer, SearchError, SearchResponse, SiteCatalog, SiteOutcome};

use crate::extract::OfferExtractor;
use crate::fetch::PageFetcher;
use crate::pool::score_all;
use crate::score::{fuzzy_score, RelevanceScorer};

/// Wall-clock budget for a batch search.
pub const SEARCH_DEADLINE: Duration = Duration::from_secs(30);
/// Wall-clock budget for a streaming search. Sites report as they finish,
/// so a longer window costs the caller nothing up front.
pub const STREAM_DEADLINE: Duration = Duration::from_secs(60);
/// Result pages fetched concurrently.
pub const MAX_CONCURRENT_SITES: usize = 8;

pub struct SearchEngine {
    pub(crate) catalog: Arc<SiteCatalog>,
    pub(crate) extractor: OfferExtractor,
    pub(crate) scorer: Arc<RelevanceScorer>,
}

impl SearchEngine {
    pub fn new(
        catalog: Arc<SiteCatalog>,
        model: Arc<dyn CompletionModel>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            catalog,
            extractor: OfferExtractor::new(model.clone(), fetcher),
            scorer: Arc::new(RelevanceScorer::new(model)),
        }
    }

    pub fn site_names(&self) -> Vec<String> {
        self.catalog.site_names()
    }

    /// Run one batch search. The only hard error is an unsupported
    /// country; per-site failures are logged and omitted, and a scoring
    /// outage degrades to fuzzy scores rather than failing the call.
    pub async fn search(&self, country: &str, query: &str) -> Result<SearchResponse, SearchError> {
        let sites: Vec<pricescout_common::SiteDescriptor> =
            self.catalog.for_country(country).into_iter().cloned().collect();
        if sites.is_empty() {
            return Err(SearchError::NoSitesForCountry {
                country: country.to_string(),
            });
        }

        info!(country, query, sites = sites.len(), "Search starting");
        let deadline = Instant::now() + SEARCH_DEADLINE;

        let extractor = &self.extractor;
        let outcomes: Vec<SiteOutcome> = stream::iter(sites.into_iter().map(|site| async move {
            extractor.extract_site(&site, query, country, deadline).await
        }))
        .buffer_unordered(MAX_CONCURRENT_SITES)
        .collect()
        .await;

        let mut merged: Vec<Offer> = Vec::new();
        for outcome in outcomes {
            match outcome.error {
                Some(reason) => {
                    warn!(site = %outcome.site, reason, "Site failed, omitting from results");
                }
                None => merged.extend(outcome.offers),
            }
        }
        info!(raw = merged.len(), "Merged candidates before scoring");

        let mut results =
            match score_all(self.scorer.clone(), query, merged.clone(), deadline).await {
                Ok(scored) => scored,
                Err(e) => {
                    // Keep the caller a response: score everything with the
                    // deterministic fallback and skip the retention filter.
                    warn!(error = %e, "Scoring stage failed, falling back to fuzzy scores");
                    for offer in &mut merged {
                        offer.confidence = fuzzy_score(query, &offer.product_name);
                    }
                    merged
                }
            };

        rank_offers(&mut results);
        info!(count = results.len(), "Search complete");

        Ok(SearchResponse {
            count: results.len(),
            results,
            query: query.to_string(),
            country: country.to_string(),
        })
    }
}

/// Rank offers in place: confidence descending, ties by parsed price
/// ascending. Unparsable prices sort after parsable ones among equal
/// confidence. Total order — malformed price text never panics.
pub fn rank_offers(offers: &mut [Offer]) {
    offers.sort_by(|a, b| {
        b.confidence.total_cmp(&a.confidence).then_with(|| {
            match (a.price_value(), b.price_value()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        })
    });
}
