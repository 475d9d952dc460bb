//! Streaming search: the same per-site fan-out as the batch path, emitted
//! as an ordered, cancellable event sequence instead of one return value.
//!
//! Streamed offers are scored opportunistically with the fuzzy scorer
//! only — site latency stays visible to the caller instead of hiding
//! behind completion calls.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use pricescout_common::{ProgressEvent, SearchError, SiteDescriptor};

use crate::score::fuzzy_score;
use crate::search::{SearchEngine, STREAM_DEADLINE};

/// Event channel capacity. A slow consumer backpressures the producers
/// rather than growing an unbounded queue.
const EVENT_BUFFER: usize = 32;

impl SearchEngine {
    /// Start a streaming search. Events arrive on the returned channel;
    /// after the terminal `search_completed` event the channel closes and
    /// is never reused. The only up-front error is an unsupported country,
    /// raised before any network activity.
    pub fn search_streaming(
        self: Arc<Self>,
        country: &str,
        query: &str,
    ) -> Result<mpsc::Receiver<ProgressEvent>, SearchError> {
        let sites: Vec<SiteDescriptor> = self
            .catalog
            .for_country(country)
            .into_iter()
            .cloned()
            .collect();
        if sites.is_empty() {
            return Err(SearchError::NoSitesForCountry {
                country: country.to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let country = country.to_string();
        let query = query.to_string();
        tokio::spawn(async move {
            self.run_streaming(country, query, sites, tx).await;
        });
        Ok(rx)
    }

    async fn run_streaming(
        self: Arc<Self>,
        country: String,
        query: String,
        sites: Vec<SiteDescriptor>,
        tx: mpsc::Sender<ProgressEvent>,
    ) {
        let deadline = Instant::now() + STREAM_DEADLINE;

        let _ = tx
            .send(ProgressEvent::Searching {
                query: query.clone(),
                country: country.clone(),
                sites: sites.len(),
            })
            .await;

        let mut tasks = JoinSet::new();
        for site in sites {
            let engine = self.clone();
            let tx = tx.clone();
            let query = query.clone();
            let country = country.clone();
            tasks.spawn(async move {
                let _ = tx
                    .send(ProgressEvent::SiteStarted {
                        site: site.name.clone(),
                    })
                    .await;

                let mut outcome = engine
                    .extractor
                    .extract_site(&site, &query, &country, deadline)
                    .await;

                match outcome.error.take() {
                    Some(reason) => {
                        let _ = tx
                            .send(ProgressEvent::SiteFailed {
                                site: site.name.clone(),
                                reason,
                            })
                            .await;
                        0
                    }
                    None => {
                        for offer in &mut outcome.offers {
                            offer.confidence = fuzzy_score(&query, &offer.product_name);
                        }
                        let count = outcome.offers.len();
                        let _ = tx
                            .send(ProgressEvent::SiteCompleted {
                                site: site.name.clone(),
                                offers: outcome.offers,
                                count,
                            })
                            .await;
                        count
                    }
                }
            });
        }

        let mut total = 0usize;
        let timed_out = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(count)) => total += count,
                    Some(Err(e)) => warn!(error = %e, "Streaming site task failed"),
                    None => break false,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    // Outstanding sites are abandoned; their results are
                    // simply never emitted.
                    tasks.abort_all();
                    break true;
                }
            }
        };

        let _ = tx
            .send(ProgressEvent::SearchCompleted {
                query,
                country,
                total,
                timed_out,
            })
            .await;
        info!(total, timed_out, "Streaming search complete");
    }
}
