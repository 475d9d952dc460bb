//! Bounded worker pool that applies the relevance scorer to a merged
//! candidate batch.
//!
//! A fixed set of workers drains a shared job queue and writes scored
//! offers to a result channel. Every input produces exactly one output —
//! the pool reports a scoring-stage failure if anything is lost, and the
//! orchestrator degrades to direct fuzzy scoring from there.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::debug;

use pricescout_common::{Offer, SearchError};

use crate::score::RelevanceScorer;

/// Number of concurrent scoring workers.
pub const SCORING_WORKERS: usize = 5;

/// Offers scoring below this are dropped from the final result. An empty
/// survivor set is a valid outcome.
pub const RETENTION_THRESHOLD: f64 = 0.3;

/// Score every offer and apply the retention filter. Returns immediately
/// on an empty batch.
pub async fn score_all(
    scorer: Arc<RelevanceScorer>,
    query: &str,
    offers: Vec<Offer>,
    deadline: Instant,
) -> Result<Vec<Offer>, SearchError> {
    if offers.is_empty() {
        return Ok(Vec::new());
    }
    let expected = offers.len();

    let (job_tx, job_rx) = mpsc::channel::<Offer>(expected);
    let (result_tx, mut result_rx) = mpsc::channel::<Offer>(expected);
    let job_rx = Arc::new(Mutex::new(job_rx));

    let mut workers = Vec::with_capacity(SCORING_WORKERS);
    for worker in 0..SCORING_WORKERS {
        let scorer = scorer.clone();
        let query = query.to_string();
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let job = { job_rx.lock().await.recv().await };
                let Some(mut offer) = job else {
                    break;
                };
                offer.confidence = scorer.score(&query, &offer.product_name, deadline).await;
                if result_tx.send(offer).await.is_err() {
                    break;
                }
            }
            debug!(worker, "scoring worker drained");
        }));
    }
    drop(result_tx);

    for offer in offers {
        if job_tx.send(offer).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let mut scored = Vec::with_capacity(expected);
    while let Some(offer) = result_rx.recv().await {
        scored.push(offer);
    }

    for worker in workers {
        let _ = worker.await;
    }

    if scored.len() != expected {
        return Err(SearchError::Scoring(format!(
            "scored {} of {expected} offers",
            scored.len()
        )));
    }

    Ok(scored
        .into_iter()
        .filter(|o| o.confidence >= RETENTION_THRESHOLD)
        .collect())
}
