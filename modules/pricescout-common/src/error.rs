use thiserror::Error;

/// Failure taxonomy for a search. Only [`SearchError::NoSitesForCountry`]
/// reaches the caller as a hard error; everything else degrades to a
/// lower-fidelity result along the way.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no supported sites for country: {country}")]
    NoSitesForCountry { country: String },

    #[error("fetch failed for {site}: {reason}")]
    SiteFetch { site: String, reason: String },

    #[error("extraction response did not match the product contract: {0}")]
    ExtractionParse(String),

    #[error("scoring stage failed: {0}")]
    Scoring(String),

    #[error("search deadline exceeded")]
    DeadlineExceeded,
}
