//! Query/offer relevance scoring: an LLM rating with a deterministic
//! fuzzy fallback. Scoring never fails — every path degrades to the
//! fuzzy score, and every result is clamped to [0, 1].

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use tokio::time::Instant;
use tracing::debug;

use ai_client::util::strip_code_blocks;
use ai_client::CompletionModel;

/// Sub-timeout for one scoring completion call.
pub const SCORE_TIMEOUT: Duration = Duration::from_secs(10);
/// Fixed delay before the single retry on transport failure.
pub const SCORE_RETRY_DELAY: Duration = Duration::from_secs(2);
/// An LLM score below this is a degenerate parse; the fuzzy score is used
/// instead.
pub const LLM_SCORE_FLOOR: f64 = 0.1;

const BRAND_TOKENS: &[&str] = &[
    "apple", "iphone", "samsung", "galaxy", "google", "pixel", "oneplus", "xiaomi", "huawei",
    "oppo", "vivo", "realme",
];

const COLOR_TOKENS: &[&str] = &[
    "black", "white", "red", "blue", "green", "yellow", "purple", "pink", "gold", "silver",
    "gray", "grey",
];

const CONDITION_TOKENS: &[&str] = &[
    "new", "used", "refurbished", "renewed", "good", "excellent", "fair",
];

const PHONE_TERMS: &[&str] = &["iphone", "galaxy", "pixel", "phone", "smartphone"];

const ACCESSORY_TERMS: &[&str] = &[
    "case",
    "cover",
    "charger",
    "cable",
    "screen protector",
    "tempered glass",
    "stand",
    "holder",
    "adapter",
];

/// Ceiling applied when a handset query matches an accessory listing. An
/// accessory can never satisfy a phone search, whatever the name overlap,
/// so such hits stay below the retention threshold.
const ACCESSORY_CAP: f64 = 0.25;

// --- LLM scorer ---

pub struct RelevanceScorer {
    model: Arc<dyn CompletionModel>,
}

impl RelevanceScorer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Score how well `name` matches `query`. Tries the LLM rating first;
    /// any failure, timeout, or degenerate response falls back to the
    /// deterministic fuzzy score. Always in [0, 1].
    pub async fn score(&self, query: &str, name: &str, deadline: Instant) -> f64 {
        match self.llm_score(query, name, deadline).await {
            Ok(score) if score >= LLM_SCORE_FLOOR => score,
            Ok(score) => {
                debug!(score, name, "LLM score below floor, using fuzzy score");
                fuzzy_score(query, name)
            }
            Err(e) => {
                debug!(error = %e, name, "LLM scoring unavailable, using fuzzy score");
                fuzzy_score(query, name)
            }
        }
    }

    async fn llm_score(&self, query: &str, name: &str, deadline: Instant) -> Result<f64> {
        let prompt = scoring_prompt(query, name);

        match self.attempt(&prompt, deadline).await {
            Ok(text) => Ok(parse_score(&text)),
            Err(first) => {
                // One retry with a fixed delay, but only while the shared
                // deadline still has room for the delay plus a real attempt.
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining < SCORE_RETRY_DELAY * 2 {
                    return Err(first);
                }
                tokio::time::sleep(SCORE_RETRY_DELAY).await;
                let text = self.attempt(&prompt, deadline).await?;
                Ok(parse_score(&text))
            }
        }
    }

    async fn attempt(&self, prompt: &str, deadline: Instant) -> Result<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("no deadline headroom left for scoring");
        }
        let timeout = SCORE_TIMEOUT.min(remaining);
        tokio::time::timeout(timeout, self.model.complete(prompt, timeout))
            .await
            .map_err(|_| anyhow!("scoring call timed out"))?
    }
}

/// Parse a 0.0-1.0 rating out of whatever the model produced. A direct
/// numeric parse wins; otherwise common decimal substrings map to score
/// buckets; otherwise 0.5. Always clamped.
pub fn parse_score(response: &str) -> f64 {
    let cleaned = strip_code_blocks(response).replace('\n', " ");
    let cleaned = cleaned.trim();

    if let Some(token) = cleaned.split_whitespace().next() {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != '.');
        if let Ok(score) = token.parse::<f64>() {
            return score.clamp(0.0, 1.0);
        }
    }

    if cleaned.contains("0.") {
        if cleaned.contains("0.9") || cleaned.contains("0.8") {
            return 0.85;
        } else if cleaned.contains("0.7") || cleaned.contains("0.6") {
            return 0.65;
        } else if cleaned.contains("0.5") || cleaned.contains("0.4") {
            return 0.45;
        }
        return 0.25;
    }

    0.5
}

fn scoring_prompt(query: &str, name: &str) -> String {
    format!(
        r#"You are a product matching expert. Rate how well this product matches the search query on a scale from 0.0 to 1.0.

Search Query: "{query}"
Product Name: "{name}"

Scoring Guidelines:
- 1.0: Perfect match (exact product, brand, model, specs)
- 0.8-0.9: Excellent match (same product, minor spec differences)
- 0.6-0.7: Good match (same brand/category, different model/version)
- 0.4-0.5: Moderate match (related products, accessories, or alternatives)
- 0.2-0.3: Weak match (same category but different brand/purpose)
- 0.0-0.1: No match (completely unrelated products)

Examples:
- Query: "iPhone 15 128GB" vs "Apple iPhone 15 - 128GB Black" = 1.0
- Query: "iPhone 15" vs "iPhone 14 Pro" = 0.7
- Query: "iPhone 15" vs "iPhone Case for 15" = 0.4
- Query: "iPhone 15" vs "Samsung Galaxy S24" = 0.2
- Query: "iPhone 15" vs "Laptop Charger" = 0.0

Respond with only the numeric score (0.0-1.0), no explanation.

Score:"#
    )
}

// --- Fuzzy scorer ---

fn number_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn storage_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(gb|tb)").expect("valid regex"))
}

/// Deterministic relevance score: string similarity plus product-aware
/// bonuses and penalties. Pure — no I/O, no state — so it is safe from
/// any number of concurrent workers.
pub fn fuzzy_score(query: &str, name: &str) -> f64 {
    if query.trim().is_empty() || name.trim().is_empty() {
        return 0.0;
    }

    let query = query.trim().to_lowercase();
    let name = name.trim().to_lowercase();

    let max_len = query.chars().count().max(name.chars().count());
    let distance = strsim::levenshtein(&query, &name);
    let edit_similarity = 1.0 - distance as f64 / max_len as f64;
    let base = strsim::jaro_winkler(&query, &name).max(edit_similarity);

    // A handset query matching an accessory listing is a category miss:
    // penalize it and keep it below the retention threshold regardless of
    // how similar the names read.
    if is_accessory_mismatch(&query, &name) {
        return (base - 0.4).clamp(0.0, ACCESSORY_CAP);
    }

    let score = base
        + brand_affinity(&query, &name)
        + model_number_bonus(&query, &name)
        + attribute_bonus(&query, &name);

    score.clamp(0.0, 1.0)
}

/// +0.3 when both strings name the same brand or product family, -0.2 when
/// they name different ones. A product line implies its parent brand:
/// "iphone" on one side matches "apple" on the other.
fn brand_affinity(query: &str, name: &str) -> f64 {
    let mut query_brand = None;
    let mut name_brand = None;
    for brand in BRAND_TOKENS {
        if query.contains(brand) {
            query_brand = Some(*brand);
        }
        if name.contains(brand) {
            name_brand = Some(*brand);
        }
    }

    if (query.contains("iphone") && name.contains("apple"))
        || (query.contains("apple") && name.contains("iphone"))
    {
        query_brand = Some("apple");
        name_brand = Some("apple");
    }

    match (query_brand, name_brand) {
        (Some(q), Some(n)) if q == n => 0.3,
        (Some(_), Some(_)) => -0.2,
        _ => 0.0,
    }
}

/// Up to +0.2, scaled by the fraction of the query's numeric tokens
/// (model numbers) found in the candidate name.
fn model_number_bonus(query: &str, name: &str) -> f64 {
    let query_numbers: Vec<&str> = number_token().find_iter(query).map(|m| m.as_str()).collect();
    if query_numbers.is_empty() {
        return 0.0;
    }
    let name_numbers: Vec<&str> = number_token().find_iter(name).map(|m| m.as_str()).collect();
    if name_numbers.is_empty() {
        return 0.0;
    }

    let matched = query_numbers
        .iter()
        .filter(|n| name_numbers.contains(n))
        .count();
    matched as f64 / query_numbers.len() as f64 * 0.2
}

/// +0.15 per shared storage token, +0.05 per shared color, +0.05 per
/// shared condition term.
fn attribute_bonus(query: &str, name: &str) -> f64 {
    let mut bonus = 0.0;

    let query_storage: Vec<(String, String)> = storage_token()
        .captures_iter(query)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    let name_storage: Vec<(String, String)> = storage_token()
        .captures_iter(name)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    for qs in &query_storage {
        for ns in &name_storage {
            if qs == ns {
                bonus += 0.15;
            }
        }
    }

    for color in COLOR_TOKENS {
        if query.contains(color) && name.contains(color) {
            bonus += 0.05;
        }
    }

    for condition in CONDITION_TOKENS {
        if query.contains(condition) && name.contains(condition) {
            bonus += 0.05;
        }
    }

    bonus
}

fn is_accessory_mismatch(query: &str, name: &str) -> bool {
    let query_is_phone = PHONE_TERMS.iter().any(|t| query.contains(t));
    let name_is_accessory = ACCESSORY_TERMS.iter().any(|t| name.contains(t));
    query_is_phone && name_is_accessory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_phone_listing_scores_high() {
        let score = fuzzy_score("iPhone 15 128GB", "Apple iPhone 15 - 128GB Black");
        assert!(score >= 0.8, "got {score}");
    }

    #[test]
    fn accessory_listing_is_suppressed_for_phone_queries() {
        let score = fuzzy_score("iPhone 15 128GB", "iPhone 15 Case");
        assert!(score <= 0.3, "got {score}");
    }

    #[test]
    fn scores_are_deterministic_and_clamped() {
        let pairs = [
            ("iPhone 15", "Apple iPhone 15 Pro Max 1TB Gold New Sealed"),
            ("galaxy s24", "Samsung Galaxy S24 Ultra"),
            ("pixel 8", "USB-C Laptop Charger 65W"),
            ("", "anything"),
            ("anything", ""),
        ];
        for (query, name) in pairs {
            let first = fuzzy_score(query, name);
            let second = fuzzy_score(query, name);
            assert_eq!(first, second);
            assert!((0.0..=1.0).contains(&first), "{query} vs {name} -> {first}");
        }
    }

    #[test]
    fn different_brands_are_penalized() {
        let same = fuzzy_score("samsung galaxy s24", "Samsung Galaxy S24 128GB");
        let different = fuzzy_score("samsung galaxy s24", "Google Pixel 8 128GB");
        assert!(same > different);
    }

    #[test]
    fn product_line_implies_parent_brand() {
        let score = fuzzy_score("iphone 15", "Apple smartphone model 15");
        let unrelated = fuzzy_score("iphone 15", "Motorola smartphone model 15");
        assert!(score > unrelated);
    }

    #[test]
    fn storage_and_color_matches_add_up() {
        let with_specs = fuzzy_score("iphone 15 128gb black", "Apple iPhone 15 128GB Black");
        let without_specs = fuzzy_score("iphone 15 128gb black", "Apple iPhone 15 64GB Blue");
        assert!(with_specs > without_specs);
    }

    #[test]
    fn parse_score_takes_a_direct_number_first() {
        assert_eq!(parse_score("0.85"), 0.85);
        assert_eq!(parse_score("0.3\n"), 0.3);
        assert_eq!(parse_score("```\n0.72\n```"), 0.72);
        assert_eq!(parse_score("1.7"), 1.0); // clamped
    }

    #[test]
    fn parse_score_buckets_chatty_responses() {
        assert_eq!(parse_score("I would rate this 0.9 out of 1.0"), 0.85);
        assert_eq!(parse_score("Probably around 0.6 or so"), 0.65);
        assert_eq!(parse_score("Roughly 0.4, a moderate match"), 0.45);
        assert_eq!(parse_score("Maybe 0.15?"), 0.25);
    }

    #[test]
    fn parse_score_defaults_when_nothing_matches() {
        assert_eq!(parse_score("this is a great match!"), 0.5);
        assert_eq!(parse_score(""), 0.5);
    }
}
