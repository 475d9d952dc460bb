//! Price text normalization and currency resolution.
//!
//! Sites render prices every way imaginable ("₹1,29,900", "$799.00",
//! "1 299,00 €"). Normalization keeps the first numeric run with its
//! decimal point and strips thousands separators; everything downstream
//! (ranking, display) works off that text.

use std::sync::OnceLock;

use regex::Regex;

fn price_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d,]+\.?\d*").expect("valid regex"))
}

/// Extract the first numeric run from raw price text and strip thousands
/// separators. Returns `None` when no digits are present.
pub fn normalize_price(raw: &str) -> Option<String> {
    for m in price_run().find_iter(raw) {
        let cleaned = m.as_str().replace(',', "");
        if cleaned.chars().any(|c| c.is_ascii_digit()) {
            return Some(cleaned);
        }
    }
    None
}

/// Parse normalized (or raw) price text to a number by keeping digits and
/// the decimal point. Total function: malformed input yields `None`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Default currency for each supported country.
pub fn country_currency(country: &str) -> Option<&'static str> {
    match country {
        "US" => Some("USD"),
        "CA" => Some("CAD"),
        "UK" => Some("GBP"),
        "IN" => Some("INR"),
        "AU" => Some("AUD"),
        "DE" | "FR" => Some("EUR"),
        "JP" => Some("JPY"),
        _ => None,
    }
}

/// Resolve a currency code: explicit value first, then the country table,
/// then a symbol scan of the raw price text, then USD.
pub fn resolve_currency(explicit: Option<&str>, country: &str, raw_price: &str) -> String {
    if let Some(code) = explicit {
        let code = code.trim();
        if !code.is_empty() {
            return code.to_string();
        }
    }
    if let Some(code) = country_currency(country) {
        return code.to_string();
    }
    if raw_price.contains('$') {
        "USD".to_string()
    } else if raw_price.contains('₹') {
        "INR".to_string()
    } else if raw_price.contains('£') {
        "GBP".to_string()
    } else if raw_price.contains('€') {
        "EUR".to_string()
    } else {
        "USD".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(normalize_price("$1,299.00").as_deref(), Some("1299.00"));
        assert_eq!(normalize_price("₹1,29,900").as_deref(), Some("129900"));
    }

    #[test]
    fn keeps_the_first_numeric_run() {
        // eBay-style price ranges keep the lower bound.
        assert_eq!(normalize_price("$12.99 to $24.99").as_deref(), Some("12.99"));
    }

    #[test]
    fn no_digits_means_no_price() {
        assert_eq!(normalize_price("Call for price"), None);
        assert_eq!(normalize_price(""), None);
    }

    #[test]
    fn parse_price_is_total() {
        assert_eq!(parse_price("799.00"), Some(799.0));
        assert_eq!(parse_price("not a price"), None);
        assert_eq!(parse_price("12.9.9"), None);
    }

    #[test]
    fn explicit_currency_wins() {
        assert_eq!(resolve_currency(Some("EUR"), "US", "$10"), "EUR");
        // Blank explicit values fall through to the country table.
        assert_eq!(resolve_currency(Some("  "), "IN", "₹10"), "INR");
    }

    #[test]
    fn unknown_country_falls_back_to_symbol_scan() {
        assert_eq!(resolve_currency(None, "BR", "£12.00"), "GBP");
        assert_eq!(resolve_currency(None, "BR", "12.00"), "USD");
    }
}
