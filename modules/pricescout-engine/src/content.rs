//! Condense a result page down to the text worth showing a language model.
//!
//! Result pages are enormous; the model only needs the listing region.
//! Prefer a recognized main/results container when it carries substantial
//! text, otherwise sweep the page for short fragments that look like
//! product rows (a currency symbol or call-to-action nearby) while
//! skipping navigation chrome.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use ai_client::util::truncate_to_char_boundary;

/// Character budget for condensed content sent to the model.
pub const CONTENT_BUDGET: usize = 8000;

/// A main container shorter than this is treated as boilerplate and the
/// fragment sweep runs instead.
const MAIN_MIN_CHARS: usize = 1000;

const FRAGMENT_MIN_CHARS: usize = 20;
const FRAGMENT_MAX_CHARS: usize = 500;

const MAIN_SELECTORS: &[&str] = &[
    "main",
    "[role='main']",
    "#main",
    ".main",
    "#content",
    ".content",
    ".products",
    ".product-list",
    ".search-results",
    ".results",
];

/// Extract the condensed listing text from a fetched page. Returns an
/// empty string when the page has nothing that looks like offers.
pub fn condense_listing(html: &str) -> String {
    let document = Html::parse_document(html);

    for raw in MAIN_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(&element);
            if text.trim().len() > MAIN_MIN_CHARS {
                return clean_content(&text);
            }
        }
    }

    // No substantial main container. Sweep the page for fragments that
    // read like product rows, outside nav/header/footer chrome.
    let every_element = Selector::parse("body *").expect("valid selector");
    let mut seen = HashSet::new();
    let mut fragments = Vec::new();
    for element in document.select(&every_element) {
        if in_chrome_section(&element) {
            continue;
        }
        let text = element_text(&element);
        let trimmed = text.trim();
        if trimmed.len() < FRAGMENT_MIN_CHARS || trimmed.len() > FRAGMENT_MAX_CHARS {
            continue;
        }
        if !has_offer_cue(trimmed) {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            fragments.push(trimmed.to_string());
        }
    }

    clean_content(&fragments.join("\n"))
}

/// Collapse whitespace runs and cap at the content budget.
pub fn clean_content(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_char_boundary(&collapsed, CONTENT_BUDGET).to_string()
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// True when the element sits inside navigation/branding chrome rather
/// than the results region.
fn in_chrome_section(element: &ElementRef) -> bool {
    let mut current = element.parent();
    while let Some(node) = current {
        if let Some(el) = ElementRef::wrap(node) {
            match el.value().name() {
                "nav" | "header" | "footer" | "aside" => return true,
                _ => {}
            }
            if let Some(class) = el.value().attr("class") {
                if class.split_whitespace().any(|c| {
                    matches!(
                        c,
                        "nav" | "navigation" | "header" | "footer" | "breadcrumb" | "menu"
                            | "sidebar"
                    )
                }) {
                    return true;
                }
            }
            if let Some(role) = el.value().attr("role") {
                if matches!(role, "navigation" | "banner" | "contentinfo") {
                    return true;
                }
            }
        }
        current = node.parent();
    }
    false
}

fn has_offer_cue(text: &str) -> bool {
    if text.contains('$') || text.contains('₹') || text.contains('£') || text.contains('€') {
        return true;
    }
    let lower = text.to_lowercase();
    lower.contains("price") || lower.contains("buy") || lower.contains("add to cart")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_a_substantial_main_container() {
        let filler = "Apple iPhone 15 128GB Black $799.00 Add to cart. ".repeat(30);
        let html = format!(
            r#"<html><body>
                <nav>Home Electronics Phones Deals Sign in</nav>
                <main>{filler}</main>
                <footer>About us Careers Terms</footer>
            </body></html>"#
        );
        let condensed = condense_listing(&html);
        assert!(condensed.contains("iPhone 15"));
        assert!(!condensed.contains("Careers"));
    }

    #[test]
    fn fragment_sweep_skips_chrome_and_keeps_priced_rows() {
        let html = r#"<html><body>
            <nav><div>Shop by category with our latest price drops today</div></nav>
            <div class="tile">Apple iPhone 15 - 128GB Black $799.00</div>
            <div class="tile">Customer testimonials and press mentions from around the world, none of which belong in results</div>
            <footer><div>Price match guarantee details and contact info</div></footer>
        </body></html>"#;
        let condensed = condense_listing(html);
        assert!(condensed.contains("$799.00"));
        assert!(!condensed.contains("testimonials"));
        assert!(!condensed.contains("guarantee"));
    }

    #[test]
    fn collapses_whitespace_and_respects_the_budget() {
        let mut body = String::new();
        for i in 0..2000 {
            body.push_str(&format!("<div class='r'>Galaxy   S24\n\nmodel {i} $699 buy now</div>"));
        }
        let html = format!("<html><body>{body}</body></html>");
        let condensed = condense_listing(&html);
        assert!(condensed.len() <= CONTENT_BUDGET);
        assert!(condensed.starts_with("Galaxy S24 model 0 $699 buy now"));
    }

    #[test]
    fn empty_page_condenses_to_nothing() {
        assert_eq!(condense_listing("<html><body></body></html>"), "");
    }
}
