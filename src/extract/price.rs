//! Price and title extraction from product page markup.
//!
//! Candidates are tried in rule order and the first visible match wins.
//! When no candidate matches, the visible document text is scanned for a
//! currency amount inside the retailer's plausible price range.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};

use super::rules::{PriceCandidate, RetailerRules};

static CURRENCY_AMOUNT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(₹|Rs\.?|INR|\$|£|€)\s?([0-9][0-9,]*(?:\.[0-9]+)?)").ok()
});

static IGNORED_TEXT: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("script, style, noscript, template").ok());

/// Result of extracting a listing page. Either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Display price, e.g. `"₹1,499"` or `"₹1499.00"`.
    pub price: Option<String>,
    /// Product title with whitespace collapsed.
    pub title: Option<String>,
}

/// Extracts price and title from `html` using the retailer's rules.
///
/// Price absence is a normal outcome, not an error.
#[must_use]
pub fn extract_listing(html: &str, rules: &RetailerRules) -> Extraction {
    let document = Html::parse_document(html);
    let price = extract_price(&document, rules);
    let title = extract_title(&document, rules);
    if price.is_none() {
        tracing::debug!(retailer = %rules.key, "no price candidate matched");
    }
    Extraction { price, title }
}

fn extract_price(document: &Html, rules: &RetailerRules) -> Option<String> {
    rules
        .price_candidates
        .iter()
        .find_map(|candidate| match candidate {
            PriceCandidate::Text(selector) => text_candidate(document, selector, rules),
            PriceCandidate::Components {
                container,
                symbol,
                whole,
                fraction,
            } => document
                .select(container)
                .filter(|el| !is_hidden(*el, &rules.hidden_classes))
                .find_map(|el| {
                    assemble_components(
                        symbol.as_ref().and_then(|s| first_text(el, s)).as_deref(),
                        &first_text(el, whole)?,
                        fraction.as_ref().and_then(|s| first_text(el, s)).as_deref(),
                    )
                }),
        })
        .or_else(|| scan_document(document, rules))
}

fn text_candidate(document: &Html, selector: &Selector, rules: &RetailerRules) -> Option<String> {
    document
        .select(selector)
        .filter(|el| !is_hidden(*el, &rules.hidden_classes))
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| text.chars().any(|c| c.is_ascii_digit()))
}

/// Joins symbol, whole and fraction parts into `symbol + whole + "." + 2 digits`.
///
/// Thousands separators and a trailing decimal point are stripped from the
/// whole part. The fraction is right-padded with zeros or truncated to two
/// digits; an absent fraction becomes `00`.
#[must_use]
pub fn assemble_components(symbol: Option<&str>, whole: &str, fraction: Option<&str>) -> Option<String> {
    let whole: String = whole
        .trim()
        .trim_end_matches('.')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut fraction: String = fraction
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .take(2)
        .collect();
    while fraction.len() < 2 {
        fraction.push('0');
    }

    let symbol = symbol.map(str::trim).unwrap_or_default();
    Some(format!("{symbol}{whole}.{fraction}"))
}

fn scan_document(document: &Html, rules: &RetailerRules) -> Option<String> {
    let re = CURRENCY_AMOUNT.as_ref()?;
    let text = visible_text(document, &rules.hidden_classes);
    re.captures_iter(&text).find_map(|caps| {
        let symbol = caps.get(1)?.as_str();
        let digits: String = caps.get(2)?.as_str().chars().filter(|c| *c != ',').collect();
        let amount = Decimal::from_str(&digits).ok()?;
        if amount < rules.price_floor || amount > rules.price_ceiling {
            return None;
        }
        let normalized = amount.round_dp(2);
        tracing::debug!(retailer = %rules.key, %normalized, "price recovered by document scan");
        Some(format!("{symbol}{normalized:.2}"))
    })
}

/// Text of every element not inside a script, a style block, or a hidden
/// subtree. Hidden ancestors are checked per text node.
fn visible_text(document: &Html, hidden_classes: &[String]) -> String {
    let ignored: HashSet<_> = IGNORED_TEXT
        .as_ref()
        .map(|s| document.select(s).map(|el| el.id()).collect())
        .unwrap_or_default();

    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            ignored.contains(&a.id())
                || ElementRef::wrap(a).is_some_and(|el| is_self_hidden(el, hidden_classes))
        });
        if !skipped {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

fn extract_title(document: &Html, rules: &RetailerRules) -> Option<String> {
    rules.title_selectors.iter().find_map(|selector| {
        document.select(selector).find_map(|el| {
            let raw = if el.value().name() == "meta" {
                el.value().attr("content").map(str::to_string)
            } else {
                Some(el.text().collect::<String>())
            };
            raw.map(|t| collapse_whitespace(&t)).filter(|t| !t.is_empty())
        })
    })
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

/// Whether `element` or any ancestor is hidden.
fn is_hidden(element: ElementRef<'_>, hidden_classes: &[String]) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .any(|el| is_self_hidden(el, hidden_classes))
}

fn is_self_hidden(element: ElementRef<'_>, hidden_classes: &[String]) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    if let Some(style) = value.attr("style") {
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    value
        .classes()
        .any(|class| hidden_classes.iter().any(|h| h == class))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
