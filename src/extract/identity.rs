//! Canonical product ID extraction from retailer URLs.

use url::Url;

use super::rules::{IdPattern, RetailerRules};
use crate::fetch::canonicalize::extract_first_url;

/// No ID pattern of the retailer matched the URL.
///
/// This is a statement about the link, not the network: the page was never
/// fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no product id found in {input}")]
pub struct IdentityNotFound {
    /// The URL or text that was examined.
    pub input: String,
}

impl From<IdentityNotFound> for crate::error::TrackerError {
    fn from(err: IdentityNotFound) -> Self {
        Self::IdentityNotFound(err.input)
    }
}

/// Extracts the canonical product ID from a resolved URL (or text holding
/// one) using the retailer's ordered patterns. The first match wins.
///
/// # Errors
///
/// Returns [`IdentityNotFound`] when no pattern matches.
pub fn extract_product_id(input: &str, rules: &RetailerRules) -> Result<String, IdentityNotFound> {
    let candidate = extract_first_url(input).unwrap_or(input).trim();
    let parsed = Url::parse(candidate).ok();

    let path = parsed.as_ref().map_or(candidate, Url::path);

    for pattern in &rules.id_patterns {
        let found = match pattern {
            IdPattern::Path(re) => re
                .captures(path)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            IdPattern::Query(param) => parsed.as_ref().and_then(|url| {
                url.query_pairs()
                    .find(|(k, v)| k == param.as_str() && !v.trim().is_empty())
                    .map(|(_, v)| v.trim().to_string())
            }),
        };
        if let Some(id) = found.filter(|id| !id.is_empty()) {
            return Ok(id);
        }
    }

    Err(IdentityNotFound {
        input: candidate.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::extract::RuleTable;

    fn rules(key: &str) -> RetailerRules {
        let Ok(table) = RuleTable::builtin() else {
            panic!("builtin rules compile");
        };
        let Some(rules) = table.get(key) else {
            panic!("retailer {key} exists");
        };
        rules.clone()
    }

    #[test]
    fn amazon_dp_path() {
        let amazon = rules("amazon");
        assert_eq!(
            extract_product_id("https://www.amazon.in/dp/B0CXYZ1234/", &amazon),
            Ok("B0CXYZ1234".to_string())
        );
        assert_eq!(
            extract_product_id("/dp/B0CXYZ1234/", &amazon),
            Ok("B0CXYZ1234".to_string())
        );
    }

    #[test]
    fn amazon_slug_and_gp_paths() {
        let amazon = rules("amazon");
        assert_eq!(
            extract_product_id(
                "https://www.amazon.in/Some-Phone-Name/dp/B0ABCDE123?ref=xyz&th=1",
                &amazon
            ),
            Ok("B0ABCDE123".to_string())
        );
        assert_eq!(
            extract_product_id("https://www.amazon.com/gp/product/B012345678", &amazon),
            Ok("B012345678".to_string())
        );
    }

    #[test]
    fn amazon_query_fallback() {
        let amazon = rules("amazon");
        assert_eq!(
            extract_product_id("https://www.amazon.in/s?asin=B0QUERY123", &amazon),
            Ok("B0QUERY123".to_string())
        );
    }

    #[test]
    fn flipkart_pid_query_wins_over_path() {
        let flipkart = rules("flipkart");
        assert_eq!(
            extract_product_id(
                "https://www.flipkart.com/phone/p/itm6ac6485515ae4?pid=MOBGTAGPTB3VS24W&lid=x",
                &flipkart
            ),
            Ok("MOBGTAGPTB3VS24W".to_string())
        );
        assert_eq!(
            extract_product_id("https://www.flipkart.com/phone/p/itm6ac6485515ae4", &flipkart),
            Ok("itm6ac6485515ae4".to_string())
        );
    }

    #[test]
    fn url_embedded_in_text() {
        let amazon = rules("amazon");
        assert_eq!(
            extract_product_id("track https://amazon.in/dp/B0CXYZ1234 please", &amazon),
            Ok("B0CXYZ1234".to_string())
        );
    }

    #[test]
    fn no_pattern_is_identity_not_found() {
        let amazon = rules("amazon");
        let Err(err) = extract_product_id("https://www.amazon.in/gp/bestsellers", &amazon) else {
            panic!("no id in a listing page");
        };
        assert_eq!(err.input, "https://www.amazon.in/gp/bestsellers");
    }
}
