//! Compiled per-retailer extraction rules.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use rust_decimal::Decimal;
use scraper::Selector;
use serde::Deserialize;
use url::Url;

use super::RulesError;
use crate::fetch::RenderMode;

/// Rule table shipped with the binary.
const BUILTIN_RULES: &str = include_str!("../../rules/retailers.json");

/// Default lower bound for prices accepted by the document scan.
const DEFAULT_PRICE_FLOOR: u64 = 1;
/// Default upper bound for prices accepted by the document scan.
const DEFAULT_PRICE_CEILING: u64 = 10_000_000;

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTable {
    version: String,
    retailers: Vec<RawRetailer>,
}

#[derive(Debug, Deserialize)]
struct RawRetailer {
    key: String,
    display_name: String,
    hosts: Vec<String>,
    #[serde(default)]
    short_hosts: Vec<String>,
    id_patterns: Vec<RawIdPattern>,
    price_candidates: Vec<RawPriceCandidate>,
    #[serde(default)]
    title_selectors: Vec<String>,
    #[serde(default)]
    hidden_classes: Vec<String>,
    render_mode: RenderMode,
    #[serde(default)]
    price_floor: Option<u64>,
    #[serde(default)]
    price_ceiling: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawIdPattern {
    Path { pattern: String },
    Query { param: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawPriceCandidate {
    Text {
        selector: String,
    },
    Components {
        container: String,
        #[serde(default)]
        symbol: Option<String>,
        whole: String,
        #[serde(default)]
        fraction: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Compiled shape
// ---------------------------------------------------------------------------

/// One way of locating a product ID in a URL.
#[derive(Debug, Clone)]
pub enum IdPattern {
    /// Regex applied to the URL path; capture group 1 is the ID.
    Path(Regex),
    /// Name of a query parameter holding the ID.
    Query(String),
}

/// One way of locating a price in markup.
#[derive(Debug, Clone)]
pub enum PriceCandidate {
    /// A single element whose text is the whole price.
    Text(Selector),
    /// A container whose children hold symbol, whole and fraction parts.
    Components {
        /// Container element.
        container: Selector,
        /// Currency symbol, relative to the container.
        symbol: Option<Selector>,
        /// Whole-unit digits, relative to the container.
        whole: Selector,
        /// Fractional digits, relative to the container.
        fraction: Option<Selector>,
    },
}

/// Compiled rules for a single retailer.
#[derive(Debug, Clone)]
pub struct RetailerRules {
    /// Stable retailer key (e.g. `"amazon"`).
    pub key: String,
    /// Human-readable retailer name.
    pub display_name: String,
    /// Registrable hosts of product pages; subdomains match too.
    pub hosts: Vec<String>,
    /// Short-link hosts whose redirect needs script execution.
    pub short_hosts: Vec<String>,
    /// Ordered product-ID patterns; first match wins.
    pub id_patterns: Vec<IdPattern>,
    /// Ordered price candidates; first visible match wins.
    pub price_candidates: Vec<PriceCandidate>,
    /// Ordered title selectors.
    pub title_selectors: Vec<Selector>,
    /// Class names that hide an element and its descendants.
    pub hidden_classes: Vec<String>,
    /// How product pages must be fetched.
    pub render_mode: RenderMode,
    /// Smallest amount accepted by the document scan.
    pub price_floor: Decimal,
    /// Largest amount accepted by the document scan.
    pub price_ceiling: Decimal,
}

impl RetailerRules {
    /// Whether `host` is one of this retailer's product hosts.
    #[must_use]
    pub fn matches_host(&self, host: &str) -> bool {
        host_in(host, &self.hosts)
    }

    /// Whether `host` is one of this retailer's short-link hosts.
    #[must_use]
    pub fn matches_short_host(&self, host: &str) -> bool {
        host_in(host, &self.short_hosts)
    }

    fn compile(raw: RawRetailer) -> Result<Self, RulesError> {
        let key = raw.key;
        if raw.hosts.is_empty() {
            return Err(RulesError::Invalid(format!("retailer {key} has no hosts")));
        }
        if raw.id_patterns.is_empty() || raw.price_candidates.is_empty() {
            return Err(RulesError::Invalid(format!(
                "retailer {key} needs id patterns and price candidates"
            )));
        }

        let id_patterns = raw
            .id_patterns
            .into_iter()
            .map(|p| match p {
                RawIdPattern::Path { pattern } => Regex::new(&pattern)
                    .map(IdPattern::Path)
                    .map_err(|source| RulesError::InvalidPattern {
                        retailer: key.clone(),
                        pattern,
                        source,
                    }),
                RawIdPattern::Query { param } => Ok(IdPattern::Query(param)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let price_candidates = raw
            .price_candidates
            .into_iter()
            .map(|c| match c {
                RawPriceCandidate::Text { selector } => {
                    Ok(PriceCandidate::Text(parse_selector(&key, &selector)?))
                }
                RawPriceCandidate::Components {
                    container,
                    symbol,
                    whole,
                    fraction,
                } => Ok(PriceCandidate::Components {
                    container: parse_selector(&key, &container)?,
                    symbol: symbol.map(|s| parse_selector(&key, &s)).transpose()?,
                    whole: parse_selector(&key, &whole)?,
                    fraction: fraction.map(|s| parse_selector(&key, &s)).transpose()?,
                }),
            })
            .collect::<Result<Vec<_>, RulesError>>()?;

        let title_selectors = raw
            .title_selectors
            .iter()
            .map(|s| parse_selector(&key, s))
            .collect::<Result<Vec<_>, _>>()?;

        let price_floor = Decimal::from(raw.price_floor.unwrap_or(DEFAULT_PRICE_FLOOR));
        let price_ceiling = Decimal::from(raw.price_ceiling.unwrap_or(DEFAULT_PRICE_CEILING));
        if price_floor > price_ceiling {
            return Err(RulesError::Invalid(format!(
                "retailer {key}: price_floor exceeds price_ceiling"
            )));
        }

        Ok(Self {
            display_name: raw.display_name,
            hosts: normalize_hosts(raw.hosts),
            short_hosts: normalize_hosts(raw.short_hosts),
            id_patterns,
            price_candidates,
            title_selectors,
            hidden_classes: raw.hidden_classes,
            render_mode: raw.render_mode,
            price_floor,
            price_ceiling,
            key,
        })
    }
}

/// Immutable, versioned set of retailer rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    version: String,
    retailers: Vec<RetailerRules>,
}

impl RuleTable {
    /// Compiles the rule table embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the embedded table fails to compile.
    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_json(BUILTIN_RULES)
    }

    /// Compiles the table at `path`, or the embedded one when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Io`] if the file cannot be read, or another
    /// [`RulesError`] if it fails to compile.
    pub fn load(path: Option<&Path>) -> Result<Self, RulesError> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let json = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Compiles a rule table from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] for malformed JSON, invalid selectors or
    /// patterns, and duplicate retailer keys.
    pub fn from_json(json: &str) -> Result<Self, RulesError> {
        let raw: RawTable = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        let retailers = raw
            .retailers
            .into_iter()
            .map(|r| {
                if !seen.insert(r.key.clone()) {
                    return Err(RulesError::Invalid(format!("duplicate retailer {}", r.key)));
                }
                RetailerRules::compile(r)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(version = %raw.version, retailers = retailers.len(), "rule table compiled");
        Ok(Self {
            version: raw.version,
            retailers,
        })
    }

    /// Table version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All retailers in declaration order.
    #[must_use]
    pub fn retailers(&self) -> &[RetailerRules] {
        &self.retailers
    }

    /// Looks a retailer up by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RetailerRules> {
        self.retailers.iter().find(|r| r.key == key)
    }

    /// Retailer whose product hosts include the host of `url`.
    #[must_use]
    pub fn match_url(&self, url: &str) -> Option<&RetailerRules> {
        let host = host_of(url)?;
        self.retailers.iter().find(|r| r.matches_host(&host))
    }

    /// Retailer whose short-link hosts include the host of `url`.
    #[must_use]
    pub fn match_short_url(&self, url: &str) -> Option<&RetailerRules> {
        let host = host_of(url)?;
        self.retailers.iter().find(|r| r.matches_short_host(&host))
    }
}

/// Lowercased host of `url`, without a leading `www.`.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map_or_else(|| host.clone(), str::to_string))
}

fn host_in(host: &str, hosts: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    hosts.iter().any(|h| {
        host == *h
            || host
                .strip_suffix(h.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

fn normalize_hosts(hosts: Vec<String>) -> Vec<String> {
    hosts
        .into_iter()
        .map(|h| h.trim().trim_start_matches("www.").to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

fn parse_selector(retailer: &str, selector: &str) -> Result<Selector, RulesError> {
    Selector::parse(selector).map_err(|e| RulesError::InvalidSelector {
        retailer: retailer.to_string(),
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
