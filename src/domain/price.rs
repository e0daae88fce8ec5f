//! Price strings and price-change classification.
//!
//! Prices are stored exactly as extracted (e.g. `"₹1,499.00"`) so currency
//! formatting survives round trips. Comparisons and deltas parse them into a
//! currency symbol plus a [`Decimal`] amount.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// A price string split into its currency symbol and numeric amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrice {
    /// Everything before the first digit, trimmed (`"₹"`, `"Rs."`, `"$"`).
    pub symbol: String,
    /// Numeric amount with thousands separators removed.
    pub amount: Decimal,
}

impl ParsedPrice {
    /// Parses a display price such as `"₹1,499.00"` or `"Rs. 899"`.
    ///
    /// Returns `None` when the string holds no number.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let start = raw.find(|c: char| c.is_ascii_digit())?;
        let symbol = raw.get(..start).unwrap_or_default().trim().to_string();
        let number: String = raw
            .get(start..)
            .unwrap_or_default()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .filter(|c| *c != ',')
            .collect();
        let number = number.trim_end_matches('.');
        let amount = Decimal::from_str(number).ok()?;
        Some(Self { symbol, amount })
    }
}

/// Direction of a price movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriceDirection {
    /// The new price is higher.
    Increased,
    /// The new price is lower.
    Decreased,
    /// Both prices parse to the same amount.
    Unchanged,
}

impl PriceDirection {
    /// Lowercase label used in messages and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Increased => "increased",
            Self::Decreased => "decreased",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for PriceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified movement between a previous and a current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    /// Which way the price moved.
    pub direction: PriceDirection,
    /// Absolute difference between the two amounts.
    pub delta: Decimal,
    /// Currency symbol used for display.
    pub symbol: String,
    /// Previous amount.
    pub previous: Decimal,
    /// Current amount.
    pub current: Decimal,
}

impl PriceChange {
    /// Classifies the move from `previous` to `current`.
    ///
    /// Returns `None` unless both strings parse as prices.
    #[must_use]
    pub fn classify(previous: &str, current: &str) -> Option<Self> {
        let prev = ParsedPrice::parse(previous)?;
        let curr = ParsedPrice::parse(current)?;
        let direction = match curr.amount.cmp(&prev.amount) {
            std::cmp::Ordering::Greater => PriceDirection::Increased,
            std::cmp::Ordering::Less => PriceDirection::Decreased,
            std::cmp::Ordering::Equal => PriceDirection::Unchanged,
        };
        let symbol = if curr.symbol.is_empty() {
            prev.symbol
        } else {
            curr.symbol
        };
        Some(Self {
            direction,
            delta: (curr.amount - prev.amount).abs(),
            symbol,
            previous: prev.amount,
            current: curr.amount,
        })
    }

    /// Delta rendered in whole currency units, e.g. `"₹1,250"`.
    #[must_use]
    pub fn delta_display(&self) -> String {
        format_whole(&self.symbol, self.delta)
    }

    /// Previous amount rendered in whole currency units.
    #[must_use]
    pub fn previous_display(&self) -> String {
        format_whole(&self.symbol, self.previous)
    }

    /// Current amount rendered in whole currency units.
    #[must_use]
    pub fn current_display(&self) -> String {
        format_whole(&self.symbol, self.current)
    }
}

/// Formats `amount` rounded to whole units with `,` thousands separators.
#[must_use]
pub fn format_whole(symbol: &str, amount: Decimal) -> String {
    let rounded = amount.round_dp(0).trunc().abs().to_string();
    format!("{symbol}{}", group_thousands(&rounded))
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_and_amount() {
        let Some(parsed) = ParsedPrice::parse("₹1,499.00") else {
            panic!("expected a price");
        };
        assert_eq!(parsed.symbol, "₹");
        assert_eq!(parsed.amount, Decimal::new(149_900, 2));
    }

    #[test]
    fn parses_word_symbol_with_dot() {
        let Some(parsed) = ParsedPrice::parse("Rs. 899") else {
            panic!("expected a price");
        };
        assert_eq!(parsed.symbol, "Rs.");
        assert_eq!(parsed.amount, Decimal::new(899, 0));
    }

    #[test]
    fn rejects_strings_without_digits() {
        assert!(ParsedPrice::parse("Currently unavailable").is_none());
    }

    #[test]
    fn decrease_is_classified_with_whole_unit_delta() {
        let Some(change) = PriceChange::classify("₹1000.00", "₹900.00") else {
            panic!("both prices parse");
        };
        assert_eq!(change.direction, PriceDirection::Decreased);
        assert_eq!(change.direction.as_str(), "decreased");
        assert_eq!(change.delta_display(), "₹100");
    }

    #[test]
    fn increase_groups_thousands() {
        let Some(change) = PriceChange::classify("₹10,000", "₹12,499.00") else {
            panic!("both prices parse");
        };
        assert_eq!(change.direction, PriceDirection::Increased);
        assert_eq!(change.delta_display(), "₹2,499");
        assert_eq!(change.current_display(), "₹12,499");
    }

    #[test]
    fn equal_amounts_with_different_formatting_are_unchanged() {
        let Some(change) = PriceChange::classify("₹1,499.00", "₹1499") else {
            panic!("both prices parse");
        };
        assert_eq!(change.direction, PriceDirection::Unchanged);
    }

    #[test]
    fn unparseable_side_yields_none() {
        assert!(PriceChange::classify("n/a", "₹10").is_none());
    }
}
