//! Card formatting for tracking notifications.
//!
//! Cards are plain text; delivery channels decide how to style them.

use chrono::{DateTime, Utc};

use crate::domain::notification::stop_callback_data;
use crate::domain::{CardAction, NotificationCard, PriceChange, PriceDirection, Product};

/// Headline of the card sent when tracking starts.
pub const TRACKING_STARTED_HEADLINE: &str = "The Product has Started Tracking!";

fn updated_line(at: DateTime<Utc>) -> String {
    format!("Updated at [ {} ]", at.format("%d %b %Y, %H:%M"))
}

fn actions(product: &Product) -> Vec<CardAction> {
    vec![
        CardAction::OpenUrl {
            label: "Buy Now".to_string(),
            url: product.source_url.clone(),
        },
        CardAction::Callback {
            label: "Stop Tracking".to_string(),
            data: stop_callback_data(&product.canonical_id),
        },
    ]
}

/// Card confirming that `product` is now tracked at `price`.
#[must_use]
pub fn tracking_started(product: &Product, price: &str, at: DateTime<Utc>) -> NotificationCard {
    NotificationCard {
        headline: TRACKING_STARTED_HEADLINE.to_string(),
        body: format!(
            "{}\n\nCurrent Price: {price}\n\n{}",
            product.name_or_default(),
            updated_line(at)
        ),
        actions: actions(product),
    }
}

/// Card announcing a new price, with direction and delta when both prices
/// parse.
#[must_use]
pub fn price_changed(
    product: &Product,
    price: &str,
    previous: Option<&str>,
    at: DateTime<Utc>,
) -> NotificationCard {
    let change = previous.and_then(|prev| PriceChange::classify(prev, price));

    let headline = match &change {
        Some(c) if c.direction == PriceDirection::Unchanged => format!("Price Unchanged: {price}"),
        Some(c) => format!("Product Price is {} by {}.", c.direction, c.delta_display()),
        None => format!("New Price: {price}"),
    };

    let prices = match &change {
        Some(c) if c.direction != PriceDirection::Unchanged => format!(
            "Previous price: {}\nCurrent Price: {}",
            c.previous_display(),
            c.current_display()
        ),
        _ => format!("Current Price: {price}"),
    };

    NotificationCard {
        headline,
        body: format!(
            "{}\n\n{prices}\n\n{}",
            product.name_or_default(),
            updated_line(at)
        ),
        actions: actions(product),
    }
}
