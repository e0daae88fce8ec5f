//! End-to-end: REST and WebSocket against an in-memory store and a scripted
//! fetcher.

#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use price_tracker::config::TrackerConfig;
use price_tracker::extract::RuleTable;
use price_tracker::fetch::{FetchError, FetchedPage, Fetcher, RenderMode};
use price_tracker::persistence::MemoryStore;
use price_tracker::startup;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serves an Amazon-shaped page whose price and latency the test can change.
#[derive(Debug)]
struct ScriptedFetcher {
    price: Mutex<String>,
    delay: Mutex<Duration>,
}

impl ScriptedFetcher {
    fn new(price: &str) -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(price.to_string()),
            delay: Mutex::new(Duration::ZERO),
        })
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn resolve_redirects(&self, raw: &str) -> String {
        raw.to_string()
    }

    async fn resolve_rendered(&self, url: &str) -> Result<String, FetchError> {
        Ok(url.to_string())
    }

    async fn fetch(&self, url: &str, _mode: RenderMode) -> Result<FetchedPage, FetchError> {
        let delay = *self.delay.lock().await;
        tokio::time::sleep(delay).await;
        let price = self.price.lock().await.clone();
        Ok(FetchedPage {
            html: format!(
                r#"<html><body>
                <span id="productTitle"> Noise Cancelling Headphones </span>
                <div id="corePriceDisplay_desktop_feature_div">
                  <span class="a-price"><span class="a-offscreen">{price}</span></span>
                </div></body></html>"#
            ),
            final_url: url.to_string(),
        })
    }
}

async fn spawn_app(fetcher: Arc<ScriptedFetcher>) -> SocketAddr {
    spawn_app_with(fetcher, &TrackerConfig::default(), Duration::from_secs(30)).await
}

async fn spawn_app_with(
    fetcher: Arc<ScriptedFetcher>,
    config: &TrackerConfig,
    request_timeout: Duration,
) -> SocketAddr {
    let Ok(rules) = RuleTable::builtin() else {
        panic!("builtin rules compile");
    };
    let Ok(state) = startup::assemble(
        config,
        Arc::new(MemoryStore::new()),
        fetcher,
        Arc::new(rules),
    ) else {
        panic!("state assembles");
    };
    let app = startup::router(state, request_timeout);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn next_json(ws: &mut Ws) -> Value {
    let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await else {
        panic!("ws message within timeout");
    };
    let Ok(text) = msg.to_text() else {
        panic!("text frame");
    };
    let Ok(value) = serde_json::from_str(text) else {
        panic!("json frame: {text}");
    };
    value
}

async fn send_command(ws: &mut Ws, id: &str, payload: Value) {
    let envelope = json!({
        "id": id,
        "type": "command",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "payload": payload,
    });
    let Ok(()) = ws.send(Message::text(envelope.to_string())).await else {
        panic!("ws send");
    };
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let Ok(resp) = client.post(url).json(&body).send().await else {
        panic!("request sent");
    };
    let status = resp.status().as_u16();
    let Ok(json) = resp.json::<Value>().await else {
        panic!("json body");
    };
    (status, json)
}

async fn get(client: &reqwest::Client, url: String) -> (u16, Value) {
    let Ok(resp) = client.get(url).send().await else {
        panic!("request sent");
    };
    let status = resp.status().as_u16();
    let Ok(json) = resp.json::<Value>().await else {
        panic!("json body");
    };
    (status, json)
}

#[tokio::test]
async fn track_sweep_and_stop_over_rest_and_ws() {
    let fetcher = ScriptedFetcher::new("₹1,499.00");
    let addr = spawn_app(Arc::clone(&fetcher)).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connects");
    };
    send_command(
        &mut ws,
        "sub-1",
        json!({ "command": "subscribe", "recipients": ["42"] }),
    )
    .await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["id"], "sub-1");
    assert_eq!(ack["payload"]["count"], 1);

    let (status, body) = post(
        &client,
        format!("{base}/api/v1/track"),
        json!({
            "external_id": "42",
            "display_name": "Asha",
            "text": "look at this https://www.amazon.in/dp/B0CXYZ1234/ref=sr_1_1",
        }),
    )
    .await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(body["outcome"], "subscribed");
    assert_eq!(body["product"]["canonical_id"], "B0CXYZ1234");
    assert_eq!(body["product"]["last_known_price"], "₹1,499.00");
    assert_eq!(body["product"]["display_name"], "Noise Cancelling Headphones");

    let started = next_json(&mut ws).await;
    assert_eq!(started["type"], "event");
    assert_eq!(started["payload"]["event_type"], "notification_issued");
    assert_eq!(
        started["payload"]["notification"]["card"]["headline"],
        "The Product has Started Tracking!"
    );

    *fetcher.price.lock().await = "₹1,299.00".to_string();
    let (status, report) = post(&client, format!("{base}/api/v1/sweep"), json!({})).await;
    assert_eq!(status, 200, "{report}");
    assert_eq!(report["checked"], 1);
    assert_eq!(report["changed"], 1);
    assert_eq!(report["failed"], 0);

    let changed = next_json(&mut ws).await;
    assert_eq!(
        changed["payload"]["notification"]["card"]["headline"],
        "Product Price is decreased by ₹200."
    );

    let (status, listed) = get(&client, format!("{base}/api/v1/users/42/products")).await;
    assert_eq!(status, 200);
    assert_eq!(listed["data"][0]["last_known_price"], "₹1,299.00");

    let (_, stats) = get(&client, format!("{base}/api/v1/stats")).await;
    assert_eq!(stats, json!({ "users": 1, "products": 1 }));

    let (status, stopped) = post(
        &client,
        format!("{base}/api/v1/callback"),
        json!({ "external_id": "42", "data": "stop_B0CXYZ1234" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(stopped["outcome"], "unsubscribed");
    assert_eq!(stopped["product_deleted"], true);

    let event = next_json(&mut ws).await;
    assert_eq!(event["payload"]["event_type"], "tracking_stopped");
    assert_eq!(event["payload"]["canonical_id"], "B0CXYZ1234");

    let (_, stats) = get(&client, format!("{base}/api/v1/stats")).await;
    assert_eq!(stats["products"], 0);
}

#[tokio::test]
async fn rejections_carry_distinct_codes() {
    let fetcher = ScriptedFetcher::new("₹10");
    let addr = spawn_app(fetcher).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/v1/track"),
        json!({ "external_id": "7", "text": "https://shop.example.com/item/1" }),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], 1002);

    let (status, body) = post(
        &client,
        format!("{base}/api/v1/track"),
        json!({ "external_id": "7", "text": "https://www.amazon.in/gp/help" }),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], 1003);

    let (status, body) = get(&client, format!("{base}/api/v1/users/nobody/products")).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], 2001);
}

#[tokio::test]
async fn system_routes_report_health_and_retailers() {
    let fetcher = ScriptedFetcher::new("₹10");
    let addr = spawn_app(fetcher).await;
    let client = reqwest::Client::new();

    let (status, health) = get(&client, format!("http://{addr}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "healthy");

    let (status, catalog) = get(&client, format!("http://{addr}/config/retailers")).await;
    assert_eq!(status, 200);
    let Some(retailers) = catalog["retailers"].as_array() else {
        panic!("retailer list");
    };
    assert!(retailers.iter().any(|r| r["key"] == "amazon"));
    assert!(retailers.iter().any(|r| r["key"] == "flipkart"));
}

#[tokio::test]
async fn sweep_outlasting_request_timeout_completes() {
    let fetcher = ScriptedFetcher::new("₹1,499.00");
    let config = TrackerConfig {
        sweep_concurrency: 1,
        ..TrackerConfig::default()
    };
    let addr = spawn_app_with(Arc::clone(&fetcher), &config, Duration::from_secs(1)).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    for (user, asin) in [("1", "B0CXYZ1001"), ("2", "B0CXYZ1002"), ("3", "B0CXYZ1003")] {
        let (status, body) = post(
            &client,
            format!("{base}/api/v1/track"),
            json!({ "external_id": user, "text": format!("https://www.amazon.in/dp/{asin}") }),
        )
        .await;
        assert_eq!(status, 201, "{body}");
    }

    // Three sequential fetches at 500ms each run well past the 1s timeout.
    *fetcher.delay.lock().await = Duration::from_millis(500);
    *fetcher.price.lock().await = "₹1,299.00".to_string();

    let (status, report) = post(&client, format!("{base}/api/v1/sweep"), json!({})).await;
    assert_eq!(status, 200, "{report}");
    assert_eq!(report["checked"], 3);
    assert_eq!(report["changed"], 3);

    *fetcher.delay.lock().await = Duration::ZERO;
    for user in ["1", "2", "3"] {
        let (status, listed) = get(&client, format!("{base}/api/v1/users/{user}/products")).await;
        assert_eq!(status, 200);
        assert_eq!(listed["data"][0]["last_known_price"], "₹1,299.00");
    }
}
