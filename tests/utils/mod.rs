#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use payment_gateway_webhooks::{
    config::Config, outbound::webhook::WebhookEngine, server::Server, telemetry,
};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const API_KEY: &str = "key_test_abc123";
pub const API_SECRET: &str = "secret_test_xyz789";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct TestApp {
    pub address: String,
    pub engine: Arc<WebhookEngine>,
    pub merchant_id: Uuid,
}

pub async fn spawn_app() -> TestApp {
    telemetry::init_tracing();

    let config = {
        let mut config = Config::load().unwrap();
        config.server.host = "localhost".to_string();
        config.server.port = 0;
        config.webhook.timeout_secs = 1;
        config.merchant.api_key = API_KEY.to_string();
        config.merchant.api_secret = API_SECRET.to_string();
        config.merchant.webhook_url = None;
        config.merchant.webhook_secret = None;
        config
    };

    let server = Server::new(&config).await.unwrap();

    let port = server.port();
    let engine = server.engine();
    tokio::spawn(server.run());

    TestApp {
        address: format!("http://{}:{}", config.server.host, port),
        engine,
        merchant_id: config.merchant.id,
    }
}

pub async fn spawn_server() -> String {
    spawn_app().await.address
}

/// What the mock merchant endpoint saw
#[derive(Debug, Clone)]
pub struct ReceivedWebhook {
    pub signature: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// Merchant webhook receiver with a switchable status and response delay
#[derive(Clone)]
pub struct MockEndpoint {
    pub url: String,
    status: Arc<AtomicU16>,
    delay: Arc<Mutex<Duration>>,
    received: Arc<Mutex<Vec<ReceivedWebhook>>>,
}

impl MockEndpoint {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mock = Self {
            url: format!("http://127.0.0.1:{port}/webhook"),
            status: Arc::new(AtomicU16::new(status)),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            received: Arc::new(Mutex::new(Vec::new())),
        };

        let router = Router::new()
            .route("/webhook", post(receive))
            .with_state(mock.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });

        mock
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn received(&self) -> Vec<ReceivedWebhook> {
        self.received.lock().unwrap().clone()
    }
}

async fn receive(
    State(mock): State<MockEndpoint>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    mock.received.lock().unwrap().push(ReceivedWebhook {
        signature: header("X-Webhook-Signature"),
        content_type: header("Content-Type"),
        body,
    });

    let delay = *mock.delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(mock.status.load(Ordering::SeqCst)).unwrap();
    let body = if status.is_success() { "ok" } else { "error" };
    (status, body)
}
