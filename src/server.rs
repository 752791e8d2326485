mod auth;
mod handlers;
mod responses;

pub use auth::{API_KEY_HEADER, API_SECRET_HEADER, AuthenticatedMerchant};
pub use handlers::webhooks::{EndpointRequest, SecretResponse};
pub use responses::{ApiError, ErrorBody};

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::Config;
use crate::domain::ports::MerchantStore;
use crate::infrastructure::{InMemoryAttemptLedger, InMemoryMerchantStore};
use crate::outbound::webhook::WebhookEngine;
use crate::server::handlers::health::health_check;
use crate::server::handlers::root::home;
use crate::server::handlers::webhooks::{
    configure_endpoint, delivery_stats, list_deliveries, regenerate_secret, retry_delivery,
    send_test_webhook,
};
use axum::http::Method;
use axum::{
    Router,
    routing::{get, post, put},
};
use color_eyre::eyre::{Context, Result};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
/// The global application state shared between all request handlers.
pub struct AppState {
    pub engine: Arc<WebhookEngine>,
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    port: u16,
    engine: Arc<WebhookEngine>,
    retry_poll_interval: Duration,
}

impl Server {
    /// Creates a server over in-memory stores, seeded with the configured merchant.
    pub async fn new(config: &Config) -> Result<Self> {
        let merchants = InMemoryMerchantStore::new();
        merchants.insert(config.merchant.to_merchant()).await;

        let engine = WebhookEngine::from_config(
            &config.webhook,
            Arc::new(InMemoryAttemptLedger::new()),
            Arc::new(merchants),
        )
        .wrap_err("Failed to initialise webhook engine")?;

        Self::with_engine(config, Arc::new(engine)).await
    }

    /// Creates a server around an existing engine.
    pub async fn with_engine(config: &Config, engine: Arc<WebhookEngine>) -> Result<Self> {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ]);

        let state = AppState {
            engine: engine.clone(),
        };

        let api = Router::new()
            .route("/webhooks", get(list_deliveries))
            .route("/webhooks/stats", get(delivery_stats))
            .route("/webhooks/test", post(send_test_webhook))
            .route("/webhooks/endpoint", put(configure_endpoint))
            .route("/webhooks/endpoint/secret", post(regenerate_secret))
            .route("/webhooks/{id}/retry", post(retry_delivery));

        let router = Router::new()
            .route("/", get(home))
            .route("/health", get(health_check))
            .nest("/api/v1", api)
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .wrap_err_with(|| format!("Failed to bind to port {}", config.server.port))?;
        let port = listener
            .local_addr()
            .wrap_err("Failed to read the bound address")?
            .port();

        Ok(Self {
            router,
            listener,
            port,
            engine,
            retry_poll_interval: config.webhook.retry_poll_interval(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn engine(&self) -> Arc<WebhookEngine> {
        self.engine.clone()
    }

    /// Runs the server and the automatic retry worker until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = self
            .engine
            .retry_worker(self.retry_poll_interval)
            .start(shutdown_rx);

        tracing::info!("Server listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let _ = shutdown_tx.send(true);
        worker.await.wrap_err("Retry worker failed")?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
