use payment_gateway_webhooks::config::Config;
use payment_gateway_webhooks::server::Server;
use payment_gateway_webhooks::telemetry;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        webhook = ?config.webhook,
        merchant_id = %config.merchant.id,
        "Loaded configuration"
    );

    // Create and run server
    let server = Server::new(&config).await?;
    server.run().await
}
