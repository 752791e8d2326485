use std::collections::HashMap;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigBuilder, ConfigError, Environment, builder::DefaultState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{Merchant, WebhookEndpoint};
use crate::outbound::webhook::RetryStrategy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub merchant: MerchantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Bound on one delivery, in seconds
    pub timeout_secs: u64,

    /// Cap on HTTP tries per attempt, the first delivery included
    pub max_attempts: u32,

    pub retry_poll_interval_secs: u64,

    /// Use the short 5/10/15/20 second backoff instead of the production one
    pub test_intervals: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 5,
            retry_poll_interval_secs: 10,
            test_intervals: false,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_poll_interval(&self) -> Duration {
        Duration::from_secs(self.retry_poll_interval_secs)
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        let strategy = if self.test_intervals {
            RetryStrategy::test_mode()
        } else {
            RetryStrategy::production()
        };
        strategy.with_max_attempts(self.max_attempts)
    }
}

/// Merchant registered at start-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub api_secret: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl MerchantConfig {
    pub fn to_merchant(&self) -> Merchant {
        let merchant = Merchant::new(self.id, &self.name, &self.api_key, &self.api_secret);
        match (&self.webhook_url, &self.webhook_secret) {
            (Some(url), Some(secret)) => merchant.with_webhook(WebhookEndpoint::new(url, secret)),
            _ => merchant,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    fn load_with_sources(env_vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults()?;
        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format APP_SERVER__HOST or APP_WEBHOOK__TIMEOUT_SECS
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Set default values for the configuration.
    /// This is used when no environment variables or config file are provided
    fn set_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let webhook = WebhookConfig::default();

        ConfigLib::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("webhook.timeout_secs", webhook.timeout_secs as i64)?
            .set_default("webhook.max_attempts", webhook.max_attempts as i64)?
            .set_default(
                "webhook.retry_poll_interval_secs",
                webhook.retry_poll_interval_secs as i64,
            )?
            .set_default("webhook.test_intervals", webhook.test_intervals)?
            .set_default("merchant.id", "00000000-0000-0000-0000-000000000001")?
            .set_default("merchant.name", "Test Merchant")?
            .set_default("merchant.api_key", "key_test_abc123")?
            .set_default("merchant.api_secret", "secret_test_xyz789")
    }
}
