use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{Merchant, WebhookEndpoint};
use crate::domain::ports::MerchantStore;

/// In-memory merchant registry
#[derive(Debug, Default)]
pub struct InMemoryMerchantStore {
    merchants: RwLock<HashMap<Uuid, Merchant>>,
}

impl InMemoryMerchantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merchants(merchants: impl IntoIterator<Item = Merchant>) -> Self {
        let merchants = merchants.into_iter().map(|m| (m.id, m)).collect();
        Self {
            merchants: RwLock::new(merchants),
        }
    }
}

#[async_trait]
impl MerchantStore for InMemoryMerchantStore {
    async fn insert(&self, merchant: Merchant) {
        info!(merchant_id = %merchant.id, name = %merchant.name, "Registering merchant");
        self.merchants.write().await.insert(merchant.id, merchant);
    }

    async fn get(&self, id: Uuid) -> Option<Merchant> {
        self.merchants.read().await.get(&id).cloned()
    }

    async fn authenticate(&self, api_key: &str, api_secret: &str) -> Option<Merchant> {
        let merchants = self.merchants.read().await;
        merchants
            .values()
            .find(|m| m.credentials_match(api_key, api_secret))
            .cloned()
    }

    async fn set_endpoint(&self, id: Uuid, endpoint: WebhookEndpoint) -> Option<Merchant> {
        let mut merchants = self.merchants.write().await;
        let merchant = merchants.get_mut(&id)?;

        info!(merchant_id = %id, url = %endpoint.url, "Webhook endpoint updated");
        merchant.webhook = Some(endpoint);
        Some(merchant.clone())
    }
}
