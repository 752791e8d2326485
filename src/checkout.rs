//! Typed message channel for the embeddable checkout widget.
//!
//! The hosted checkout page reports back with three messages. A
//! [`CheckoutSession`] owns the listener for one open checkout: messages are
//! handled in order on a single task, and dropping the session removes the
//! listener.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_CHECKOUT_BASE_URL: &str = "http://localhost:3001";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Missing required checkout option: {0}")]
    MissingOption(&'static str),

    #[error("Invalid checkout URL: {0}")]
    InvalidUrl(String),

    #[error("Unrecognised checkout message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    #[error("Checkout session is closed")]
    Closed,
}

/// Message posted by the checkout page.
///
/// Tags are snake case; the uppercase spelling used by older pages is still
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutMessage {
    #[serde(rename = "payment_success", alias = "PAYMENT_SUCCESS")]
    Success(Value),

    #[serde(rename = "payment_failed", alias = "PAYMENT_FAILED")]
    Failure(Value),

    #[serde(rename = "close_modal", alias = "CLOSE_MODAL")]
    CloseRequested,
}

impl CheckoutMessage {
    pub fn parse(raw: &str) -> Result<Self, CheckoutError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether handling this message ends the session
    pub fn closes_session(&self) -> bool {
        matches!(
            self,
            CheckoutMessage::Success(_) | CheckoutMessage::CloseRequested
        )
    }
}

/// Callbacks of one checkout session
pub trait CheckoutHandler: Send + 'static {
    fn on_success(&mut self, data: Value);

    /// A failed payment leaves the checkout open for another try.
    fn on_failure(&mut self, data: Value);

    /// Called once when the session closes.
    fn on_close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// Merchant's public API key
    pub key: String,
    pub order_id: String,
    pub base_url: String,
}

impl CheckoutOptions {
    pub fn new(key: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            order_id: order_id.into(),
            base_url: DEFAULT_CHECKOUT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL of the embedded checkout page for this order
    pub fn checkout_url(&self) -> Result<Url, CheckoutError> {
        if self.key.is_empty() {
            return Err(CheckoutError::MissingOption("key"));
        }
        if self.order_id.is_empty() {
            return Err(CheckoutError::MissingOption("order_id"));
        }

        let mut url = Url::parse(&self.base_url)
            .and_then(|base| base.join("checkout"))
            .map_err(|e| CheckoutError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.query_pairs_mut()
            .append_pair("order_id", &self.order_id)
            .append_pair("embedded", "true")
            .append_pair("key", &self.key);
        Ok(url)
    }
}

/// One open checkout and its message listener.
pub struct CheckoutSession {
    url: Url,
    sender: mpsc::UnboundedSender<CheckoutMessage>,
    listener: JoinHandle<()>,
}

impl CheckoutSession {
    /// Open a checkout and start listening for its messages.
    pub fn open<H: CheckoutHandler>(
        options: &CheckoutOptions,
        handler: H,
    ) -> Result<Self, CheckoutError> {
        let url = options.checkout_url()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let listener = tokio::spawn(listen(receiver, handler));

        debug!(order_id = %options.order_id, url = %url, "Checkout session opened");
        Ok(Self {
            url,
            sender,
            listener,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hand a message to the listener
    pub fn post(&self, message: CheckoutMessage) -> Result<(), CheckoutError> {
        self.sender.send(message).map_err(|_| CheckoutError::Closed)
    }

    /// Parse and hand over a raw JSON message from the checkout page
    pub fn post_raw(&self, raw: &str) -> Result<(), CheckoutError> {
        self.post(CheckoutMessage::parse(raw)?)
    }

    /// Close the checkout from the merchant's side
    pub fn close(&self) -> Result<(), CheckoutError> {
        self.post(CheckoutMessage::CloseRequested)
    }

    pub fn is_closed(&self) -> bool {
        self.listener.is_finished()
    }

    /// Wait until the session has closed
    pub async fn closed(mut self) {
        if let Err(e) = (&mut self.listener).await {
            warn!(error = %e, "Checkout listener ended abnormally");
        }
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen<H: CheckoutHandler>(
    mut receiver: mpsc::UnboundedReceiver<CheckoutMessage>,
    mut handler: H,
) {
    while let Some(message) = receiver.recv().await {
        let closes = message.closes_session();
        match message {
            CheckoutMessage::Success(data) => handler.on_success(data),
            CheckoutMessage::Failure(data) => handler.on_failure(data),
            CheckoutMessage::CloseRequested => {}
        }

        if closes {
            handler.on_close();
            break;
        }
    }
    debug!("Checkout session closed");
}
