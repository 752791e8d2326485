// Webhook delivery
//
//   engine            – facade used by the server and the binary
//   event_emitter     – fans a payment event out to merchant endpoints
//   delivery_scheduler – signs, POSTs and records one attempt
//   retry_controller  – validates and serializes retries
//   retry_worker      – retries failed attempts when their backoff elapses

pub mod delivery_scheduler;
pub mod engine;
pub mod error;
pub mod event_emitter;
pub mod hmac_signer;
pub mod http_client;
pub mod in_flight;
pub mod retry_controller;
pub mod retry_strategy;
pub mod retry_worker;
pub mod schemas;

// Re-export commonly used types
pub use delivery_scheduler::DeliveryScheduler;
pub use engine::WebhookEngine;
pub use error::WebhookError;
pub use event_emitter::EventEmitter;
pub use hmac_signer::{HmacSigner, SIGNATURE_HEADER, SignerError, sign};
pub use http_client::{DeliveryResponse, HttpClientError, WebhookHttpClient};
pub use retry_controller::RetryController;
pub use retry_strategy::RetryStrategy;
pub use retry_worker::RetryWorker;
pub use schemas::WebhookPayload;
