pub mod events;
pub mod models;
pub mod ports;

pub use events::{EventKind, PaymentEvent};
pub use models::{DeliveryAttempt, DeliveryStatus, Merchant, WebhookEndpoint};
pub use ports::{AttemptLedger, AttemptPage, AttemptQuery, LedgerError, MerchantStore, StatusCounts};
