pub mod ledger;
pub mod merchants;

pub use ledger::InMemoryAttemptLedger;
pub use merchants::InMemoryMerchantStore;
