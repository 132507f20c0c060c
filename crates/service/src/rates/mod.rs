//! Rates resource: the provider seam consumed by transports and the
//! file-checkpointed store implementing it.

pub mod provider;
pub mod store;

pub use provider::RatesProvider;
pub use store::RateStore;
