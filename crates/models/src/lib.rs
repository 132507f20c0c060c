//! Domain entities for the rates service.
//! - `rate`: the Rate record, its validation helpers and defaults.
//! - `currency`: enumerations with a designated default value each.

pub mod errors;
pub mod currency;
pub mod rate;

pub use currency::{Currency, RateType};
pub use rate::{Rate, RateDefaults};
