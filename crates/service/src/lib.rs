//! Service layer providing the rates collection on top of models.
//! - `storage`: whole-collection persistence behind the `RecordGateway` seam.
//! - `rates`: the indexed store applying identity, validation and audit rules.
//! - `pagination`: listing windows shared by providers and transports.

pub mod errors;
pub mod pagination;
pub mod rates;
pub mod runtime;
pub mod storage;
