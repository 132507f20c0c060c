use async_trait::async_trait;

use crate::errors::ServiceError;

/// Trait abstraction for whole-collection persistence.
/// Implementations read the full record set once at startup and rewrite it
/// after each mutation; they are not append logs.
#[async_trait]
pub trait RecordGateway<V>: Send + Sync
where
    V: Send + Sync,
{
    /// Whether exports reach durable storage. Fixed at construction.
    fn is_persistent(&self) -> bool;

    /// Load every stored record. Missing storage yields an empty set.
    async fn import(&self) -> Result<Vec<V>, ServiceError>;

    /// Replace the stored record set with `records`.
    async fn export(&self, records: &[V]) -> Result<(), ServiceError>;
}
