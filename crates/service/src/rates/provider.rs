use async_trait::async_trait;
use models::Rate;

use crate::errors::ServiceError;
use crate::pagination::Pagination;

/// Trait abstraction for the rates collection.
/// `principal` is the opaque caller identity supplied by the transport.
#[async_trait]
pub trait RatesProvider: Send + Sync {
    async fn list(&self, query: Option<&str>, query_type: Option<&str>, page: Pagination) -> Vec<Rate>;
    async fn create(&self, rate: Rate, principal: &str) -> Result<Rate, ServiceError>;
    async fn read(&self, id: &str) -> Result<Rate, ServiceError>;
    async fn update(&self, id: &str, rate: Rate, principal: &str) -> Result<Rate, ServiceError>;
    async fn delete(&self, id: &str) -> Result<(), ServiceError>;
}
