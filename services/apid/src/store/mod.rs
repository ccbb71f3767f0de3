use crate::context::RequestContext;
use crate::model::Resource;
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for one resource type, keyed by resource name.
///
/// Every call receives the request context so backends can stop work once the
/// request is cancelled. Concurrent writers to the same name are resolved by
/// the backend (last write wins for the shipped backends).
#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// All resources of this type, in the backend's iteration order.
    async fn get_all(&self, ctx: &RequestContext) -> StoreResult<Vec<R>>;
    async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<Option<R>>;
    async fn upsert(&self, ctx: &RequestContext, resource: R) -> StoreResult<()>;
    /// Deleting a missing name is a no-op.
    async fn delete_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
