//! In-memory implementation of the resource store.
//!
//! # Purpose
//! Implements [`ResourceStore`] for every [`Resource`] type on top of a single
//! map of collections guarded by `tokio::sync::RwLock`. It exists for local
//! development, tests, and deployments where durability is not required.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - Reads take a read lock; writes take the write lock, so writers to the same
//!   name are serialized and the last write wins.
//! - Resources are stored as JSON documents keyed by kind and name, mirroring
//!   the Postgres layout. Iteration order within a kind is by name.
use super::{ResourceStore, StoreBackend, StoreError, StoreResult};
use crate::context::RequestContext;
use crate::model::Resource;
use crate::observability;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Collection = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// Collections keyed by `Resource::KIND`.
    collections: Arc<RwLock<HashMap<&'static str, Collection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode<R: Resource>(value: &Value) -> StoreResult<R> {
    serde_json::from_value(value.clone())
        .with_context(|| format!("decode stored {}", R::KIND))
        .map_err(StoreError::from)
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for InMemoryStore {
    async fn get_all(&self, ctx: &RequestContext) -> StoreResult<Vec<R>> {
        ctx.check_cancelled()?;
        let collections = self.collections.read().await;
        match collections.get(R::KIND) {
            Some(collection) => collection.values().map(decode::<R>).collect(),
            None => Ok(Vec::new()),
        }
    }

    async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<Option<R>> {
        ctx.check_cancelled()?;
        let collections = self.collections.read().await;
        collections
            .get(R::KIND)
            .and_then(|collection| collection.get(name))
            .map(decode::<R>)
            .transpose()
    }

    async fn upsert(&self, ctx: &RequestContext, resource: R) -> StoreResult<()> {
        ctx.check_cancelled()?;
        let value = serde_json::to_value(&resource)
            .with_context(|| format!("encode {}", R::KIND))?;
        let mut collections = self.collections.write().await;
        let collection = collections.entry(R::KIND).or_default();
        collection.insert(resource.name().to_string(), value);
        observability::record_resource_count(R::KIND, collection.len());
        Ok(())
    }

    async fn delete_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<()> {
        ctx.check_cancelled()?;
        let mut collections = self.collections.write().await;
        if let Some(collection) = collections.get_mut(R::KIND) {
            collection.remove(name);
            observability::record_resource_count(R::KIND, collection.len());
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
