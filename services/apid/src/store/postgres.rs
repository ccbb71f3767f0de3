//! Postgres-backed resource store.
//!
//! # Purpose
//! Durable implementation of [`ResourceStore`] for every [`Resource`] type.
//! Resources live in a single `resources` table keyed by `(kind, name)` with the
//! validated document stored as JSONB.
//!
//! # Consistency
//! Upserts use `INSERT ... ON CONFLICT DO UPDATE`, so concurrent writers to the
//! same name resolve as last write wins. The existence check the controller
//! performs before a write is not transactional with the write itself.
//!
//! # Security notes
//! - Database URLs may include credentials; avoid logging them.
use super::{ResourceStore, StoreBackend, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::context::RequestContext;
use crate::model::Resource;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use std::time::Duration;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(anyhow::Error::new(err).context("postgres query failed"))
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(anyhow::Error::new(err).context("postgres migration failed"))
    }
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and apply embedded migrations.
    ///
    /// Migrations run before the store is handed to the router so handlers can
    /// assume the schema exists; a migration failure fails startup.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn decode<R: Resource>(body: Value) -> StoreResult<R> {
    serde_json::from_value(body)
        .with_context(|| format!("decode stored {}", R::KIND))
        .map_err(StoreError::from)
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for PostgresStore {
    async fn get_all(&self, ctx: &RequestContext) -> StoreResult<Vec<R>> {
        ctx.check_cancelled()?;
        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT body FROM resources WHERE kind = $1 ORDER BY name")
                .bind(R::KIND)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(decode::<R>).collect()
    }

    async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<Option<R>> {
        ctx.check_cancelled()?;
        let row: Option<Value> =
            sqlx::query_scalar("SELECT body FROM resources WHERE kind = $1 AND name = $2")
                .bind(R::KIND)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(decode::<R>).transpose()
    }

    async fn upsert(&self, ctx: &RequestContext, resource: R) -> StoreResult<()> {
        ctx.check_cancelled()?;
        sqlx::query(
            r#"INSERT INTO resources (kind, name, body)
               VALUES ($1, $2, $3)
               ON CONFLICT (kind, name)
               DO UPDATE SET body = EXCLUDED.body, updated_at = now()"#,
        )
        .bind(R::KIND)
        .bind(resource.name())
        .bind(Json(&resource))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_by_name(&self, ctx: &RequestContext, name: &str) -> StoreResult<()> {
        ctx.check_cancelled()?;
        sqlx::query("DELETE FROM resources WHERE kind = $1 AND name = $2")
            .bind(R::KIND)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
