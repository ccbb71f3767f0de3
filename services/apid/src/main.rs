//! apid HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, token verification, and HTTP routers, then
//! starts the API server and the metrics listener.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use apid::app::{AppState, build_router};
use apid::auth::token::TokenVerifier;
use apid::config::{ApiConfig, StorageBackend};
use apid::observability;
use apid::store::memory::InMemoryStore;
use apid::store::postgres::PostgresStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env_or_yaml().context("apid config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ApiConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("apid")?;
    let state = build_state(&config).await?;
    tracing::info!(
        backend = state.backend.backend_name(),
        durable = state.backend.is_durable(),
        "store ready"
    );

    let stop = CancellationToken::new();
    let metrics_stop = stop.clone();
    let metrics_addr = config.metrics_bind;
    let metrics_task = tokio::spawn(async move {
        if let Err(err) = observability::serve_metrics(metrics_handle, metrics_addr, async move {
            metrics_stop.cancelled().await;
        })
        .await
        {
            tracing::warn!(error = %err, %metrics_addr, "metrics listener failed");
        }
    });

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "apid listening");

    let server_stop = stop.clone();
    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown => {}
                _ = server_stop.cancelled() => {}
            }
        })
        .await;

    stop.cancel();
    let _ = metrics_task.await;
    tracing::info!("apid stopped");
    result.context("serve api")
}

async fn build_state(config: &ApiConfig) -> anyhow::Result<AppState> {
    let verifier = TokenVerifier::new(&config.auth);
    let timeout = config.request_timeout();
    let state = match config.storage {
        StorageBackend::Memory => AppState::new(Arc::new(InMemoryStore::new()), verifier, timeout),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            let store = PostgresStore::connect(pg)
                .await
                .context("connect postgres store")?;
            AppState::new(Arc::new(store), verifier, timeout)
        }
    };
    Ok(state)
}
