//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Every resource type gets its own router from
//! [`resource_router`](crate::api::resources::resource_router); this module only
//! decides which types are served and which middleware wraps them.
use crate::api;
use crate::api::resources::resource_router;
use crate::auth::token::TokenVerifier;
use crate::controller::ResourceController;
use crate::model::{CheckConfig, Handler, Resource};
use crate::observability;
use crate::store::{ResourceStore, StoreBackend};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub backend: Arc<dyn StoreBackend>,
    pub checks: ResourceController<CheckConfig>,
    pub handlers: ResourceController<Handler>,
    pub verifier: TokenVerifier,
    pub request_timeout: Duration,
}

impl AppState {
    /// Wire one store into a controller per resource type.
    pub fn new<S>(store: Arc<S>, verifier: TokenVerifier, request_timeout: Duration) -> Self
    where
        S: StoreBackend + ResourceStore<CheckConfig> + ResourceStore<Handler> + 'static,
    {
        let checks: Arc<dyn ResourceStore<CheckConfig>> = store.clone();
        let handlers: Arc<dyn ResourceStore<Handler>> = store.clone();
        Self {
            api_version: "v1".to_string(),
            backend: store,
            checks: ResourceController::new(checks),
            handlers: ResourceController::new(handlers),
            verifier,
            request_timeout,
        }
    }

    pub fn resource_kinds(&self) -> Vec<String> {
        vec![CheckConfig::KIND.to_string(), Handler::KIND.to_string()]
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    let system = Router::new()
        .route(
            "/health",
            axum::routing::get(api::system::system_health),
        )
        .route(
            "/system/info",
            axum::routing::get(api::system::system_info),
        )
        .with_state(state.clone());

    Router::new()
        .merge(system)
        .merge(resource_router(state.checks, state.verifier.clone()))
        .merge(resource_router(state.handlers, state.verifier))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(trace_layer)
}
