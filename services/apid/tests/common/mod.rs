#![allow(dead_code)]

use apid::app::{AppState, build_router};
use apid::auth::token::TokenVerifier;
use apid::config::AuthConfig;
use apid::store::memory::InMemoryStore;
use std::sync::Arc;
use std::time::Duration;

pub type TestApp = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(&AuthConfig {
        jwt_secret: "integration-secret".to_string(),
        issuer: "apid".to_string(),
        audience: "apid-api".to_string(),
        leeway_secs: 0,
    })
}

pub fn token(subject: &str, perms: &[&str]) -> String {
    verifier()
        .mint(
            subject,
            perms.iter().map(|perm| perm.to_string()).collect(),
            Duration::from_secs(300),
        )
        .expect("mint token")
}

pub fn app() -> TestApp {
    app_with_store(Arc::new(InMemoryStore::new()))
}

pub fn app_with_store(store: Arc<InMemoryStore>) -> TestApp {
    let state = AppState::new(store, verifier(), Duration::from_secs(5));
    build_router(state).into_service()
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}
