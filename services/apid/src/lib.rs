//! Authorization-gated resource API library crate.
//!
//! # Purpose
//! Exposes the resource controller, auth helpers, configuration, storage
//! backends, and HTTP wiring for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod context;
pub mod controller;
pub mod model;
pub mod observability;
pub mod store;

#[cfg(test)]
mod test_env;
