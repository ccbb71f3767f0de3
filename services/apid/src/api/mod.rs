//! HTTP API module.
//!
//! # Purpose
//! Exposes the generic resource routes, system endpoints, and the shared error
//! type handlers return.
pub mod error;
pub mod resources;
pub mod system;
