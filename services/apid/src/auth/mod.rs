//! Authentication and authorization for the resource API.
//!
//! # Purpose
//! Groups bearer-token verification, the authenticated principal, and the
//! per-resource capability checks the controller consults before touching
//! the store.
pub mod abilities;
pub mod principal;
pub mod token;
