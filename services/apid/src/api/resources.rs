//! Generic collection and single-resource routes.
//!
//! # Purpose
//! [`resource_router`] mounts `/{kind}` and `/{kind}/:name` for any
//! [`Resource`] type. Each request is authenticated, resolved into a
//! [`ResourceAction`], and handed to the resource's controller together with an
//! explicit request context and the caller's abilities.
//!
//! # Cancellation
//! The request's cancellation token is cancelled when the handler future is
//! dropped, which happens when the client disconnects or the timeout layer
//! gives up on the request.
use crate::api::error::{ApiError, api_method_not_allowed, api_unauthorized};
use crate::auth::abilities::PermissionAbilities;
use crate::auth::principal::Principal;
use crate::auth::token::{TokenVerifier, extract_bearer};
use crate::context::RequestContext;
use crate::controller::{ControllerError, ControllerResponse, ResourceAction, ResourceController};
use crate::model::Resource;
use crate::observability;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

pub struct ResourceRouteState<R: Resource> {
    controller: ResourceController<R>,
    verifier: TokenVerifier,
}

impl<R: Resource> Clone for ResourceRouteState<R> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

/// Routes for one resource type, mounted at `/{R::KIND}`.
pub fn resource_router<R: Resource>(
    controller: ResourceController<R>,
    verifier: TokenVerifier,
) -> Router {
    let collection = format!("/{}", R::KIND);
    let single = format!("/{}/:name", R::KIND);
    Router::new()
        .route(
            &collection,
            axum::routing::get(collection_handler::<R>).post(collection_handler::<R>),
        )
        .route(
            &single,
            axum::routing::get(single_handler::<R>)
                .put(single_handler::<R>)
                .post(single_handler::<R>)
                .delete(single_handler::<R>),
        )
        .with_state(ResourceRouteState {
            controller,
            verifier,
        })
}

/// Map an HTTP method and optional path name onto a controller action.
pub fn resolve_action(method: &Method, name: Option<String>) -> Option<ResourceAction> {
    match (method, name) {
        (&Method::GET, None) => Some(ResourceAction::List),
        (&Method::POST, None) => Some(ResourceAction::Create),
        (&Method::GET, Some(name)) => Some(ResourceAction::Get(name)),
        (&Method::PUT | &Method::POST, Some(name)) => Some(ResourceAction::Upsert(name)),
        (&Method::DELETE, Some(name)) => Some(ResourceAction::Delete(name)),
        _ => None,
    }
}

async fn collection_handler<R: Resource>(
    State(state): State<ResourceRouteState<R>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    handle(state, &method, None, &headers, body).await
}

async fn single_handler<R: Resource>(
    State(state): State<ResourceRouteState<R>>,
    Path(name): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    handle(state, &method, Some(name), &headers, body).await
}

async fn handle<R: Resource>(
    state: ResourceRouteState<R>,
    method: &Method,
    name: Option<String>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let action = resolve_action(method, name).ok_or_else(api_method_not_allowed)?;
    let principal = authenticate(&state.verifier, headers)?;

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let ctx = RequestContext::with_cancellation(principal, cancel);
    let abilities = PermissionAbilities::new(ctx.principal().permissions());

    let action_name = action.as_str();
    let result = state
        .controller
        .dispatch(&ctx, &abilities, action, &body)
        .await;

    observability::record_request(R::KIND, action_name, outcome(&result));
    match result? {
        ControllerResponse::Json(bytes) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response()),
        ControllerResponse::Empty => Ok(StatusCode::OK.into_response()),
    }
}

fn authenticate(verifier: &TokenVerifier, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let bearer = extract_bearer(headers).ok_or_else(|| api_unauthorized("missing bearer token"))?;
    let claims = verifier.verify(bearer).map_err(|err| {
        tracing::debug!(error = %err, "rejected bearer token");
        api_unauthorized("invalid token")
    })?;
    Ok(Principal::from_claims(&claims))
}

fn outcome(result: &Result<ControllerResponse, ControllerError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ControllerError::Unauthorized) => "forbidden",
        Err(ControllerError::NotFound) => "not_found",
        Err(ControllerError::Validation(_)) => "invalid",
        Err(ControllerError::Store(_) | ControllerError::Serialization(_)) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_action_covers_route_table() {
        let name = || Some("disk".to_string());
        assert_eq!(
            resolve_action(&Method::GET, None),
            Some(ResourceAction::List)
        );
        assert_eq!(
            resolve_action(&Method::POST, None),
            Some(ResourceAction::Create)
        );
        assert_eq!(
            resolve_action(&Method::GET, name()),
            Some(ResourceAction::Get("disk".to_string()))
        );
        assert_eq!(
            resolve_action(&Method::PUT, name()),
            Some(ResourceAction::Upsert("disk".to_string()))
        );
        assert_eq!(
            resolve_action(&Method::POST, name()),
            Some(ResourceAction::Upsert("disk".to_string()))
        );
        assert_eq!(
            resolve_action(&Method::DELETE, name()),
            Some(ResourceAction::Delete("disk".to_string()))
        );
        assert_eq!(resolve_action(&Method::DELETE, None), None);
        assert_eq!(resolve_action(&Method::PATCH, name()), None);
    }
}
