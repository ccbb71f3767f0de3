//! Resource access controller.
//!
//! # Purpose
//! One generic [`ResourceController`] per resource type mediates between the
//! HTTP layer, the caller's [`Abilities`], and the [`ResourceStore`]. The HTTP
//! layer resolves each request into a [`ResourceAction`] once; everything after
//! that is a function of the action, the caller's abilities, what the store
//! holds, and the request body.
//!
//! # Key invariants
//! - Capability checks for list and delete run before any store access.
//! - A body is decoded and validated before any capability check or store call.
//! - Create vs. update is decided by a lookup made in the same request.
//! - Single-resource reads check existence (404) before read capability.
//! - Every store call is raced against the request's cancellation token.
use crate::auth::abilities::Abilities;
use crate::context::RequestContext;
use crate::model::{Resource, ValidationError};
use crate::store::{ResourceStore, StoreError};
use std::sync::Arc;
use thiserror::Error;


#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unauthorized access to resource")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to serialize response: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// The operation a request asks for, resolved once at the routing boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAction {
    /// `GET /{kind}`
    List,
    /// `POST /{kind}`; always a create, no existence lookup.
    Create,
    /// `GET /{kind}/{name}`
    Get(String),
    /// `PUT` or `POST /{kind}/{name}`
    Upsert(String),
    /// `DELETE /{kind}/{name}`
    Delete(String),
}

impl ResourceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAction::List => "list",
            ResourceAction::Create => "create",
            ResourceAction::Get(_) => "get",
            ResourceAction::Upsert(_) => "upsert",
            ResourceAction::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerResponse {
    /// Fully serialized JSON body.
    Json(Vec<u8>),
    /// Success with no body.
    Empty,
}

pub struct ResourceController<R: Resource> {
    store: Arc<dyn ResourceStore<R>>,
}

impl<R: Resource> Clone for ResourceController<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R: Resource> ResourceController<R> {
    pub fn new(store: Arc<dyn ResourceStore<R>>) -> Self {
        Self { store }
    }

    pub async fn dispatch(
        &self,
        ctx: &RequestContext,
        abilities: &dyn Abilities<R>,
        action: ResourceAction,
        body: &[u8],
    ) -> Result<ControllerResponse, ControllerError> {
        match action {
            ResourceAction::List => {
                let resources = self.list(ctx, abilities).await?;
                encode(&resources)
            }
            ResourceAction::Get(name) => {
                let resource = self.get(ctx, abilities, &name).await?;
                encode(&resource)
            }
            ResourceAction::Create => {
                self.write(ctx, abilities, None, body).await?;
                Ok(ControllerResponse::Empty)
            }
            ResourceAction::Upsert(name) => {
                self.write(ctx, abilities, Some(&name), body).await?;
                Ok(ControllerResponse::Empty)
            }
            ResourceAction::Delete(name) => {
                self.delete(ctx, abilities, &name).await?;
                Ok(ControllerResponse::Empty)
            }
        }
    }

    /// All resources the caller may read, in store order.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        abilities: &dyn Abilities<R>,
    ) -> Result<Vec<R>, ControllerError> {
        if !abilities.can_list() {
            return Err(ControllerError::Unauthorized);
        }
        let mut resources = ctx.run(self.store.get_all(ctx)).await?;
        let total = resources.len();
        retain_readable(&mut resources, abilities);
        tracing::debug!(
            resource = R::KIND,
            subject = ctx.principal().subject(),
            total,
            visible = resources.len(),
            "listed resources"
        );
        Ok(resources)
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        abilities: &dyn Abilities<R>,
        name: &str,
    ) -> Result<R, ControllerError> {
        let resource = ctx
            .run(self.store.get_by_name(ctx, name))
            .await?
            .ok_or(ControllerError::NotFound)?;
        if !abilities.can_read(&resource) {
            return Err(ControllerError::Unauthorized);
        }
        Ok(resource)
    }

    /// Create (`target == None`) or upsert `target` from a JSON body.
    pub async fn write(
        &self,
        ctx: &RequestContext,
        abilities: &dyn Abilities<R>,
        target: Option<&str>,
        body: &[u8],
    ) -> Result<(), ControllerError> {
        let candidate = decode_candidate::<R>(target, body)?;

        let exists = match target {
            Some(name) => ctx.run(self.store.get_by_name(ctx, name)).await?.is_some(),
            None => false,
        };
        let allowed = if exists {
            abilities.can_update(&candidate)
        } else {
            abilities.can_create(&candidate)
        };
        if !allowed {
            return Err(ControllerError::Unauthorized);
        }

        let name = candidate.name().to_string();
        let op = if exists { "updated" } else { "created" };
        ctx.run(self.store.upsert(ctx, candidate)).await?;
        tracing::info!(
            resource = R::KIND,
            name = %name,
            subject = ctx.principal().subject(),
            op,
            "resource stored"
        );
        Ok(())
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        abilities: &dyn Abilities<R>,
        name: &str,
    ) -> Result<(), ControllerError> {
        if !abilities.can_delete() {
            return Err(ControllerError::Unauthorized);
        }
        ctx.run(self.store.delete_by_name(ctx, name)).await?;
        tracing::info!(
            resource = R::KIND,
            name = %name,
            subject = ctx.principal().subject(),
            "resource deleted"
        );
        Ok(())
    }
}

/// Drop every resource the caller cannot read, keeping relative order.
///
/// `Vec::retain` visits each element exactly once and compacts survivors
/// forward, so runs of rejected elements are neither skipped nor duplicated.
fn retain_readable<R: Resource>(resources: &mut Vec<R>, abilities: &dyn Abilities<R>) {
    resources.retain(|resource| abilities.can_read(resource));
}

/// Decode and validate a request body; `target` is the path name, if any.
fn decode_candidate<R: Resource>(target: Option<&str>, body: &[u8]) -> Result<R, ValidationError> {
    let mut candidate: R = serde_json::from_slice(body)
        .map_err(|err| ValidationError::new(format!("invalid {} body: {err}", R::KIND)))?;
    if let Some(name) = target {
        if candidate.name().is_empty() {
            candidate.set_name(name.to_string());
        } else if candidate.name() != name {
            return Err(ValidationError::new(format!(
                "body name {:?} does not match path name {name:?}",
                candidate.name()
            )));
        }
    }
    candidate.validate()?;
    Ok(candidate)
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<ControllerResponse, ControllerError> {
    serde_json::to_vec(value)
        .map(ControllerResponse::Json)
        .map_err(ControllerError::Serialization)
}
