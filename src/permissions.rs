// src/permissions.rs

//! Who may do what.
//!
//! The predicates here are pure: they look at the actor, the HTTP method and (for
//! object checks) the owner of a resource, and answer allow or deny. Turning a denial
//! into 401 or 403 is left to [`Actor::denied`], which the request layer calls.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Method, Request, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// An authenticated caller, as resolved from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

/// The party making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(AuthUser),
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::User(user) if user.is_staff)
    }

    /// The error to report when a check denies this actor.
    pub fn denied(&self) -> AppError {
        match self {
            Actor::Anonymous => AppError::NotAuthenticated,
            Actor::User(_) => AppError::Forbidden,
        }
    }
}

/// GET, HEAD and OPTIONS never mutate state.
pub fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

/// Endpoint-level access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Authenticated,
    AdminOnly,
    AdminOrReadOnly,
    AuthenticatedOrReadOnly,
}

impl Policy {
    pub fn allows(self, actor: &Actor, method: &Method) -> bool {
        match self {
            Policy::Authenticated => actor.is_authenticated(),
            Policy::AdminOnly => actor.is_staff(),
            Policy::AdminOrReadOnly => is_safe_method(method) || actor.is_staff(),
            Policy::AuthenticatedOrReadOnly => {
                is_safe_method(method) || actor.is_authenticated()
            }
        }
    }
}

/// Object-level rule: the resource owner or any staff member.
pub fn owner_or_admin(actor: &Actor, owner_id: i64) -> bool {
    match actor {
        Actor::User(user) => user.id == owner_id || user.is_staff,
        Actor::Anonymous => false,
    }
}

/// Evaluates `policies` in order and stops at the first denial.
pub fn check(policies: &[Policy], actor: &Actor, method: &Method) -> Result<(), AppError> {
    match policies.iter().find(|policy| !policy.allows(actor, method)) {
        Some(_) => Err(actor.denied()),
        None => Ok(()),
    }
}

/// Axum Middleware: endpoint authorization.
///
/// Must run after `jwt::authenticate`, which puts the [`Actor`] into the request
/// extensions. Attach with `middleware::from_fn_with_state(POLICIES, enforce)`.
pub async fn enforce(
    State(policies): State<&'static [Policy]>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let actor = req
        .extensions()
        .get::<Actor>()
        .cloned()
        .unwrap_or(Actor::Anonymous);

    if let Err(denied) = check(policies, &actor, req.method()) {
        tracing::debug!(method = %req.method(), uri = %req.uri(), ?actor, "request denied");
        return Err(denied);
    }

    Ok(next.run(req).await)
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Actor>()
            .cloned()
            .unwrap_or(Actor::Anonymous))
    }
}

/// Extracting an `AuthUser` rejects anonymous callers with 401.
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Actor>() {
            Some(Actor::User(user)) => Ok(user.clone()),
            _ => Err(AppError::NotAuthenticated),
        }
    }
}
