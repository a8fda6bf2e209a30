use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use super::gate::{self, Principal};
use super::{TokenGenerator, token_lookup};
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::store::query::user;
use crate::store::{Record, StoreExt};
use crate::types::{Role, User};

/// The principal of the current request, resolved from its bearer token.
/// A missing, unknown or expired token resolves to an anonymous principal.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub principal: Principal,
    pub session_id: Option<String>,
}

/// Extractor that requires a signed-in user of any role
pub struct RequireLogin(pub User);

/// Extractor that requires a verified user
pub struct RequireVerified(pub User);

/// Extractor that requires a moderator
pub struct RequireModerator(pub User);

/// Extractor that requires an administrator
pub struct RequireAdmin(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn resolve(state: &AppState, raw_token: &str) -> Result<RequestContext, ApiError> {
    let Ok(lookup) = token_lookup(raw_token) else {
        return Ok(RequestContext::default());
    };

    let Some(session) = state
        .store
        .get_session_by_lookup(lookup)
        .map_err(|e| {
            tracing::error!("Failed to look up session: {e}");
            ApiError::internal("Internal server error")
        })?
    else {
        return Ok(RequestContext::default());
    };

    let generator = TokenGenerator::new();
    match generator.verify(raw_token, &session.token_hash) {
        Ok(true) => {}
        Ok(false) => return Ok(RequestContext::default()),
        Err(e) => {
            tracing::warn!("Failed to verify session token: {e}");
            return Ok(RequestContext::default());
        }
    }

    if session.expires_at.is_some_and(|expires_at| expires_at < Utc::now()) {
        tracing::debug!("Session {} expired", session.id);
        return Ok(RequestContext::default());
    }

    let user = state
        .store
        .get_one_or_none::<User>(&User::query().eq(user::ID, session.user_id))
        .map_err(|e| {
            tracing::error!("Failed to load session user: {e}");
            ApiError::internal("Internal server error")
        })?;

    let Some(user) = user else {
        return Ok(RequestContext::default());
    };

    if let Err(e) = state.store.update_session_last_used(&session.id) {
        tracing::warn!("Failed to update session last_used_at: {e}");
    }

    Ok(RequestContext {
        principal: Principal::User(user),
        session_id: Some(session.id),
    })
}

impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(raw_token) => resolve(state, raw_token),
            None => Ok(RequestContext::default()),
        }
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &Arc<AppState>,
    role: Role,
) -> Result<User, ApiError> {
    let ctx = RequestContext::from_request_parts(parts, state).await?;
    gate::require(&ctx.principal, role)
        .cloned()
        .map_err(|denial| {
            tracing::debug!("Denied {} {}: {:?}", parts.method, parts.uri.path(), denial.messages);
            ApiError::from(denial)
        })
}

impl FromRequestParts<Arc<AppState>> for RequireLogin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Deactivated).await.map(Self)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireVerified {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Verified).await.map(Self)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireModerator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Moderator).await.map(Self)
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(Self)
    }
}
