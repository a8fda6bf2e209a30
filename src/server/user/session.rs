use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequestContext, TokenGenerator, gate, verify_password};
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse};
use crate::server::response::{
    ApiError, ApiResponse, DENIED_LOCATION, Notice, Redirect, StoreResultExt,
};
use crate::server::validation::{Validator, normalize_email, validate_email};
use crate::store::query::user;
use crate::store::{Record, StoreExt};
use crate::types::{Role, Session, User};

/// Issues a bearer token for `user`.
pub(super) fn start_session(state: &AppState, user: User) -> Result<LoginResponse, ApiError> {
    let issued = TokenGenerator::new()
        .issue()
        .api_err("Failed to generate session token")?;

    let now = Utc::now();
    let expires_at = Some(now + state.session_ttl);
    let session = Session {
        id: Uuid::new_v4().to_string(),
        token_hash: issued.hash,
        token_lookup: issued.lookup,
        user_id: user.id,
        created_at: now,
        expires_at,
        last_used_at: None,
    };

    state
        .store
        .create_session(&session)
        .api_err("Failed to create session")?;

    tracing::info!("User {} signed in", user.id);

    Ok(LoginResponse {
        token: issued.token,
        user,
        expires_at,
    })
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if ctx.principal.is_authenticated() {
        return Err(ApiError::redirect(
            DENIED_LOCATION,
            "You are already signed in",
        ));
    }

    let email = normalize_email(&req.email);
    let mut v = Validator::new();
    v.check("email", validate_email(&email));
    if req.password.is_empty() {
        v.error("password", "This field is required.");
    }
    v.finish()?;

    let account = state
        .store
        .get_one_or_none::<User>(&User::query().eq(user::EMAIL, email))
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::field("email", "No account exists with this email"))?;

    let valid = verify_password(&req.password, &account.password_hash)
        .api_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::field("password", "Invalid password"));
    }

    let welcome = Notice::success(format!("Welcome {}", account.name));
    let response = start_session(&state, account)?;

    Ok(Json(ApiResponse::success(response).notice(welcome)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    gate::require(&ctx.principal, Role::Deactivated)?;

    if let Some(id) = &ctx.session_id {
        state
            .store
            .delete_session(id)
            .api_err("Failed to end session")?;
    }

    Ok(Redirect::to(DENIED_LOCATION).notice(Notice::success("You have been logged out")))
}
