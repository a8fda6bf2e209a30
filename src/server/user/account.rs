use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use super::session::start_session;
use crate::auth::{RequestContext, RequireLogin, hash_password, verify_password};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{ChangePasswordRequest, SignupParams, SignupRequest};
use crate::server::response::{
    ApiError, DENIED_LOCATION, Notice, Redirect, StoreResultExt,
};
use crate::server::validation::{MAX_TEXT_LEN, Validator, normalize_email, validate_email};
use crate::store::query::user;
use crate::store::{Record, SIGNUP_KEY, StoreExt};
use crate::types::{NewUser, Role, User};

const LOGIN_LOCATION: &str = "/user/login";
const EMAIL_TAKEN: &str = "A user account with this email already exists";
const PASSWORD_MISMATCH: &str = "Passwords do not match";

pub async fn signup(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<SignupParams>,
    Json(req): Json<SignupRequest>,
) -> impl IntoResponse {
    if ctx.principal.is_authenticated() {
        return Err(ApiError::redirect(
            DENIED_LOCATION,
            "Sign out to create a new account",
        ));
    }

    let current_key = state
        .store
        .get_attr(SIGNUP_KEY)
        .api_err("Failed to read signup key")?;
    let key_valid = params.signup_key.is_some() && params.signup_key == current_key;

    if !key_valid && !state.open_signup {
        let message = match params.signup_key {
            None => "Sign ups are invite only. Contact an administrator to sign up.",
            Some(_) => "Invalid signup link. Contact an administrator.",
        };
        return Err(ApiError::redirect(LOGIN_LOCATION, message));
    }

    let email = normalize_email(&req.email);
    let mut v = Validator::new();
    v.length("name", req.name.trim(), 1, MAX_TEXT_LEN);
    v.check("email", validate_email(&email));
    if req.password.is_empty() {
        v.error("password", "This field is required.");
    } else if req.password != req.password2 {
        v.error("password", PASSWORD_MISMATCH);
    }
    v.finish()?;

    let existing = state
        .store
        .get_one_or_none::<User>(&User::query().eq(user::EMAIL, email.clone()))
        .api_err("Failed to look up user")?;
    if existing.is_some() {
        return Err(ApiError::field("email", EMAIL_TAKEN));
    }

    let new_user = NewUser {
        name: req.name.trim().to_string(),
        email,
        password_hash: hash_password(&req.password).api_err("Failed to hash password")?,
    };

    let account = match state.store.signup_user(&new_user, params.signup_key.as_deref()) {
        Ok(account) => account,
        Err(Error::AlreadyExists(_)) => return Err(ApiError::field("email", EMAIL_TAKEN)),
        Err(e) => {
            tracing::error!("Failed to create account: {e}");
            return Err(ApiError::internal("Failed to create account"));
        }
    };

    tracing::info!("User {} signed up as {}", account.id, account.role);

    let mut reply = Redirect::to(DENIED_LOCATION);
    if account.role == Role::Unverified {
        reply = reply.notice(Notice::message(
            "Your account has to be verified by an administrator before you can upload data",
        ));
    }
    let reply = reply.notice(Notice::success("You have successfully signed up"));

    let session = start_session(&state, account)?;
    Ok(reply.with_data(session))
}

pub async fn change_password(
    RequireLogin(account): RequireLogin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let mut v = Validator::new();
    if req.new_password.is_empty() {
        v.error("new_password", "This field is required.");
    } else if req.new_password != req.new_password2 {
        v.error("new_password", PASSWORD_MISMATCH);
    }
    v.finish()?;

    let valid = verify_password(&req.old_password, &account.password_hash)
        .api_err("Failed to verify password")?;
    if !valid {
        return Err(ApiError::field("old_password", "Invalid password"));
    }

    let hash = hash_password(&req.new_password).api_err("Failed to hash password")?;
    state
        .store
        .update_password(&account, account.id, &hash)
        .or_flash("/user/change_password")?;

    tracing::info!("User {} changed their password", account.id);

    Ok(Redirect::to(DENIED_LOCATION).notice(Notice::success("Password Updated")))
}
