use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::{RequireAdmin, RequireModerator, rotate_signup_key};
use crate::server::AppState;
use crate::server::dto::SignupLinkPage;
use crate::server::response::{ApiError, ApiResponse, Notice, Redirect, StoreResultExt};
use crate::store::SIGNUP_KEY;

/// The current signup link, if a key has been issued.
pub async fn signup_link(
    _moderator: RequireModerator,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let key = state
        .store
        .get_attr(SIGNUP_KEY)
        .api_err("Failed to get signup key")?;

    let page = SignupLinkPage {
        link: key.map(|k| state.signup_link(&k)),
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn update_signup_link(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let key = rotate_signup_key(state.store.as_ref()).api_err("Failed to update signup key")?;
    tracing::info!("User {} issued a new signup key", admin.id);

    Ok(Redirect::to("/admin/signup_link")
        .notice(Notice::success("Signup key updated"))
        .with_data(SignupLinkPage {
            link: Some(state.signup_link(&key)),
        }))
}
