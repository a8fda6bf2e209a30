mod edits;
mod roles;
mod signup;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Ledger
        .route("/all_edits", get(edits::all_edits))
        // Signup key
        .route("/signup_link", get(signup::signup_link))
        .route("/signup_link/update", post(signup::update_signup_link))
        // Roles
        .route(
            "/change_role",
            get(roles::change_role_page).post(roles::change_role),
        )
}
