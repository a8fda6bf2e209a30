mod account;
mod session;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .route("/signup", post(account::signup))
        .route("/change_password", post(account::change_password))
}
