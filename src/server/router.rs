use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use chrono::Duration;

use super::admin::admin_router;
use super::dm::dm_router;
use super::search::search_router;
use super::user::user_router;
use crate::config::{ServerConfig, signup_link};
use crate::store::Store;
use crate::types::RoleChangePolicy;

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Public base URL for external access. Used for signup links.
    pub public_base_url: Option<String>,
    pub open_signup: bool,
    pub role_policy: RoleChangePolicy,
    pub session_ttl: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: &ServerConfig) -> Self {
        Self {
            store,
            public_base_url: config.public_base_url.clone(),
            open_signup: config.open_signup,
            role_policy: config.role_policy,
            session_ttl: config.session_ttl(),
        }
    }

    #[must_use]
    pub fn signup_link(&self, key: &str) -> String {
        signup_link(self.public_base_url.as_deref(), key)
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(search_router())
        .nest("/user", user_router())
        .nest("/dm", dm_router())
        .nest("/admin", admin_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
