use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireModerator;
use crate::catalog::{self, HISTORY_HEADINGS};
use crate::server::AppState;
use crate::server::dto::HistoryPage;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};

pub async fn all_edits(
    _moderator: RequireModerator,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let page = HistoryPage {
        headings: HISTORY_HEADINGS.to_vec(),
        rows: catalog::all_edits(state.store.as_ref()).api_err("Failed to list edits")?,
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}
