use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};

use crate::catalog::{self, SearchFilter, SearchTable};
use crate::server::AppState;
use crate::server::dto::{SearchChoices, SearchPage, SearchParams};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::store::query::data;

pub fn search_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(search_form).post(search))
        .route("/search", get(search_form).post(search))
}

fn choices(state: &AppState) -> Result<SearchChoices, ApiError> {
    let store = state.store.as_ref();
    Ok(SearchChoices {
        sample_type: catalog::distinct_values(store, data::SAMPLE_TYPE)
            .api_err("Failed to list sample types")?,
        element: catalog::distinct_values(store, data::ELEMENT).api_err("Failed to list elements")?,
    })
}

pub async fn search_form(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let page = SearchPage {
        choices: choices(&state)?,
        table: SearchTable::headings_only(),
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    Json(filter): Json<SearchFilter>,
) -> impl IntoResponse {
    let table = catalog::get_search(
        state.store.as_ref(),
        &filter,
        params.compress.unwrap_or(true),
    )
    .api_err("Failed to search")?;

    let page = SearchPage {
        choices: choices(&state)?,
        table,
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}
