use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};

use super::{editable_citation, editable_data};
use crate::auth::RequireVerified;
use crate::catalog::{self, LISTING_HEADINGS};
use crate::server::AppState;
use crate::server::dto::{EditListingPage, EditLookup};
use crate::server::response::{ApiError, ApiResponse, Redirect, StoreResultExt};
use crate::store::Table;

pub async fn edit_listing(
    RequireVerified(_user): RequireVerified,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let page = EditListingPage {
        headings: LISTING_HEADINGS.to_vec(),
        rows: catalog::edit_listing(state.store.as_ref()).api_err("Failed to list data")?,
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

/// Resolves a table/id pair to its edit page.
pub async fn edit_lookup(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditLookup>,
) -> Result<impl IntoResponse, ApiError> {
    let location = match Table::parse(&req.table) {
        Ok(Table::Citation) => {
            let citation = editable_citation(&state, &user, req.id)?;
            format!("/dm/edit_citation/{}", citation.id)
        }
        Ok(Table::Data) => {
            let data = editable_data(&state, &user, req.id)?;
            format!("/dm/edit_data/{}", data.id)
        }
        _ => return Err(ApiError::field("table", "Not a valid choice")),
    };

    Ok(Redirect::to(location))
}
