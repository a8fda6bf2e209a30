mod citations;
mod data;
mod listing;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::auth::gate;
use crate::catalog::{self, HISTORY_HEADINGS};
use crate::server::AppState;
use crate::server::dto::{DeleteConfirm, HistoryPage};
use crate::server::response::{ApiError, Notice, StoreOptionExt, StoreResultExt};
use crate::store::query::{Table, citation, data as data_col};
use crate::store::{Record, StoreExt};
use crate::types::{Citation, Data, User};

const UPDATED: &str = "Entry was updated";
const UNCHANGED: &str = "No changes were made to the entry";

pub fn dm_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/add_citation",
            get(citations::add_citation_form).post(citations::add_citation),
        )
        .route("/add_data", get(data::add_data_form).post(data::add_data))
        .route(
            "/add_data/{citation_id}",
            get(data::add_data_form_for).post(data::add_data_for),
        )
        .route("/edit", get(listing::edit_listing).post(listing::edit_lookup))
        .route(
            "/edit_citation/{id}",
            get(citations::edit_citation_page).post(citations::edit_citation),
        )
        .route(
            "/edit_data/{id}",
            get(data::edit_data_page).post(data::edit_data),
        )
        .route(
            "/delete_citation/{id}",
            get(citations::delete_citation_page).post(citations::delete_citation),
        )
        .route(
            "/delete_data/{id}",
            get(data::delete_data_page).post(data::delete_data),
        )
}

fn find_citation(state: &AppState, id: i64) -> Result<Option<Citation>, ApiError> {
    state
        .store
        .get_one_or_none::<Citation>(&Citation::query().eq(citation::ID, id))
        .api_err("Failed to get citation")
}

fn find_data(state: &AppState, id: i64) -> Result<Option<Data>, ApiError> {
    state
        .store
        .get_one_or_none::<Data>(&Data::query().eq(data_col::ID, id))
        .api_err("Failed to get data")
}

/// Loads a citation the user may modify.
fn editable_citation(state: &AppState, user: &User, id: i64) -> Result<Citation, ApiError> {
    let citation = find_citation(state, id)?.or_missing("Invalid citation id")?;
    gate::check_owner(user, citation.creator_id)?;
    Ok(citation)
}

/// Loads a data row the user may modify.
fn editable_data(state: &AppState, user: &User, id: i64) -> Result<Data, ApiError> {
    let data = find_data(state, id)?.or_missing("Invalid data id")?;
    gate::check_owner(user, data.creator_id)?;
    Ok(data)
}

fn history(state: &AppState, table: Table, id: i64) -> Result<HistoryPage, ApiError> {
    Ok(HistoryPage {
        headings: HISTORY_HEADINGS.to_vec(),
        rows: catalog::item_history(state.store.as_ref(), table, id)
            .api_err("Failed to load history")?,
    })
}

fn citation_label(state: &AppState, id: i64) -> Result<String, ApiError> {
    Ok(find_citation(state, id)?
        .map(|c| catalog::citation_label(&c))
        .unwrap_or_default())
}

fn update_notice(changed: bool) -> Notice {
    if changed {
        Notice::success(UPDATED)
    } else {
        Notice::message(UNCHANGED)
    }
}

/// `true` to delete, `false` to cancel.
fn confirmation(confirm: &DeleteConfirm) -> Result<bool, ApiError> {
    match (confirm.yes, confirm.no) {
        (true, false) => Ok(true),
        (false, true) => Ok(false),
        _ => Err(ApiError::field("yes", "Confirm or cancel the deletion")),
    }
}
