use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::{citation_label, confirmation, editable_data, find_citation, history, update_notice};
use crate::auth::RequireVerified;
use crate::catalog;
use crate::server::AppState;
use crate::server::dto::{
    AddDataPage, CreatedData, DataEditForm, DataForm, DataPage, DeleteConfirm, DeleteDataPage,
};
use crate::server::response::{
    ApiError, ApiResponse, LISTING_LOCATION, Notice, Redirect, StoreResultExt,
};
use crate::server::validation::{MAX_TEXT_LEN, Validator, normalize_element, parse_elements};
use crate::store::Deletion;
use crate::store::query::{Table, data};
use crate::types::{DataPatch, NewData, User};

const INVALID_CITATION: &str = "Invalid citation id";

fn sample_types(state: &AppState) -> Result<Vec<String>, ApiError> {
    catalog::distinct_values(state.store.as_ref(), data::SAMPLE_TYPE)
        .api_err("Failed to list sample types")
}

fn add_data_page(state: &AppState, citation_id: Option<i64>) -> Result<AddDataPage, ApiError> {
    let citations = catalog::citation_choices(state.store.as_ref(), citation_id)
        .api_err("Failed to list citations")?;
    if citation_id.is_some() && citations.is_empty() {
        return Err(ApiError::missing(INVALID_CITATION));
    }

    Ok(AddDataPage {
        citations,
        sample_types: sample_types(state)?,
    })
}

fn create_data(
    state: &AppState,
    user: &User,
    path_citation: Option<i64>,
    form: DataForm,
) -> Result<ApiResponse<CreatedData>, ApiError> {
    let mut v = Validator::new();

    let citation_id = match (path_citation, form.citation) {
        (Some(path), Some(body)) if path != body => {
            v.error("citation", INVALID_CITATION);
            None
        }
        (path, body) => path.or(body),
    };
    match citation_id {
        Some(id) => {
            if find_citation(state, id)?.is_none() {
                v.error("citation", INVALID_CITATION);
            }
        }
        None => v.error("citation", "This field is required."),
    }

    let sample_type = form.sample_type.trim().to_string();
    v.length("sample_type", &sample_type, 1, MAX_TEXT_LEN);
    let elements = v.check("element", parse_elements(&form.element));
    v.finish()?;

    let (Some(citation_id), Some(elements)) = (citation_id, elements) else {
        return Err(ApiError::internal("Failed to validate data"));
    };

    let rows: Vec<NewData> = elements
        .into_iter()
        .map(|element| NewData {
            citation_id,
            creator_id: user.id,
            sample_type: sample_type.clone(),
            element,
        })
        .collect();

    let location = match path_citation {
        Some(id) => format!("/dm/add_data/{id}"),
        None => "/dm/add_data".to_string(),
    };
    let created = state
        .store
        .create_data(user, &rows)
        .or_flash(&location)?;

    let ids: Vec<i64> = created.iter().map(|d| d.id).collect();
    tracing::info!("User {} added data {:?} to citation {}", user.id, ids, citation_id);

    Ok(ApiResponse::success(CreatedData { citation_id, ids }).notice(Notice::success("Data added")))
}

pub async fn add_data_form(
    RequireVerified(_user): RequireVerified,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ApiResponse::success(add_data_page(&state, None)?)))
}

pub async fn add_data_form_for(
    RequireVerified(_user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(citation_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ApiResponse::success(add_data_page(&state, Some(citation_id))?)))
}

pub async fn add_data(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(form): Json<DataForm>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(create_data(&state, &user, None, form)?))
}

pub async fn add_data_for(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(citation_id): Path<i64>,
    Json(form): Json<DataForm>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(create_data(&state, &user, Some(citation_id), form)?))
}

pub async fn edit_data_page(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let data = editable_data(&state, &user, id)?;
    let page = DataPage {
        citation: citation_label(&state, data.citation_id)?,
        sample_types: sample_types(&state)?,
        history: history(&state, Table::Data, data.id)?,
        data,
    };
    Ok(Json(ApiResponse::success(page)))
}

pub async fn edit_data(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(form): Json<DataEditForm>,
) -> Result<impl IntoResponse, ApiError> {
    let data = editable_data(&state, &user, id)?;

    let mut v = Validator::new();
    let mut patch = DataPatch::default();
    if let Some(sample_type) = &form.sample_type {
        v.length("sample_type", sample_type.trim(), 1, MAX_TEXT_LEN);
        patch.sample_type = Some(sample_type.trim().to_string());
    }
    if let Some(element) = &form.element {
        patch.element = v.check("element", normalize_element(element));
    }
    v.finish()?;

    let diff = state
        .store
        .update_data(&user, data.id, &patch)
        .or_flash(&format!("/dm/edit_data/{}", data.id))?;

    if !diff.is_empty() {
        tracing::info!("User {} updated data {}: {:?}", user.id, data.id, diff.fields());
    }

    let notice = update_notice(!diff.is_empty());
    Ok(Json(ApiResponse::success(diff).notice(notice)))
}

pub async fn delete_data_page(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let data = editable_data(&state, &user, id)?;
    let page = DeleteDataPage {
        citation: citation_label(&state, data.citation_id)?,
        data,
    };
    Ok(Json(ApiResponse::success(page)))
}

pub async fn delete_data(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(confirm): Json<DeleteConfirm>,
) -> Result<impl IntoResponse, ApiError> {
    let data = editable_data(&state, &user, id)?;

    if !confirmation(&confirm)? {
        return Ok(Redirect::to(format!("/dm/edit_data/{}", data.id))
            .notice(Notice::message("Data was not deleted"))
            .with_data(None::<Deletion>));
    }

    let deletion = state
        .store
        .delete_data(&user, data.id)
        .or_flash(&format!("/dm/delete_data/{}", data.id))?;

    tracing::info!("User {} deleted data {}", user.id, data.id);

    Ok(Redirect::to(LISTING_LOCATION)
        .notice(Notice::success("Data deleted"))
        .with_data(Some(deletion)))
}
