use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::{confirmation, editable_citation, history, update_notice};
use crate::auth::RequireVerified;
use crate::catalog;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    AddCitationPage, CitationEditForm, CitationForm, CitationPage, DeleteCitationPage,
    DeleteConfirm,
};
use crate::server::response::{
    ApiError, ApiResponse, LISTING_LOCATION, Notice, Redirect, StoreResultExt,
};
use crate::server::validation::{MAX_TEXT_LEN, Validator, normalize_doi, validate_ads, validate_year};
use crate::store::query::{Table, citation, data};
use crate::store::{Deletion, Record, StoreExt};
use crate::types::{Citation, CitationPatch, Data, NewCitation};

const DOI_TAKEN: &str = "A citation with this DOI already exists";

fn journals(state: &AppState) -> Result<Vec<String>, ApiError> {
    catalog::distinct_values(state.store.as_ref(), citation::JOURNAL).api_err("Failed to list journals")
}

/// Normalizes a submitted DOI and checks it is not used by another citation.
fn check_doi(
    state: &AppState,
    v: &mut Validator,
    raw: &str,
    nodoi: bool,
    own_doi: Option<&str>,
) -> Result<Option<String>, ApiError> {
    v.length("doi", raw.trim(), 1, MAX_TEXT_LEN);
    let Some(doi) = v.check("doi", normalize_doi(raw, nodoi)) else {
        return Ok(None);
    };

    if own_doi != Some(doi.as_str()) {
        let taken = state
            .store
            .get_one_or_none::<Citation>(&Citation::query().eq(citation::DOI, doi.clone()))
            .api_err("Failed to check DOI")?;
        if taken.is_some() {
            v.error("doi", DOI_TAKEN);
        }
    }
    Ok(Some(doi))
}

fn doi_conflict(e: Error, location: &str) -> ApiError {
    match e {
        Error::AlreadyExists(_) => ApiError::field("doi", DOI_TAKEN),
        e => ApiError::flash(e, location),
    }
}

pub async fn add_citation_form(
    RequireVerified(_user): RequireVerified,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let page = AddCitationPage {
        journals: journals(&state)?,
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn add_citation(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Json(form): Json<CitationForm>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    v.length("authors", form.authors.trim(), 1, MAX_TEXT_LEN);
    let year = v.check("year", validate_year(form.year));
    v.length("journal", form.journal.trim(), 1, MAX_TEXT_LEN);
    let doi = check_doi(&state, &mut v, &form.doi, form.nodoi, None)?;
    v.length("ads", form.ads.trim(), 0, MAX_TEXT_LEN);
    v.check("ads", validate_ads(form.ads.trim()));
    v.finish()?;

    let (Some(year), Some(doi)) = (year, doi) else {
        return Err(ApiError::internal("Failed to validate citation"));
    };

    let new = NewCitation {
        creator_id: user.id,
        authors: form.authors.trim().to_string(),
        year,
        journal: form.journal.trim().to_string(),
        doi,
        ads: form.ads.trim().to_string(),
    };
    let created = state
        .store
        .create_citation(&user, &new)
        .map_err(|e| doi_conflict(e, "/dm/add_citation"))?;

    tracing::info!("User {} added citation {}", user.id, created.id);

    Ok(Redirect::to(format!("/dm/add_data/{}", created.id))
        .notice(Notice::success("Citation added"))
        .with_data(created))
}

pub async fn edit_citation_page(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let citation = editable_citation(&state, &user, id)?;
    let page = CitationPage {
        history: history(&state, Table::Citation, citation.id)?,
        journals: journals(&state)?,
        citation,
    };
    Ok(Json(ApiResponse::success(page)))
}

pub async fn edit_citation(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(form): Json<CitationEditForm>,
) -> Result<impl IntoResponse, ApiError> {
    let current = editable_citation(&state, &user, id)?;

    let mut v = Validator::new();
    let mut patch = CitationPatch::default();
    if let Some(authors) = &form.authors {
        v.length("authors", authors.trim(), 1, MAX_TEXT_LEN);
        patch.authors = Some(authors.trim().to_string());
    }
    if let Some(year) = form.year {
        patch.year = v.check("year", validate_year(year));
    }
    if let Some(journal) = &form.journal {
        v.length("journal", journal.trim(), 1, MAX_TEXT_LEN);
        patch.journal = Some(journal.trim().to_string());
    }
    if let Some(doi) = &form.doi {
        patch.doi = check_doi(&state, &mut v, doi, form.nodoi, Some(&current.doi))?;
    }
    if let Some(ads) = &form.ads {
        v.length("ads", ads.trim(), 0, MAX_TEXT_LEN);
        v.check("ads", validate_ads(ads.trim()));
        patch.ads = Some(ads.trim().to_string());
    }
    v.finish()?;

    let location = format!("/dm/edit_citation/{id}");
    let diff = state
        .store
        .update_citation(&user, id, &patch)
        .map_err(|e| doi_conflict(e, &location))?;

    if !diff.is_empty() {
        tracing::info!("User {} updated citation {}: {:?}", user.id, id, diff.fields());
    }

    let notice = update_notice(!diff.is_empty());
    Ok(Json(ApiResponse::success(diff).notice(notice)))
}

pub async fn delete_citation_page(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let citation = editable_citation(&state, &user, id)?;
    let data_count = state
        .store
        .select(&Data::query().eq(data::CITATION_ID, citation.id))
        .api_err("Failed to count data")?
        .len();

    let page = DeleteCitationPage {
        label: catalog::citation_label(&citation),
        citation,
        data_count,
    };
    Ok(Json(ApiResponse::success(page)))
}

pub async fn delete_citation(
    RequireVerified(user): RequireVerified,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(confirm): Json<DeleteConfirm>,
) -> Result<impl IntoResponse, ApiError> {
    let citation = editable_citation(&state, &user, id)?;

    if !confirmation(&confirm)? {
        return Ok(Redirect::to(format!("/dm/edit_citation/{}", citation.id))
            .notice(Notice::message("Citation was not deleted"))
            .with_data(None::<Deletion>));
    }

    let deletion = state
        .store
        .delete_citation(&user, citation.id)
        .or_flash(&format!("/dm/delete_citation/{}", citation.id))?;

    tracing::info!(
        "User {} deleted citation {} and {} data rows",
        user.id,
        citation.id,
        deletion.data.len()
    );

    Ok(Redirect::to(LISTING_LOCATION)
        .notice(Notice::success("Citation deleted"))
        .with_data(Some(deletion)))
}
