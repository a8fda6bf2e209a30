use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Choice, HistoryRow, ListingRow, SearchTable};
use crate::types::{Citation, Data, Role, User};

// Users

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SignupParams {
    #[serde(default)]
    pub signup_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

// Search

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub compress: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchChoices {
    pub sample_type: Vec<String>,
    pub element: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub choices: SearchChoices,
    #[serde(flatten)]
    pub table: SearchTable,
}

// Data management

/// A new citation. `nodoi` marks a citation identified by URL.
#[derive(Debug, Deserialize)]
pub struct CitationForm {
    pub authors: String,
    pub year: i64,
    pub journal: String,
    pub doi: String,
    #[serde(default)]
    pub ads: String,
    #[serde(default)]
    pub nodoi: bool,
}

/// Omitted fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct CitationEditForm {
    pub authors: Option<String>,
    pub year: Option<i64>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    pub ads: Option<String>,
    #[serde(default)]
    pub nodoi: bool,
}

/// New data rows; `element` may hold a comma separated list.
#[derive(Debug, Deserialize)]
pub struct DataForm {
    #[serde(default)]
    pub citation: Option<i64>,
    pub sample_type: String,
    pub element: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataEditForm {
    pub sample_type: Option<String>,
    pub element: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditLookup {
    pub table: String,
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteConfirm {
    #[serde(default)]
    pub yes: bool,
    #[serde(default)]
    pub no: bool,
}

#[derive(Debug, Serialize)]
pub struct AddCitationPage {
    pub journals: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddDataPage {
    pub citations: Vec<Choice>,
    pub sample_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedData {
    pub citation_id: i64,
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct EditListingPage {
    pub headings: Vec<&'static str>,
    pub rows: Vec<ListingRow>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub headings: Vec<&'static str>,
    pub rows: Vec<HistoryRow>,
}

#[derive(Debug, Serialize)]
pub struct CitationPage {
    pub citation: Citation,
    pub journals: Vec<String>,
    pub history: HistoryPage,
}

#[derive(Debug, Serialize)]
pub struct DataPage {
    pub data: Data,
    pub citation: String,
    pub sample_types: Vec<String>,
    pub history: HistoryPage,
}

#[derive(Debug, Serialize)]
pub struct DeleteCitationPage {
    pub citation: Citation,
    pub label: String,
    pub data_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteDataPage {
    pub data: Data,
    pub citation: String,
}

// Admin

#[derive(Debug, Serialize)]
pub struct SignupLinkPage {
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleChoice {
    pub role: Role,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChangeRolePage {
    pub users: Vec<Choice>,
    pub roles: Vec<RoleChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub user: i64,
    pub role: Role,
}
