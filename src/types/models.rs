use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: i64,
    pub creator_id: i64,
    pub authors: String,
    pub year: i64,
    pub journal: String,
    pub doi: String,
    pub ads: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub id: i64,
    pub citation_id: i64,
    pub creator_id: i64,
    pub sample_type: String,
    pub element: String,
}

/// One row of the append-only edit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edit {
    pub id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
    pub table: String,
    pub item_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attr {
    pub id: i64,
    pub key: String,
    pub value: String,
}

/// A login session. The raw bearer token is only ever held by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewCitation {
    pub creator_id: i64,
    pub authors: String,
    pub year: i64,
    pub journal: String,
    pub doi: String,
    pub ads: String,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct CitationPatch {
    pub authors: Option<String>,
    pub year: Option<i64>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    pub ads: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewData {
    pub citation_id: i64,
    pub creator_id: i64,
    pub sample_type: String,
    pub element: String,
}

#[derive(Debug, Clone, Default)]
pub struct DataPatch {
    pub sample_type: Option<String>,
    pub element: Option<String>,
}
