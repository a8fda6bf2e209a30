use std::collections::BTreeMap;

use axum::{
    Json,
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::auth::Denial;
use crate::error::{Error, Result as StoreResult};

/// Where authorization failures are sent.
pub const DENIED_LOCATION: &str = "/search";
/// Where missing records are sent.
pub const LISTING_LOCATION: &str = "/dm/edit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Success,
    Message,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Message,
            message: message.into(),
        }
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub notices: Vec<Notice>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn notice(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }
}

/// A `303 See Other` reply. The body carries the notices for the next page.
#[derive(Debug)]
pub struct Redirect<T: Serialize = ()> {
    pub location: String,
    pub body: ApiResponse<T>,
}

impl Redirect<()> {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            body: ApiResponse {
                data: None,
                error: None,
                notices: Vec::new(),
            },
        }
    }
}

impl<T: Serialize> Redirect<T> {
    /// Attaches a payload, e.g. the id of a created record.
    pub fn with_data<U: Serialize>(self, data: U) -> Redirect<U> {
        Redirect {
            location: self.location,
            body: ApiResponse {
                data: Some(data),
                error: self.body.error,
                notices: self.body.notices,
            },
        }
    }

    #[must_use]
    pub fn notice(mut self, notice: Notice) -> Self {
        self.body.notices.push(notice);
        self
    }
}

impl<T: Serialize> IntoResponse for Redirect<T> {
    fn into_response(self) -> Response {
        (
            StatusCode::SEE_OTHER,
            [(LOCATION, self.location)],
            Json(self.body),
        )
            .into_response()
    }
}

/// Per-field validation messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub notices: Vec<Notice>,
    pub location: Option<String>,
    pub fields: FieldErrors,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            notices: Vec::new(),
            location: None,
            fields: FieldErrors::new(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Flashes `message` as an error and redirects to `location`.
    #[must_use]
    pub fn redirect(location: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: StatusCode::SEE_OTHER,
            notices: vec![Notice::error(message.clone())],
            location: Some(location.into()),
            message,
            fields: FieldErrors::new(),
        }
    }

    /// A record that does not exist; sends the user back to the listing.
    #[must_use]
    pub fn missing(message: impl Into<String>) -> Self {
        Self::redirect(LISTING_LOCATION, message)
    }

    #[must_use]
    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            fields,
            ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation failed")
        }
    }

    /// A failed mutation: the error text is flashed on the way back to the form.
    #[must_use]
    pub fn flash(error: Error, location: &str) -> Self {
        tracing::warn!("Mutation failed: {error}");
        match error {
            Error::NotFound => Self::missing("This Id does not exist"),
            e => Self::redirect(location, e.to_string()),
        }
    }

    /// A validation failure on a single field.
    #[must_use]
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.into()]);
        Self::validation(fields)
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            message: "forbidden".to_string(),
            notices: denial.messages.into_iter().map(Notice::error).collect(),
            location: Some(DENIED_LOCATION.to_string()),
            fields: FieldErrors::new(),
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    data: Option<()>,
    error: String,
    notices: Vec<Notice>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: FieldErrors,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            data: None,
            error: self.message,
            notices: self.notices,
            fields: self.fields,
        });

        match self.location {
            Some(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)], body).into_response(),
            None => (self.status, body).into_response(),
        }
    }
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;

    /// Flashes the error text and redirects back to `location`.
    fn or_flash(self, location: &str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        })
    }

    fn or_flash(self, location: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::flash(e, location))
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_missing(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_missing(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::missing(message))
    }
}
