//! HTTP-facing error type.
//!
//! Every handler returns `Result<_, AppError>`. Validation failures are field-scoped:
//! the body is a JSON object mapping each offending field to its messages.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeMap;

use crate::storage::StoreError;

/// Field name -> messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Re-keys every entry under `prefix`, e.g. `row` -> `tickets[2].row`.
    pub fn prefixed(self, prefix: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(field, messages)| (format!("{prefix}.{field}"), messages))
                .collect(),
        )
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value ({})", error.code));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("authentication credentials were not provided")]
    Unauthorized,

    #[error("permission denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                AppError::NotFound(format!("{entity} with id {id}"))
            }
            StoreError::DuplicateGenre(name) => {
                AppError::field("name", format!("genre with name '{name}' already exists"))
            }
            StoreError::DuplicateEmail(email) => {
                AppError::field("email", format!("user with email '{email}' already exists"))
            }
            StoreError::SeatTaken { performance_id, row, seat } => AppError::field(
                "non_field_errors",
                format!(
                    "seat (row: {row}, seat: {seat}) is already taken for performance {performance_id}"
                ),
            ),
            StoreError::UnknownReference { field, id } => {
                AppError::field(field, format!("invalid pk \"{id}\" - object does not exist"))
            }
            StoreError::InvalidSeat { index, errors } => {
                AppError::Validation(errors.prefixed(&format!("tickets[{index}]")))
            }
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer realm=\"api\"")],
                Json(json!({ "detail": "Authentication credentials were not provided." })),
            )
                .into_response(),
            AppError::Forbidden => (
                status,
                Json(json!({ "detail": "You do not have permission to perform this action." })),
            )
                .into_response(),
            AppError::NotFound(what) => {
                (status, Json(json!({ "detail": format!("{what} not found") }))).into_response()
            }
            AppError::Validation(errors) => (status, Json(errors)).into_response(),
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                (status, Json(json!({ "detail": "Internal server error" }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_accumulate_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("row", "too small");
        errors.add("row", "still too small");
        errors.add("seat", "too big");
        assert_eq!(errors.get("row").map(<[String]>::len), Some(2));
        assert_eq!(errors.get("seat"), Some(&["too big".to_string()][..]));
    }

    #[test]
    fn prefixed_rekeys_fields() {
        let errors = FieldErrors::single("row", "bad").prefixed("tickets[0]");
        assert!(errors.get("tickets[0].row").is_some());
        assert!(errors.get("row").is_none());
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let not_found: AppError = StoreError::NotFound { entity: "play", id: 7 }.into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let taken: AppError = StoreError::SeatTaken { performance_id: 1, row: 2, seat: 3 }.into();
        assert_eq!(taken.status(), StatusCode::BAD_REQUEST);

        let unknown: AppError = StoreError::UnknownReference { field: "genres", id: 99 }.into();
        match unknown {
            AppError::Validation(errors) => assert!(errors.get("genres").is_some()),
            other => panic!("unexpected {other:?}"),
        }

        let seat: AppError =
            StoreError::InvalidSeat { index: 1, errors: FieldErrors::single("row", "out of range") }.into();
        match seat {
            AppError::Validation(errors) => assert!(errors.get("tickets[1].row").is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(FieldErrors::single("x", "y").into_result().is_err());
    }
}
