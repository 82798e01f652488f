//! HTTP-facing error type for page and admin handlers.
//!
//! Chat endpoints use their own JSON contract in [`crate::chat`]; everything
//! else funnels through [`SiteError`], which renders a plain-text body with
//! the matching status code and logs server-side failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type SiteResult<T> = Result<T, SiteError>;

impl From<StoreError> for SiteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => {
                SiteError::NotFound(format!("{} '{}'", table, id))
            }
            StoreError::Invalid(msg) => SiteError::BadRequest(msg),
            StoreError::SingletonExists(section) => {
                SiteError::Conflict(format!("section '{}' already exists", section))
            }
            StoreError::Duplicate(msg) => SiteError::Conflict(msg),
            StoreError::Database(e) => SiteError::Internal(e.into()),
        }
    }
}

impl SiteError {
    pub fn status(&self) -> StatusCode {
        match self {
            SiteError::NotFound(_) => StatusCode::NOT_FOUND,
            SiteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SiteError::Unauthorized => StatusCode::UNAUTHORIZED,
            SiteError::Conflict(_) => StatusCode::CONFLICT,
            SiteError::Template(_) | SiteError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            SiteError::Template(e) => {
                tracing::error!(error = %e, "template rendering failed");
                "Internal Server Error".to_string()
            }
            SiteError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                "Internal Server Error".to_string()
            }
            SiteError::NotFound(_) => "Not Found".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
