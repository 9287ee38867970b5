use std::ffi::OsString;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type BoxDynError = Box<dyn std::error::Error + Send + Sync>;
pub type CorsiResult<T> = Result<T, CorsiError>;

#[derive(Debug, Error)]
pub enum CorsiError {
    #[error("environment variable '{key}' has malformed value {value:?}: {source}")]
    MalformedEnvironmentVariable {
        key: String,
        value: OsString,
        source: BoxDynError,
    },

    #[error("error setting up tracing: {source}")]
    SetupTracing { source: BoxDynError },

    #[error("error connecting to the document store: {source}")]
    SetupDatabase { source: BoxDynError },

    #[error("document store error: {source}")]
    Database { source: mongodb::error::Error },

    #[error("duplicate key in the document store: {source}")]
    DuplicateKey { source: mongodb::error::Error },

    #[error("the document store returned a non-ObjectId document id: {id}")]
    UnexpectedDocumentId { id: mongodb::bson::Bson },

    #[error("error serializing a document: {source}")]
    SerializeDocument { source: BoxDynError },

    #[error("error reading seed data: {source}")]
    SeedData { source: BoxDynError },

    #[error("error running the API server: {source}")]
    ApiServerError { source: BoxDynError },

    #[error(transparent)]
    User(#[from] UserError),
}

/// Errors that are caused by the user and reported back verbatim.
/// Everything else is logged and reported as a generic internal error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("{message}")]
    Validation { message: String },

    #[error("id non valido: '{id}'")]
    InvalidId { id: String },

    #[error("{entity} non trovato")]
    NotFound { entity: &'static str },

    #[error("esiste già un modulo con codice '{codice}'")]
    DuplicateCodice { codice: String },
}

impl UserError {
    fn status_code(&self) -> StatusCode {
        match self {
            UserError::Validation { .. } | UserError::InvalidId { .. } => StatusCode::BAD_REQUEST,
            UserError::NotFound { .. } => StatusCode::NOT_FOUND,
            UserError::DuplicateCodice { .. } => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for CorsiError {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            CorsiError::User(user_error) => (user_error.status_code(), user_error.to_string()),
            other => {
                error!("internal error while handling a request: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "errore interno del server".to_string(),
                )
            }
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}
