use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use mongodb::Database;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};

use crate::database::model::moduli::Modulo;
use crate::database::model::studenti::Studente;
use crate::database::DocumentCollection;
use crate::{
    configuration::Configuration,
    error::{CorsiError, CorsiResult, UserError},
};

pub mod moduli;
pub mod statistiche;
pub mod studenti;

/// The shared state of the web API: one typed handle per collection,
/// constructed once at startup and injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub studenti: DocumentCollection<Studente>,
    pub moduli: DocumentCollection<Modulo>,
}

impl AppState {
    pub fn new(database: &Database) -> Self {
        Self {
            studenti: DocumentCollection::new(database, Studente::COLLECTION),
            moduli: DocumentCollection::new(database, Modulo::COLLECTION),
        }
    }
}

#[instrument(err, skip(database, configuration))]
pub async fn run_web_api(database: Database, configuration: &Configuration) -> CorsiResult<()> {
    info!("Starting web API");

    let router = Router::new()
        .route(
            "/studenti",
            get(studenti::list_studenti).post(studenti::create_studente),
        )
        .route("/studenti/media", get(statistiche::media_voti_tutti))
        .route("/studenti/media/:id", get(statistiche::media_voti_studente))
        .route("/studenti/voti-alti", get(statistiche::voti_alti_tutti))
        .route(
            "/studenti/voti-alti/:id",
            get(statistiche::voti_alti_studente),
        )
        .route(
            "/studenti/:id",
            get(studenti::get_studente)
                .put(studenti::update_studente)
                .delete(studenti::delete_studente),
        )
        .route(
            "/moduli",
            get(moduli::list_moduli).post(moduli::create_modulo),
        )
        .route(
            "/moduli/:id",
            get(moduli::get_modulo)
                .put(moduli::update_modulo)
                .delete(moduli::delete_modulo),
        )
        .fallback(handler_404)
        .with_state(AppState::new(&database));

    debug!(
        "Listening for API requests on {}",
        configuration.api_listen_address
    );
    axum::Server::bind(&configuration.api_listen_address)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| CorsiError::ApiServerError {
            source: Box::new(error),
        })?;

    info!("Web API terminated normally");
    Ok(())
}

async fn handler_404(path: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("percorso non valido: {path}") })),
    )
}

async fn shutdown_signal() {
    let sigint = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!("Error receiving SIGINT: {error}");
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                if handler.recv().await.is_none() {
                    error!("Received None from SIGTERM handler. This is unexpected.");
                }
            }
            Err(error) => error!("Error installing SIGTERM handler: {error}"),
        }
    };

    // This future never completes, hence we offer no other means of shutdown on non-unix platforms.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    // Shutdown if either signal is received
    tokio::select! {
        _ = sigint => info!("Received SIGINT, shutting down"),
        _ = sigterm => info!("Received SIGTERM, shutting down"),
    }
}

/// Parse a request body into its typed form. Anything serde rejects
/// (missing required fields, a fractional `voto`, malformed JSON) is a
/// validation error reported to the caller.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, UserError> {
    serde_json::from_str(body).map_err(|error| UserError::Validation {
        message: format!("corpo della richiesta non valido: {error}"),
    })
}

/// A required text field must be present and non-empty after trimming.
pub(crate) fn required_text(field: &'static str, value: String) -> Result<String, UserError> {
    if value.trim().is_empty() {
        Err(UserError::Validation {
            message: format!("campo obbligatorio mancante o vuoto: '{field}'"),
        })
    } else {
        Ok(value)
    }
}

/// Shallow shape check, not an RFC 5321 validator: one '@', a non-empty
/// local part, a dotted domain, no whitespace.
pub(crate) fn is_email_shaped(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

pub(crate) fn validated_email(email: String) -> Result<String, UserError> {
    if is_email_shaped(&email) {
        Ok(email)
    } else {
        Err(UserError::Validation {
            message: format!("email non valida: '{email}'"),
        })
    }
}
