//! Grade statistics, computed by scanning the exam list embedded in each
//! student document; nothing is precomputed or cached in the store.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::model::studenti::{Studente, SOGLIA_VOTI_ALTI};
use crate::database::parse_object_id;
use crate::error::{CorsiResult, UserError};

use super::AppState;

pub async fn media_voti_tutti(State(state): State<AppState>) -> CorsiResult<Json<Vec<MediaVoti>>> {
    let studenti = state.studenti.find_all().await?;
    Ok(Json(studenti.iter().map(MediaVoti::from).collect()))
}

pub async fn media_voti_studente(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CorsiResult<Json<MediaVoti>> {
    let id = parse_object_id(&id)?;
    let studente = state
        .studenti
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Studente" })?;
    Ok(Json(MediaVoti::from(&studente)))
}

pub async fn voti_alti_tutti(
    State(state): State<AppState>,
    Query(query): Query<SogliaQuery>,
) -> CorsiResult<Json<Vec<VotiAlti>>> {
    let soglia = query.soglia()?;
    let studenti = state.studenti.find_all().await?;
    Ok(Json(
        studenti
            .iter()
            .map(|studente| VotiAlti::new(studente, soglia))
            .collect(),
    ))
}

pub async fn voti_alti_studente(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SogliaQuery>,
) -> CorsiResult<Json<VotiAlti>> {
    let id = parse_object_id(&id)?;
    let soglia = query.soglia()?;
    let studente = state
        .studenti
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Studente" })?;
    Ok(Json(VotiAlti::new(&studente, soglia)))
}

/// The threshold arrives as an opaque string and is parsed here, so a
/// malformed value goes through the usual validation error and its JSON
/// body instead of the extractor's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct SogliaQuery {
    #[serde(default)]
    soglia: Option<String>,
}

impl SogliaQuery {
    fn soglia(&self) -> Result<i32, UserError> {
        match self.soglia.as_deref() {
            None => Ok(SOGLIA_VOTI_ALTI),
            Some(raw) => raw.parse().map_err(|_| UserError::Validation {
                message: format!("soglia non valida: '{raw}'"),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaVoti {
    pub cognome: String,
    pub nome: String,
    /// `null` when no exam of the student carries a grade.
    pub voti: Option<f64>,
}

impl From<&Studente> for MediaVoti {
    fn from(studente: &Studente) -> Self {
        Self {
            cognome: studente.cognome.clone(),
            nome: studente.nome.clone(),
            voti: studente.media_voti(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VotiAlti {
    pub nome: String,
    pub cognome: String,
    pub voti_alti: Vec<i32>,
}

impl VotiAlti {
    fn new(studente: &Studente, soglia: i32) -> Self {
        Self {
            nome: studente.nome.clone(),
            cognome: studente.cognome.clone(),
            voti_alti: studente.voti_alti(soglia),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MediaVoti, SogliaQuery};
    use crate::database::model::studenti::{Studente, SOGLIA_VOTI_ALTI};
    use crate::error::UserError;

    #[test]
    fn test_soglia_assente_usa_il_default() {
        let query = SogliaQuery { soglia: None };
        assert_eq!(query.soglia(), Ok(SOGLIA_VOTI_ALTI));
    }

    #[test]
    fn test_soglia_fornita() {
        let query = SogliaQuery {
            soglia: Some("20".to_string()),
        };
        assert_eq!(query.soglia(), Ok(20));
    }

    #[test]
    fn test_soglia_malformata_e_un_errore_di_validazione() {
        for raw in ["abc", "24.5", ""] {
            let query = SogliaQuery {
                soglia: Some(raw.to_string()),
            };
            assert!(
                matches!(query.soglia(), Err(UserError::Validation { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_media_voti_serializza_null_senza_voti() {
        let studente = Studente {
            id: None,
            nome: "Anna".to_string(),
            cognome: "Rossi".to_string(),
            email: None,
            moduli_iscritti: Vec::new(),
            esami: Vec::new(),
        };

        let value = serde_json::to_value(MediaVoti::from(&studente)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"cognome": "Rossi", "nome": "Anna", "voti": null})
        );
    }
}
