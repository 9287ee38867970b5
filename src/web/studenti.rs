use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::model::moduli::ModuloSnapshot;
use crate::database::model::studenti::{EsameEmbedded, Studente};
use crate::database::parse_object_id;
use crate::error::{CorsiError, CorsiResult, UserError};

use super::{parse_body, required_text, validated_email, AppState};

pub async fn list_studenti(
    State(state): State<AppState>,
) -> CorsiResult<Json<Vec<StudenteResponse>>> {
    let studenti = state.studenti.find_all().await?;
    Ok(Json(studenti.into_iter().map(Into::into).collect()))
}

#[instrument(err, skip(state, body))]
pub async fn create_studente(
    State(state): State<AppState>,
    body: String,
) -> CorsiResult<(StatusCode, Json<StudenteResponse>)> {
    let request: CreateStudenteRequest = parse_body(&body)?;
    let mut studente = request.into_studente()?;

    let id = state.studenti.insert_one(&studente).await?;
    studente.id = Some(id);

    Ok((StatusCode::CREATED, Json(studente.into())))
}

pub async fn get_studente(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CorsiResult<Json<StudenteResponse>> {
    let id = parse_object_id(&id)?;
    let studente = state
        .studenti
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Studente" })?;
    Ok(Json(studente.into()))
}

#[instrument(err, skip(state, body))]
pub async fn update_studente(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> CorsiResult<Json<StudenteResponse>> {
    let id = parse_object_id(&id)?;
    let request: UpdateStudenteRequest = parse_body(&body)?;
    let fields = request.into_update_document()?;

    // The store rejects an empty `$set`, and there is nothing to write anyway.
    if !fields.is_empty() && state.studenti.update_one(id, fields).await? == 0 {
        return Err(UserError::NotFound { entity: "Studente" }.into());
    }

    let studente = state
        .studenti
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Studente" })?;
    Ok(Json(studente.into()))
}

pub async fn delete_studente(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CorsiResult<StatusCode> {
    let id = parse_object_id(&id)?;
    if state.studenti.delete_one(id).await? == 0 {
        return Err(UserError::NotFound { entity: "Studente" }.into());
    }

    // Soft references to this student embedded in module documents are left
    // in place, so modules keep the historical name.
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateStudenteRequest {
    nome: String,
    cognome: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "moduliIscritti", default)]
    moduli_iscritti: Vec<String>,
    #[serde(default)]
    esami: Vec<EsameInput>,
}

impl CreateStudenteRequest {
    pub fn into_studente(self) -> Result<Studente, UserError> {
        Ok(Studente {
            id: None,
            nome: required_text("nome", self.nome)?,
            cognome: required_text("cognome", self.cognome)?,
            email: self.email.map(validated_email).transpose()?,
            moduli_iscritti: self.moduli_iscritti,
            esami: self
                .esami
                .into_iter()
                .map(EsameInput::into_embedded)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStudenteRequest {
    nome: Option<String>,
    cognome: Option<String>,
    email: Option<String>,
    #[serde(rename = "moduliIscritti")]
    moduli_iscritti: Option<Vec<String>>,
    esami: Option<Vec<EsameInput>>,
}

impl UpdateStudenteRequest {
    /// Build the `$set` document for a partial update: only supplied fields
    /// are touched, and a supplied `esami` replaces the whole list.
    pub fn into_update_document(self) -> CorsiResult<Document> {
        let mut fields = Document::new();
        if let Some(nome) = self.nome {
            fields.insert("nome", required_text("nome", nome)?);
        }
        if let Some(cognome) = self.cognome {
            fields.insert("cognome", required_text("cognome", cognome)?);
        }
        if let Some(email) = self.email {
            fields.insert("email", validated_email(email)?);
        }
        if let Some(moduli_iscritti) = self.moduli_iscritti {
            fields.insert("moduliIscritti", moduli_iscritti);
        }
        if let Some(esami) = self.esami {
            let esami = esami
                .into_iter()
                .map(EsameInput::into_embedded)
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(
                "esami",
                bson::to_bson(&esami).map_err(|error| CorsiError::SerializeDocument {
                    source: Box::new(error),
                })?,
            );
        }
        Ok(fields)
    }
}

/// An exam as supplied by the caller. The nested module, when present, is
/// remapped through the snapshot constructor before anything is persisted.
#[derive(Debug, Deserialize)]
pub struct EsameInput {
    #[serde(default)]
    data: Option<NaiveDate>,
    #[serde(default)]
    voto: Option<i32>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    modulo: Option<ModuloSnapshot>,
}

impl EsameInput {
    pub fn into_embedded(self) -> Result<EsameEmbedded, UserError> {
        let modulo = self
            .modulo
            .map(|snapshot| {
                Ok::<_, UserError>(ModuloSnapshot {
                    codice: required_text("esami.modulo.codice", snapshot.codice)?,
                    nome: required_text("esami.modulo.nome", snapshot.nome)?,
                    ore: snapshot.ore,
                    descrizione: snapshot.descrizione,
                })
            })
            .transpose()?;

        Ok(EsameEmbedded {
            data: self.data,
            voto: self.voto,
            note: self.note,
            modulo,
        })
    }
}

/// A student as rendered in responses: the store id becomes a hex string.
#[derive(Debug, Serialize)]
pub struct StudenteResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub nome: String,
    pub cognome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "moduliIscritti")]
    pub moduli_iscritti: Vec<String>,
    pub esami: Vec<EsameEmbedded>,
}

impl From<Studente> for StudenteResponse {
    fn from(studente: Studente) -> Self {
        Self {
            // Documents coming out of the store always carry an id.
            id: studente.id.map(|id| id.to_hex()).unwrap_or_default(),
            nome: studente.nome,
            cognome: studente.cognome,
            email: studente.email,
            moduli_iscritti: studente.moduli_iscritti,
            esami: studente.esami,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CreateStudenteRequest, UpdateStudenteRequest};
    use crate::error::UserError;
    use crate::web::parse_body;

    #[test]
    fn test_create_richiede_nome_e_cognome() {
        let request: CreateStudenteRequest =
            parse_body(r#"{"nome": "", "cognome": "Rossi"}"#).unwrap();
        assert!(matches!(
            request.into_studente(),
            Err(UserError::Validation { .. })
        ));

        // A missing required field is already a deserialization failure.
        assert!(parse_body::<CreateStudenteRequest>(r#"{"nome": "Anna"}"#).is_err());
    }

    #[test]
    fn test_create_valida_email() {
        let request: CreateStudenteRequest = parse_body(
            r#"{"nome": "Anna", "cognome": "Rossi", "email": "non-una-email"}"#,
        )
        .unwrap();
        assert!(request.into_studente().is_err());

        let request: CreateStudenteRequest = parse_body(
            r#"{"nome": "Anna", "cognome": "Rossi", "email": "anna.rossi@example.com"}"#,
        )
        .unwrap();
        let studente = request.into_studente().unwrap();
        assert_eq!(studente.email.as_deref(), Some("anna.rossi@example.com"));
    }

    #[test]
    fn test_create_costruisce_snapshot_del_modulo() {
        let request: CreateStudenteRequest = parse_body(
            r#"{
                "nome": "Anna",
                "cognome": "Rossi",
                "esami": [
                    {"voto": 30, "data": "2024-06-15",
                     "modulo": {"codice": "M1", "nome": "Algoritmi", "ore": 40}},
                    {"voto": 22}
                ]
            }"#,
        )
        .unwrap();

        let studente = request.into_studente().unwrap();
        assert_eq!(studente.esami.len(), 2);

        let snapshot = studente.esami[0].modulo.as_ref().unwrap();
        assert_eq!(snapshot.codice, "M1");
        assert_eq!(snapshot.nome, "Algoritmi");
        assert_eq!(snapshot.ore, Some(40));
        assert_eq!(snapshot.descrizione, None);

        // An exam without a module snapshot is allowed.
        assert!(studente.esami[1].modulo.is_none());
    }

    #[test]
    fn test_create_rifiuta_voto_non_intero() {
        assert!(parse_body::<CreateStudenteRequest>(
            r#"{"nome": "Anna", "cognome": "Rossi", "esami": [{"voto": 28.5}]}"#
        )
        .is_err());
    }

    #[test]
    fn test_update_tocca_solo_i_campi_forniti() {
        let request: UpdateStudenteRequest = parse_body(r#"{"cognome": "Bianchi"}"#).unwrap();
        let fields = request.into_update_document().unwrap();

        assert_eq!(fields.get_str("cognome").unwrap(), "Bianchi");
        assert!(!fields.contains_key("nome"));
        assert!(!fields.contains_key("esami"));
    }

    #[test]
    fn test_update_sostituisce_gli_esami_per_intero() {
        let request: UpdateStudenteRequest = parse_body(
            r#"{"esami": [{"voto": 30, "modulo": {"codice": "M1", "nome": "Algo", "ore": 40}}]}"#,
        )
        .unwrap();
        let fields = request.into_update_document().unwrap();

        let esami = fields.get_array("esami").unwrap();
        assert_eq!(esami.len(), 1);
        let esame = esami[0].as_document().unwrap();
        assert_eq!(esame.get_i32("voto").unwrap(), 30);
        let snapshot = esame.get_document("modulo").unwrap();
        assert_eq!(snapshot.get_str("codice").unwrap(), "M1");
        assert_eq!(snapshot.get_str("nome").unwrap(), "Algo");
        assert_eq!(snapshot.get_i32("ore").unwrap(), 40);
    }

    #[test]
    fn test_update_vuoto_non_tocca_nulla() {
        let request: UpdateStudenteRequest = parse_body("{}").unwrap();
        assert!(request.into_update_document().unwrap().is_empty());
    }
}
