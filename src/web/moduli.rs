use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::model::moduli::{Modulo, StudenteRef};
use crate::database::parse_object_id;
use crate::error::{CorsiError, CorsiResult, UserError};

use super::{parse_body, required_text, AppState};

pub async fn list_moduli(State(state): State<AppState>) -> CorsiResult<Json<Vec<ModuloResponse>>> {
    let moduli = state.moduli.find_all().await?;
    Ok(Json(moduli.into_iter().map(Into::into).collect()))
}

#[instrument(err, skip(state, body))]
pub async fn create_modulo(
    State(state): State<AppState>,
    body: String,
) -> CorsiResult<(StatusCode, Json<ModuloResponse>)> {
    let request: CreateModuloRequest = parse_body(&body)?;
    let mut modulo = request.into_modulo()?;

    let id = match state.moduli.insert_one(&modulo).await {
        Err(CorsiError::DuplicateKey { .. }) => {
            return Err(UserError::DuplicateCodice {
                codice: modulo.codice,
            }
            .into())
        }
        other => other?,
    };
    modulo.id = Some(id);

    Ok((StatusCode::CREATED, Json(modulo.into())))
}

pub async fn get_modulo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CorsiResult<Json<ModuloResponse>> {
    let id = parse_object_id(&id)?;
    let modulo = state
        .moduli
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Modulo" })?;
    Ok(Json(modulo.into()))
}

#[instrument(err, skip(state, body))]
pub async fn update_modulo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> CorsiResult<Json<ModuloResponse>> {
    let id = parse_object_id(&id)?;
    let request: UpdateModuloRequest = parse_body(&body)?;
    let codice = request.codice.clone();
    let fields = request.into_update_document()?;

    if !fields.is_empty() {
        let matched = match state.moduli.update_one(id, fields).await {
            // Changing `codice` can collide with another module.
            Err(CorsiError::DuplicateKey { .. }) => {
                return Err(UserError::DuplicateCodice {
                    codice: codice.unwrap_or_default(),
                }
                .into())
            }
            other => other?,
        };
        if matched == 0 {
            return Err(UserError::NotFound { entity: "Modulo" }.into());
        }
    }

    let modulo = state
        .moduli
        .find_one(id)
        .await?
        .ok_or(UserError::NotFound { entity: "Modulo" })?;
    Ok(Json(modulo.into()))
}

pub async fn delete_modulo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CorsiResult<StatusCode> {
    let id = parse_object_id(&id)?;
    if state.moduli.delete_one(id).await? == 0 {
        return Err(UserError::NotFound { entity: "Modulo" }.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateModuloRequest {
    codice: String,
    nome: String,
    #[serde(default)]
    ore: Option<i32>,
    #[serde(default)]
    descrizione: Option<String>,
    #[serde(rename = "studentiIscritti", default)]
    studenti_iscritti: Vec<StudenteRefInput>,
}

impl CreateModuloRequest {
    pub fn into_modulo(self) -> Result<Modulo, UserError> {
        Ok(Modulo {
            id: None,
            codice: required_text("codice", self.codice)?,
            nome: required_text("nome", self.nome)?,
            ore: self.ore,
            descrizione: self.descrizione,
            studenti_iscritti: self
                .studenti_iscritti
                .into_iter()
                .map(StudenteRefInput::into_ref)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateModuloRequest {
    codice: Option<String>,
    nome: Option<String>,
    ore: Option<i32>,
    descrizione: Option<String>,
    #[serde(rename = "studentiIscritti")]
    studenti_iscritti: Option<Vec<StudenteRefInput>>,
}

impl UpdateModuloRequest {
    /// Build the `$set` document for a partial update: only supplied fields
    /// are touched, and a supplied `studentiIscritti` replaces the whole list.
    pub fn into_update_document(self) -> CorsiResult<Document> {
        let mut fields = Document::new();
        if let Some(codice) = self.codice {
            fields.insert("codice", required_text("codice", codice)?);
        }
        if let Some(nome) = self.nome {
            fields.insert("nome", required_text("nome", nome)?);
        }
        if let Some(ore) = self.ore {
            fields.insert("ore", ore);
        }
        if let Some(descrizione) = self.descrizione {
            fields.insert("descrizione", descrizione);
        }
        if let Some(studenti_iscritti) = self.studenti_iscritti {
            let studenti = studenti_iscritti
                .into_iter()
                .map(StudenteRefInput::into_ref)
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(
                "studentiIscritti",
                bson::to_bson(&studenti).map_err(|error| CorsiError::SerializeDocument {
                    source: Box::new(error),
                })?,
            );
        }
        Ok(fields)
    }
}

/// An enrolled-student reference as supplied by the caller: the id, when
/// present, arrives as a hex string and is parsed into the store's id type.
#[derive(Debug, Deserialize)]
pub struct StudenteRefInput {
    #[serde(default)]
    studente_id: Option<String>,
    nome: String,
}

impl StudenteRefInput {
    pub fn into_ref(self) -> Result<StudenteRef, UserError> {
        Ok(StudenteRef {
            studente_id: self
                .studente_id
                .as_deref()
                .map(parse_object_id)
                .transpose()?,
            nome: required_text("studentiIscritti.nome", self.nome)?,
        })
    }
}

/// A module as rendered in responses: the store ids become hex strings,
/// including the soft references to enrolled students.
#[derive(Debug, Serialize)]
pub struct ModuloResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub codice: String,
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ore: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descrizione: Option<String>,
    #[serde(rename = "studentiIscritti")]
    pub studenti_iscritti: Vec<StudenteRefResponse>,
}

#[derive(Debug, Serialize)]
pub struct StudenteRefResponse {
    pub studente_id: Option<String>,
    pub nome: String,
}

impl From<Modulo> for ModuloResponse {
    fn from(modulo: Modulo) -> Self {
        Self {
            // Documents coming out of the store always carry an id.
            id: modulo.id.map(|id| id.to_hex()).unwrap_or_default(),
            codice: modulo.codice,
            nome: modulo.nome,
            ore: modulo.ore,
            descrizione: modulo.descrizione,
            studenti_iscritti: modulo
                .studenti_iscritti
                .into_iter()
                .map(|studente| StudenteRefResponse {
                    studente_id: studente.studente_id.map(|id| id.to_hex()),
                    nome: studente.nome,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CreateModuloRequest, UpdateModuloRequest};
    use crate::error::UserError;
    use crate::web::parse_body;

    #[test]
    fn test_create_richiede_codice_e_nome() {
        let request: CreateModuloRequest =
            parse_body(r#"{"codice": " ", "nome": "Basi di dati"}"#).unwrap();
        assert!(matches!(
            request.into_modulo(),
            Err(UserError::Validation { .. })
        ));

        assert!(parse_body::<CreateModuloRequest>(r#"{"nome": "Basi di dati"}"#).is_err());
    }

    #[test]
    fn test_riferimento_studente_con_id_assente() {
        let request: CreateModuloRequest = parse_body(
            r#"{
                "codice": "M2",
                "nome": "Basi di dati",
                "studentiIscritti": [{"studente_id": null, "nome": "Mario Verdi"}]
            }"#,
        )
        .unwrap();

        let modulo = request.into_modulo().unwrap();
        assert_eq!(modulo.studenti_iscritti.len(), 1);
        assert_eq!(modulo.studenti_iscritti[0].studente_id, None);
        assert_eq!(modulo.studenti_iscritti[0].nome, "Mario Verdi");
    }

    #[test]
    fn test_riferimento_studente_con_id_malformato() {
        let request: CreateModuloRequest = parse_body(
            r#"{
                "codice": "M2",
                "nome": "Basi di dati",
                "studentiIscritti": [{"studente_id": "non-un-id", "nome": "Mario Verdi"}]
            }"#,
        )
        .unwrap();

        assert!(matches!(
            request.into_modulo(),
            Err(UserError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_update_sostituisce_gli_iscritti_per_intero() {
        let request: UpdateModuloRequest = parse_body(
            r#"{"studentiIscritti": [
                {"studente_id": "653f1a2b3c4d5e6f78901234", "nome": "Anna Rossi"}
            ]}"#,
        )
        .unwrap();
        let fields = request.into_update_document().unwrap();

        assert!(!fields.contains_key("codice"));
        let studenti = fields.get_array("studentiIscritti").unwrap();
        assert_eq!(studenti.len(), 1);
        let studente = studenti[0].as_document().unwrap();
        assert_eq!(studente.get_str("nome").unwrap(), "Anna Rossi");
        assert_eq!(
            studente.get_object_id("studente_id").unwrap().to_hex(),
            "653f1a2b3c4d5e6f78901234"
        );
    }
}
