use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A course module. `codice` is unique across the collection, enforced by
/// an index created at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modulo {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub codice: String,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ore: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descrizione: Option<String>,
    #[serde(rename = "studentiIscritti", default)]
    pub studenti_iscritti: Vec<StudenteRef>,
}

impl Modulo {
    pub const COLLECTION: &'static str = "modulo";
}

/// Soft reference to an enrolled student. The id may be missing when the
/// referenced student no longer exists but the name is worth keeping;
/// deleting a student never cleans these up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudenteRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studente_id: Option<ObjectId>,
    pub nome: String,
}

/// Point-in-time copy of a module's descriptive fields, embedded into a
/// student's exam when the exam is recorded. Immutable once written: later
/// changes to the module must not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuloSnapshot {
    pub codice: String,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ore: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descrizione: Option<String>,
}
