use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::moduli::ModuloSnapshot;

/// The default threshold above which a grade counts as "high".
pub const SOGLIA_VOTI_ALTI: i32 = 24;

/// A student of the institute, with their enrolled modules and exam history
/// embedded in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Studente {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub nome: String,
    pub cognome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Codes of the modules the student is enrolled in.
    #[serde(rename = "moduliIscritti", default)]
    pub moduli_iscritti: Vec<String>,
    #[serde(default)]
    pub esami: Vec<EsameEmbedded>,
}

/// An exam taken by a student. Owned by the parent student document,
/// it has no identity or lifecycle of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsameEmbedded {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voto: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Snapshot of the module the exam was taken in, captured when the exam
    /// was recorded. Never synced with the live module afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulo: Option<ModuloSnapshot>,
}

impl Studente {
    pub const COLLECTION: &'static str = "studente";

    /// The arithmetic mean of the grades the student actually received,
    /// rounded to two decimals (half away from zero). Exams without a grade
    /// are skipped; `None` if no exam carries a grade.
    pub fn media_voti(&self) -> Option<f64> {
        let voti: Vec<i32> = self.esami.iter().filter_map(|esame| esame.voto).collect();
        if voti.is_empty() {
            return None;
        }

        let media = voti.iter().sum::<i32>() as f64 / voti.len() as f64;
        Some((media * 100.0).round() / 100.0)
    }

    /// All grades at or above the threshold, in exam order.
    /// A missing grade counts as 0 for the comparison.
    pub fn voti_alti(&self, soglia: i32) -> Vec<i32> {
        self.esami
            .iter()
            .map(|esame| esame.voto.unwrap_or(0))
            .filter(|voto| *voto >= soglia)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Studente, SOGLIA_VOTI_ALTI};

    fn studente_con_voti(voti: &[Option<i32>]) -> Studente {
        Studente {
            id: None,
            nome: "Anna".to_string(),
            cognome: "Rossi".to_string(),
            email: None,
            moduli_iscritti: Vec::new(),
            esami: voti
                .iter()
                .map(|voto| super::EsameEmbedded {
                    data: None,
                    voto: *voto,
                    note: None,
                    modulo: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_media_voti_senza_esami() {
        assert_eq!(studente_con_voti(&[]).media_voti(), None);
    }

    #[test]
    fn test_media_voti_senza_voti() {
        // Exams exist, but none of them carries a grade.
        assert_eq!(studente_con_voti(&[None, None]).media_voti(), None);
    }

    #[test]
    fn test_media_voti_ignora_voti_mancanti() {
        let studente = studente_con_voti(&[Some(28), Some(22), None]);
        assert_eq!(studente.media_voti(), Some(25.0));
    }

    #[test]
    fn test_media_voti_arrotonda_mezzo_lontano_da_zero() {
        // Mean is 24.125, which rounds up to 24.13 under half-away-from-zero.
        // Half-to-even would give 24.12 instead.
        let studente = studente_con_voti(&[
            Some(24),
            Some(24),
            Some(24),
            Some(24),
            Some(24),
            Some(24),
            Some(24),
            Some(25),
        ]);
        assert_eq!(studente.media_voti(), Some(24.13));
    }

    #[test]
    fn test_media_voti_arrotonda_al_centesimo() {
        // 85 / 3 = 28.333...
        let studente = studente_con_voti(&[Some(30), Some(27), Some(28)]);
        assert_eq!(studente.media_voti(), Some(28.33));
    }

    #[test]
    fn test_voti_alti_mantiene_ordine() {
        let studente = studente_con_voti(&[Some(28), Some(22), Some(30), Some(24)]);
        assert_eq!(studente.voti_alti(SOGLIA_VOTI_ALTI), vec![28, 30, 24]);
    }

    #[test]
    fn test_voti_alti_esclude_voti_mancanti() {
        let studente = studente_con_voti(&[Some(28), Some(22), None]);
        assert_eq!(studente.voti_alti(SOGLIA_VOTI_ALTI), vec![28]);
    }

    #[test]
    fn test_voti_alti_con_soglia_zero_include_voti_mancanti() {
        // A missing grade counts as 0, so it passes a threshold of 0.
        let studente = studente_con_voti(&[Some(28), None]);
        assert_eq!(studente.voti_alti(0), vec![28, 0]);
    }
}
