use std::fmt;

use serde::Serialize;

use crate::key::CompositeKey;
use crate::metadata::MetadataStore;
use crate::models::{CalouroStatus, Gender, HouseType, RosterEntry};

/// Row identity: either the backend id, or the composite key for rows the
/// backend has not persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StudentId {
    Persisted(u64),
    Ephemeral(CompositeKey),
}

impl StudentId {
    pub fn is_persisted(&self) -> bool {
        matches!(self, StudentId::Persisted(_))
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentId::Persisted(id) => write!(f, "{id}"),
            StudentId::Ephemeral(key) => write!(f, "temp-{key}"),
        }
    }
}

/// Denormalized row rendered by the dashboard table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentViewModel {
    pub id: StudentId,
    pub key: CompositeKey,
    pub name: String,
    pub course: String,
    pub university: String,
    pub campus: String,
    pub chamada: u32,
    pub genero: Gender,
    pub city: String,
    pub remanejado: bool,
    pub is_favorited: bool,
    pub status: CalouroStatus,
    pub original: RosterEntry,
}

/// Keeps only the entries the house can receive. Mixed houses keep all.
pub fn gender_filter(entry: &RosterEntry, house: HouseType) -> bool {
    house
        .required_gender()
        .map_or(true, |gender| entry.genero == gender)
}

/// Joins the roster with recorded metadata, preserving roster order.
pub fn build_view_models(
    roster: &[RosterEntry],
    store: &MetadataStore,
    house: HouseType,
) -> Vec<StudentViewModel> {
    roster
        .iter()
        .filter(|entry| gender_filter(entry, house))
        .map(|entry| {
            let key = entry.key();
            let meta = store.get(&key);
            let id = match meta.db_id {
                Some(id) => StudentId::Persisted(id),
                None => StudentId::Ephemeral(key.clone()),
            };

            StudentViewModel {
                id,
                key,
                name: entry.name.clone(),
                course: entry.course.clone(),
                university: entry.university.clone(),
                campus: entry.campus.clone(),
                chamada: entry.chamada,
                genero: entry.genero,
                city: entry.city.clone(),
                remanejado: entry.remanejado,
                is_favorited: meta.is_favorited,
                status: meta.status,
                original: entry.clone(),
            }
        })
        .collect()
}

/// Informational tag describing the automatic gender filter, if one applies.
pub fn auto_filter_tag(house: HouseType) -> Option<&'static str> {
    match house {
        HouseType::Masculina => Some("Somente calouros (república masculina)"),
        HouseType::Feminina => Some("Somente calouras (república feminina)"),
        HouseType::Mista => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(name: &str, course: &str, chamada: u32, genero: Gender) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            course: course.to_string(),
            university: "UNICAMP".to_string(),
            campus: "Central".to_string(),
            chamada,
            genero,
            city: "campinas".to_string(),
            remanejado: false,
        }
    }

    #[test]
    fn fresh_rows_get_ephemeral_ids_and_default_metadata() {
        let roster = vec![entry("Ana Silva", "Medicina", 1, Gender::Female)];
        let rows = build_view_models(&roster, &MetadataStore::new(), HouseType::Feminina);

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(!row.is_favorited);
        assert_eq!(row.status, CalouroStatus::Pending);
        assert_eq!(row.id, StudentId::Ephemeral(roster[0].key()));
        assert!(row.id.to_string().starts_with("temp-"));
    }

    #[test]
    fn known_keys_get_persisted_ids() {
        let roster = vec![entry("Ana Silva", "Medicina", 1, Gender::Female)];
        let mut store = MetadataStore::new();
        store.set_db_id(&roster[0].key(), 42);
        store.set_favorite(&roster[0].key(), true);

        let rows = build_view_models(&roster, &store, HouseType::Mista);
        assert_eq!(rows[0].id, StudentId::Persisted(42));
        assert_eq!(rows[0].id.to_string(), "42");
        assert!(rows[0].is_favorited);
    }

    #[test]
    fn single_gender_houses_drop_other_genders() {
        let roster = vec![
            entry("Ana Silva", "Medicina", 1, Gender::Female),
            entry("Bruno Lima", "Medicina", 1, Gender::Male),
            entry("Cris Souza", "Direito", 2, Gender::Other),
        ];
        let store = MetadataStore::new();

        let fem = build_view_models(&roster, &store, HouseType::Feminina);
        assert_eq!(fem.len(), 1);
        assert_eq!(fem[0].name, "Ana Silva");

        let masc = build_view_models(&roster, &store, HouseType::Masculina);
        assert_eq!(masc.len(), 1);
        assert_eq!(masc[0].name, "Bruno Lima");

        assert_eq!(build_view_models(&roster, &store, HouseType::Mista).len(), 3);
    }

    #[test]
    fn ephemeral_ids_do_not_depend_on_position() {
        let a = entry("Ana Silva", "Medicina", 1, Gender::Female);
        let b = entry("Bia Costa", "Direito", 1, Gender::Female);
        let store = MetadataStore::new();

        let first = build_view_models(&[a.clone(), b.clone()], &store, HouseType::Mista);
        let reordered = build_view_models(&[b, a], &store, HouseType::Mista);
        assert_eq!(first[0].id, reordered[1].id);
    }

    #[test]
    fn tag_only_for_single_gender_houses() {
        assert!(auto_filter_tag(HouseType::Feminina).is_some());
        assert!(auto_filter_tag(HouseType::Mista).is_none());
    }
}
