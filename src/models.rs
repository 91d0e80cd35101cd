use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::filter::FilterState;
use crate::key::CompositeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "masculino", alias = "M", alias = "m")]
    Male,
    #[serde(alias = "feminino", alias = "F", alias = "f")]
    Female,
    #[serde(other)]
    Other,
}

impl Gender {
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Masculino",
            Gender::Female => "Feminino",
            Gender::Other => "Outro",
        }
    }
}

/// Workflow status a house tracks per calouro. Declaration order is the
/// order used wherever statuses are listed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CalouroStatus {
    #[default]
    Pending,
    Contacted,
    Interested,
    Approved,
    Rejected,
}

impl CalouroStatus {
    pub const ALL: [CalouroStatus; 5] = [
        CalouroStatus::Pending,
        CalouroStatus::Contacted,
        CalouroStatus::Interested,
        CalouroStatus::Approved,
        CalouroStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalouroStatus::Pending => "pending",
            CalouroStatus::Contacted => "contacted",
            CalouroStatus::Interested => "interested",
            CalouroStatus::Approved => "approved",
            CalouroStatus::Rejected => "rejected",
        }
    }

    /// Label shown to house members.
    pub fn label(self) -> &'static str {
        match self {
            CalouroStatus::Pending => "Pendente",
            CalouroStatus::Contacted => "Contatado",
            CalouroStatus::Interested => "Interessado",
            CalouroStatus::Approved => "Aprovado",
            CalouroStatus::Rejected => "Rejeitado",
        }
    }
}

impl fmt::Display for CalouroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for CalouroStatus {
    type Err = UnknownStatus;

    /// Accepts either the wire value or the display label, ignoring case
    /// and accents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = crate::key::normalize(s);
        CalouroStatus::ALL
            .into_iter()
            .find(|status| {
                status.as_str() == wanted || crate::key::normalize(status.label()) == wanted
            })
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Gender policy of the house, which drives the automatic roster filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HouseType {
    Masculina,
    Feminina,
    #[default]
    Mista,
}

impl HouseType {
    /// Unknown or missing values fall back to a mixed house.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(crate::key::normalize).as_deref() {
            Some("masculina") | Some("masculino") | Some("male") => HouseType::Masculina,
            Some("feminina") | Some("feminino") | Some("female") => HouseType::Feminina,
            _ => HouseType::Mista,
        }
    }

    /// Gender this house is restricted to, if any.
    pub fn required_gender(self) -> Option<Gender> {
        match self {
            HouseType::Masculina => Some(Gender::Male),
            HouseType::Feminina => Some(Gender::Female),
            HouseType::Mista => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanTier {
    #[default]
    Free,
    Premium,
}

impl PlanTier {
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(crate::key::normalize).as_deref() {
            Some("premium") | Some("pro") => PlanTier::Premium,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
        }
    }
}

/// One row of an approval list as published for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub course: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub university: String,
    #[serde(default, alias = "unit", deserialize_with = "null_as_empty")]
    pub campus: String,
    #[serde(alias = "call_number")]
    pub chamada: u32,
    #[serde(alias = "gender")]
    pub genero: Gender,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default)]
    pub remanejado: bool,
}

impl RosterEntry {
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(&self.name, &self.course, &self.university, &self.campus)
    }
}

/// A roster row the house has acted upon, persisted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalouroRecord {
    pub id: u64,
    #[serde(flatten)]
    pub entry: RosterEntry,
    #[serde(default)]
    pub favourite: bool,
    #[serde(default)]
    pub status: CalouroStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCalouro {
    #[serde(flatten)]
    pub entry: RosterEntry,
    pub favourite: bool,
    pub status: CalouroStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCalouro {
    pub calouro_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectedCalouros {
    #[serde(default)]
    pub calouros: Vec<CalouroRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterPage {
    #[serde(alias = "data")]
    pub rows: Vec<RosterEntry>,
    pub pagination: ServerPagination,
}

/// Dimensions the backend publishes distinct values for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionDimension {
    Courses,
    Universities,
    Units,
    CallNumbers,
}

impl OptionDimension {
    pub fn path(self) -> &'static str {
        match self {
            OptionDimension::Courses => "courses",
            OptionDimension::Universities => "universities",
            OptionDimension::Units => "units",
            OptionDimension::CallNumbers => "chamadas",
        }
    }
}

/// Distinct values offered in the filter bar for one city.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub courses: Vec<String>,
    pub universities: Vec<String>,
    pub units: Vec<String>,
    pub call_numbers: Vec<u32>,
}

pub const SAVED_FILTER_TYPE: &str = "calouros";

fn default_filter_type() -> String {
    SAVED_FILTER_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_filter_type")]
    pub filter_type: String,
    #[serde(default)]
    pub filters: FilterState,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSavedFilter {
    pub name: String,
    pub filter_type: String,
    pub filters: FilterState,
    pub is_shared: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedFilterPatch {
    pub name: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_entry_accepts_source_field_names_and_nulls() {
        let json = r#"{
            "name": "Ana Silva",
            "course": "Medicina",
            "university": null,
            "unit": "Central",
            "chamada": 1,
            "genero": "feminino",
            "city": "campinas"
        }"#;
        let entry: RosterEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.university, "");
        assert_eq!(entry.campus, "Central");
        assert_eq!(entry.genero, Gender::Female);
        assert!(!entry.remanejado);
    }

    #[test]
    fn unknown_gender_maps_to_other() {
        let gender: Gender = serde_json::from_str("\"nao-binario\"").unwrap();
        assert_eq!(gender, Gender::Other);
    }

    #[test]
    fn status_parses_wire_values_and_labels() {
        assert_eq!("approved".parse::<CalouroStatus>(), Ok(CalouroStatus::Approved));
        assert_eq!("Contatado".parse::<CalouroStatus>(), Ok(CalouroStatus::Contacted));
        assert!("archived".parse::<CalouroStatus>().is_err());
    }

    #[test]
    fn house_type_defaults_to_mixed() {
        assert_eq!(HouseType::parse_lenient(Some("Feminina")), HouseType::Feminina);
        assert_eq!(HouseType::parse_lenient(Some("república")), HouseType::Mista);
        assert_eq!(HouseType::parse_lenient(None), HouseType::Mista);
        assert_eq!(HouseType::Mista.required_gender(), None);
    }

    #[test]
    fn record_flattens_roster_fields() {
        let json = r#"{
            "id": 7,
            "name": "Bruno",
            "course": "Direito",
            "university": "USP",
            "campus": "Largo",
            "chamada": 2,
            "genero": "male",
            "city": "sao paulo",
            "remanejado": true,
            "favourite": true,
            "status": "interested"
        }"#;
        let record: CalouroRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 7);
        assert!(record.entry.remanejado);
        assert_eq!(record.status, CalouroStatus::Interested);
    }
}
