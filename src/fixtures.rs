use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;

use crate::api::{CalouroApi, RosterQuery};
use crate::error::ApiError;
use crate::key::normalize;
use crate::models::{
    CalouroRecord, CalouroStatus, Gender, NewCalouro, NewSavedFilter, OptionDimension, PlanTier,
    RosterEntry, RosterPage, SavedFilter, SavedFilterPatch, ServerPagination,
};

/// Write recorded by [`FixtureApi`], for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create { favourite: bool, status: CalouroStatus },
    UpdateFavorite { id: u64, favourite: bool },
    UpdateStatus { id: u64, status: CalouroStatus },
    SaveFilter { name: String },
    RenameFilter { id: u64, name: String },
    DeleteFilter { id: u64 },
}

#[derive(Debug, Default)]
struct FixtureState {
    records: Vec<CalouroRecord>,
    saved: Vec<SavedFilter>,
    next_id: u64,
    next_filter_id: u64,
    calls: Vec<Operation>,
}

/// In-memory stand-in for the backend, serving a fixed roster.
#[derive(Debug)]
pub struct FixtureApi {
    roster: Vec<RosterEntry>,
    page_size: usize,
    fail_writes: bool,
    fail_reads: bool,
    fail_options: bool,
    options_delay: Option<Duration>,
    state: Mutex<FixtureState>,
}

impl FixtureApi {
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            roster,
            page_size: 50,
            fail_writes: false,
            fail_reads: false,
            fail_options: false,
            options_delay: None,
            state: Mutex::new(FixtureState {
                next_id: 1,
                next_filter_id: 1,
                ..FixtureState::default()
            }),
        }
    }

    /// Loads a roster from a CSV file with a header row matching the roster
    /// field names (`name,course,university,campus,chamada,genero,city,remanejado`).
    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open fixture roster {}", path.display()))?;
        let mut roster = Vec::new();

        for (line, result) in reader.deserialize::<RosterEntry>().enumerate() {
            let entry = result.with_context(|| format!("invalid roster row {}", line + 2))?;
            roster.push(entry);
        }

        Ok(Self::new(roster))
    }

    /// Small built-in roster for trying the CLI without a backend.
    pub fn demo() -> Self {
        let rows = [
            ("Ana Silva", "Medicina", "UNICAMP", "Central", 1, Gender::Female),
            ("Beatriz Souza", "Engenharia Elétrica", "UNICAMP", "Central", 1, Gender::Female),
            ("Bruno Lima", "Direito", "PUC-Campinas", "Campus I", 1, Gender::Male),
            ("Carla Dias", "Medicina", "PUC-Campinas", "Campus II", 2, Gender::Female),
            ("Davi Rocha", "Ciência da Computação", "UNICAMP", "Central", 2, Gender::Male),
            ("Elisa Martins", "Arquitetura", "UNICAMP", "Central", 3, Gender::Female),
            ("Felipe Nunes", "Engenharia Elétrica", "UNICAMP", "Limeira", 3, Gender::Male),
        ];

        Self::new(
            rows.into_iter()
                .map(|(name, course, university, campus, chamada, genero)| RosterEntry {
                    name: name.to_string(),
                    course: course.to_string(),
                    university: university.to_string(),
                    campus: campus.to_string(),
                    chamada,
                    genero,
                    city: "campinas".to_string(),
                    remanejado: chamada > 1,
                })
                .collect(),
        )
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Id handed to the next created calouro.
    pub fn with_next_id(self, id: u64) -> Self {
        self.state().next_id = id;
        self
    }

    pub fn with_records(self, records: Vec<CalouroRecord>) -> Self {
        self.state().records = records;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_options(mut self) -> Self {
        self.fail_options = true;
        self
    }

    pub fn with_options_delay(mut self, delay: Duration) -> Self {
        self.options_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_write(&self, what: &str) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Simulated(what.to_string()));
        }
        Ok(())
    }

    fn check_read(&self, what: &str) -> Result<(), ApiError> {
        if self.fail_reads {
            return Err(ApiError::Simulated(what.to_string()));
        }
        Ok(())
    }

    async fn options_gate(&self) -> Result<(), ApiError> {
        if let Some(delay) = self.options_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_options {
            return Err(ApiError::Simulated("filter options".to_string()));
        }
        Ok(())
    }

    fn rows_for_city<'a>(&'a self, city: &str) -> impl Iterator<Item = &'a RosterEntry> {
        let city = normalize(city);
        self.roster
            .iter()
            .filter(move |entry| normalize(&entry.city) == city)
    }
}

fn not_found(what: &str, id: u64) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("{what} {id} not found"),
    }
}

#[async_trait]
impl CalouroApi for FixtureApi {
    async fn fetch_roster_page(
        &self,
        query: &RosterQuery,
        page: u32,
    ) -> Result<RosterPage, ApiError> {
        self.check_read("roster")?;

        // Free plans only see the first call list.
        let visible: Vec<RosterEntry> = self
            .rows_for_city(&query.city)
            .filter(|entry| query.plan == PlanTier::Premium || entry.chamada == 1)
            .cloned()
            .collect();

        let total_items = visible.len();
        let total_pages = total_items.div_ceil(self.page_size).max(1);
        let current = (page.max(1) as usize).min(total_pages);
        let rows = visible
            .into_iter()
            .skip((current - 1) * self.page_size)
            .take(self.page_size)
            .collect();

        Ok(RosterPage {
            rows,
            pagination: ServerPagination {
                current_page: current as u32,
                total_pages: total_pages as u32,
                total_items: total_items as u64,
                limit: self.page_size as u32,
            },
        })
    }

    async fn fetch_selected(&self) -> Result<Vec<CalouroRecord>, ApiError> {
        self.check_read("selected calouros")?;
        Ok(self.state().records.clone())
    }

    async fn create_calouro(&self, calouro: &NewCalouro) -> Result<u64, ApiError> {
        self.check_write("create calouro")?;
        let mut state = self.state();
        let id = state.next_id;
        state.next_id += 1;
        state.records.push(CalouroRecord {
            id,
            entry: calouro.entry.clone(),
            favourite: calouro.favourite,
            status: calouro.status,
        });
        state.calls.push(Operation::Create {
            favourite: calouro.favourite,
            status: calouro.status,
        });
        Ok(id)
    }

    async fn update_favorite(&self, id: u64, favourite: bool) -> Result<(), ApiError> {
        self.check_write("update favorite")?;
        let mut state = self.state();
        let record = state
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found("calouro", id))?;
        record.favourite = favourite;
        state.calls.push(Operation::UpdateFavorite { id, favourite });
        Ok(())
    }

    async fn update_status(&self, id: u64, status: CalouroStatus) -> Result<(), ApiError> {
        self.check_write("update status")?;
        let mut state = self.state();
        let record = state
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| not_found("calouro", id))?;
        record.status = status;
        state.calls.push(Operation::UpdateStatus { id, status });
        Ok(())
    }

    async fn fetch_text_options(
        &self,
        dimension: OptionDimension,
        city: &str,
    ) -> Result<Vec<String>, ApiError> {
        self.options_gate().await?;
        let values: BTreeSet<String> = self
            .rows_for_city(city)
            .filter_map(|entry| match dimension {
                OptionDimension::Courses => Some(entry.course.clone()),
                OptionDimension::Universities => Some(entry.university.clone()),
                OptionDimension::Units => Some(entry.campus.clone()),
                OptionDimension::CallNumbers => None,
            })
            .filter(|value| !value.is_empty())
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn fetch_call_numbers(&self, city: &str) -> Result<Vec<u32>, ApiError> {
        self.options_gate().await?;
        let values: BTreeSet<u32> = self.rows_for_city(city).map(|entry| entry.chamada).collect();
        Ok(values.into_iter().collect())
    }

    async fn list_saved_filters(&self) -> Result<Vec<SavedFilter>, ApiError> {
        self.check_read("saved filters")?;
        Ok(self.state().saved.clone())
    }

    async fn get_saved_filter(&self, id: u64) -> Result<SavedFilter, ApiError> {
        self.check_read("saved filter")?;
        self.state()
            .saved
            .iter()
            .find(|saved| saved.id == id)
            .cloned()
            .ok_or_else(|| not_found("saved filter", id))
    }

    async fn create_saved_filter(&self, filter: &NewSavedFilter) -> Result<SavedFilter, ApiError> {
        self.check_write("save filter")?;
        let mut state = self.state();
        let saved = SavedFilter {
            id: state.next_filter_id,
            name: filter.name.clone(),
            filter_type: filter.filter_type.clone(),
            filters: filter.filters.clone(),
            is_shared: filter.is_shared,
            usage_count: 0,
            created_at: Utc::now(),
        };
        state.next_filter_id += 1;
        state.saved.push(saved.clone());
        state.calls.push(Operation::SaveFilter {
            name: filter.name.clone(),
        });
        Ok(saved)
    }

    async fn update_saved_filter(
        &self,
        id: u64,
        patch: &SavedFilterPatch,
    ) -> Result<SavedFilter, ApiError> {
        self.check_write("rename filter")?;
        let mut state = self.state();
        let saved = state
            .saved
            .iter_mut()
            .find(|saved| saved.id == id)
            .ok_or_else(|| not_found("saved filter", id))?;
        saved.name = patch.name.clone();
        let saved = saved.clone();
        state.calls.push(Operation::RenameFilter {
            id,
            name: patch.name.clone(),
        });
        Ok(saved)
    }

    async fn delete_saved_filter(&self, id: u64) -> Result<(), ApiError> {
        self.check_write("delete filter")?;
        let mut state = self.state();
        let before = state.saved.len();
        state.saved.retain(|saved| saved.id != id);
        if state.saved.len() == before {
            return Err(not_found("saved filter", id));
        }
        state.calls.push(Operation::DeleteFilter { id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn free_plan_only_sees_first_call() {
        let api = FixtureApi::demo().with_page_size(2);
        let free = RosterQuery {
            city: "Campinas".to_string(),
            plan: PlanTier::Free,
        };
        let premium = RosterQuery {
            plan: PlanTier::Premium,
            ..free.clone()
        };

        let free_rows = api.fetch_roster(&free).await.unwrap();
        assert!(free_rows.iter().all(|row| row.chamada == 1));
        assert_eq!(free_rows.len(), 3);
        assert_eq!(api.fetch_roster(&premium).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn unknown_city_has_empty_roster() {
        let api = FixtureApi::demo();
        let query = RosterQuery {
            city: "Recife".to_string(),
            plan: PlanTier::Premium,
        };
        assert!(api.fetch_roster(&query).await.unwrap().is_empty());
    }

    #[test]
    fn loads_roster_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,course,university,campus,chamada,genero,city,remanejado").unwrap();
        writeln!(file, "Ana Silva,Medicina,UNICAMP,Central,1,female,campinas,false").unwrap();
        writeln!(file, "Bruno Lima,Direito,,Campus I,2,masculino,campinas,true").unwrap();

        let api = FixtureApi::from_csv(file.path()).unwrap();
        assert_eq!(api.roster.len(), 2);
        assert_eq!(api.roster[1].genero, Gender::Male);
        assert_eq!(api.roster[1].university, "");
        assert!(api.roster[1].remanejado);
    }

    #[tokio::test]
    async fn options_are_distinct_and_sorted() {
        let api = FixtureApi::demo();
        let units = api
            .fetch_text_options(OptionDimension::Units, "campinas")
            .await
            .unwrap();
        assert_eq!(units, vec!["Campus I", "Campus II", "Central", "Limeira"]);
        assert_eq!(api.fetch_call_numbers("campinas").await.unwrap(), vec![1, 2, 3]);
    }
}
