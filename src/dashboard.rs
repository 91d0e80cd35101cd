//! The calouros dashboard session.
//!
//! Data flows one way: the roster and the persisted records feed the view
//! model builder, the filter controller narrows the rows and pages them, and
//! favorite/status changes go through the mutation coordinator, which writes
//! back into the shared metadata store the next build reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{CalouroApi, RosterQuery};
use crate::error::DashboardError;
use crate::export::{export_file_name, export_rows, write_export, ExportFormat};
use crate::filter::{FilterChip, FilterController, FilterState, FilterValue};
use crate::metadata::{MetadataStore, SharedMetadata};
use crate::models::{CalouroStatus, HouseType, PlanTier, RosterEntry};
use crate::mutation::{MutationCoordinator, Notice};
use crate::options::{FilterOptionsLoader, PendingOptions};
use crate::pagination::{PageControls, DEFAULT_PAGE_SIZE};
use crate::report::build_report;
use crate::saved::SavedFilterManager;
use crate::view::{auto_filter_tag, build_view_models, StudentId, StudentViewModel};

/// Who is looking at the dashboard. Passed in explicitly rather than read
/// from ambient session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HouseProfile {
    pub city: Option<String>,
    pub house_type: HouseType,
    pub plan: PlanTier,
}

/// What the content area should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentState {
    /// Nothing can load until the house picks a city.
    CityNotConfigured,
    /// Loading failed and there is nothing cached to fall back on.
    Unavailable { message: String },
    /// Rows are available; `stale` carries the last refresh error, if any.
    Ready { stale: Option<String> },
}

/// One visible page of the filtered list.
#[derive(Debug, Clone)]
pub struct PageView {
    pub rows: Vec<StudentViewModel>,
    pub controls: PageControls,
    pub chips: Vec<FilterChip>,
}

pub struct Dashboard {
    api: Arc<dyn CalouroApi>,
    house: HouseProfile,
    roster: Vec<RosterEntry>,
    store: SharedMetadata,
    controller: FilterController,
    coordinator: MutationCoordinator,
    saved: SavedFilterManager,
    options: FilterOptionsLoader,
    loaded: bool,
    last_error: Option<String>,
}

impl Dashboard {
    pub fn new(
        api: Arc<dyn CalouroApi>,
        house: HouseProfile,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        let store = SharedMetadata::new(MetadataStore::new());
        Self {
            coordinator: MutationCoordinator::new(Arc::clone(&api), store.clone(), notices),
            saved: SavedFilterManager::new(Arc::clone(&api)),
            options: FilterOptionsLoader::new(Arc::clone(&api)),
            api,
            house,
            roster: Vec::new(),
            store,
            controller: FilterController::new(DEFAULT_PAGE_SIZE),
            loaded: false,
            last_error: None,
        }
    }

    pub fn house(&self) -> &HouseProfile {
        &self.house
    }

    pub fn city(&self) -> Result<&str, DashboardError> {
        self.house
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .ok_or(DashboardError::CityNotConfigured)
    }

    /// Refetches the roster and the persisted records. On failure the last
    /// good data stays in place.
    pub async fn refresh(&mut self) -> Result<(), DashboardError> {
        let query = RosterQuery {
            city: self.city()?.to_string(),
            plan: self.house.plan,
        };

        let (roster, selected) =
            tokio::join!(self.api.fetch_roster(&query), self.api.fetch_selected());

        let fetched = roster
            .map_err(DashboardError::fetch("roster"))
            .and_then(|roster| {
                selected
                    .map(|selected| (roster, selected))
                    .map_err(DashboardError::fetch("selected calouros"))
            });

        match fetched {
            Ok((roster, selected)) => {
                info!(
                    city = %query.city,
                    roster = roster.len(),
                    selected = selected.len(),
                    "dashboard refreshed"
                );
                self.roster = roster;
                self.store.lock().hydrate(&selected);
                self.loaded = true;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, cached = self.loaded, "dashboard refresh failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn content_state(&self) -> ContentState {
        if self.city().is_err() {
            return ContentState::CityNotConfigured;
        }
        match (&self.last_error, self.loaded) {
            (Some(message), false) => ContentState::Unavailable {
                message: message.clone(),
            },
            (stale, _) => ContentState::Ready {
                stale: stale.clone(),
            },
        }
    }

    /// Every row the house can see, before user filters.
    pub fn view_models(&self) -> Vec<StudentViewModel> {
        build_view_models(&self.roster, &self.store.lock(), self.house.house_type)
    }

    /// Rows passing the current filters, across all pages.
    pub fn filtered(&mut self) -> Vec<StudentViewModel> {
        let rows = self.view_models();
        self.controller.apply(&rows)
    }

    pub fn page(&mut self) -> PageView {
        let filtered = self.filtered();
        let page = *self.controller.page();
        PageView {
            rows: page.slice(&filtered).to_vec(),
            controls: page.controls(),
            chips: self.chips(),
        }
    }

    pub fn chips(&self) -> Vec<FilterChip> {
        self.controller.chips(auto_filter_tag(self.house.house_type))
    }

    pub fn filters(&self) -> &FilterState {
        self.controller.filters()
    }

    pub fn toggle_filter(&mut self, value: FilterValue) {
        self.controller.toggle(value);
    }

    pub fn remove_filter(&mut self, value: &FilterValue) {
        self.controller.remove(value);
    }

    pub fn clear_filters(&mut self) {
        self.controller.clear();
    }

    pub fn set_query(&mut self, q: impl Into<String>) {
        self.controller.set_query(q);
    }

    pub fn replace_filters(&mut self, filters: FilterState) {
        self.controller.replace(filters);
    }

    pub fn go_to_page(&mut self, page: u32) {
        self.filtered();
        self.controller.go_to_page(page);
    }

    pub fn set_items_per_page(&mut self, items_per_page: u32) {
        self.controller.set_items_per_page(items_per_page);
    }

    pub fn metadata(&self) -> &SharedMetadata {
        &self.store
    }

    pub fn toggle_favorite(&self, id: &StudentId, favorited: bool) -> Option<JoinHandle<()>> {
        self.coordinator.toggle_favorite(&self.view_models(), id, favorited)
    }

    pub fn change_status(&self, id: &StudentId, status: CalouroStatus) -> Option<JoinHandle<()>> {
        self.coordinator.change_status(&self.view_models(), id, status)
    }

    pub fn saved_filters(&self) -> &SavedFilterManager {
        &self.saved
    }

    /// Replaces the live selection with a saved one.
    pub async fn apply_saved_filter(&mut self, id: u64) -> Result<(), DashboardError> {
        let filters = self.saved.load(id).await?;
        self.controller.replace(filters);
        Ok(())
    }

    /// Starts loading the filter bar options for the house's city,
    /// superseding any load still running.
    pub fn load_options(&mut self) -> Result<PendingOptions, DashboardError> {
        let city = self.city()?.to_string();
        Ok(self.options.load(&city))
    }

    /// Writes every filtered row (not just the current page) into `dir`.
    pub fn export(
        &mut self,
        dir: &Path,
        format: ExportFormat,
        date: NaiveDate,
    ) -> Result<PathBuf, DashboardError> {
        let city = self.city()?.to_string();
        let rows = export_rows(&self.filtered());
        let path = dir.join(export_file_name(&city, date, format));
        write_export(&rows, &path, format)?;
        info!(path = %path.display(), rows = rows.len(), "export written");
        Ok(path)
    }

    pub fn report(&mut self, date: NaiveDate) -> Result<String, DashboardError> {
        let city = self.city()?.to_string();
        Ok(build_report(&city, date, &self.filtered()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::FixtureApi;
    use crate::metadata::StudentMeta;
    use crate::models::Gender;
    use crate::mutation::NoticeLevel;
    use crate::options::LoadOutcome;
    use crate::view::tests::entry;

    fn ana() -> RosterEntry {
        RosterEntry {
            university: String::new(),
            ..entry("Ana Silva", "Medicina", 1, Gender::Female)
        }
    }

    fn house(house_type: HouseType) -> HouseProfile {
        HouseProfile {
            city: Some("campinas".to_string()),
            house_type,
            plan: PlanTier::Premium,
        }
    }

    fn dashboard(
        api: FixtureApi,
        house_type: HouseType,
    ) -> (Dashboard, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Dashboard::new(Arc::new(api), house(house_type), tx), rx)
    }

    #[tokio::test]
    async fn favoriting_a_fresh_row_end_to_end() {
        let (mut dash, mut notices) =
            dashboard(FixtureApi::new(vec![ana()]).with_next_id(42), HouseType::Feminina);
        dash.refresh().await.unwrap();

        let rows = dash.view_models();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_favorited);
        assert_eq!(rows[0].status, CalouroStatus::Pending);
        assert_eq!(rows[0].id, StudentId::Ephemeral(ana().key()));

        dash.toggle_favorite(&rows[0].id, true)
            .expect("create call expected")
            .await
            .unwrap();

        assert_eq!(
            dash.metadata().get(&ana().key()),
            StudentMeta {
                is_favorited: true,
                status: CalouroStatus::Pending,
                db_id: Some(42),
            }
        );
        assert_eq!(dash.view_models()[0].id, StudentId::Persisted(42));
        assert_eq!(notices.try_recv().map(|n| n.level), Ok(NoticeLevel::Success));

        // The created record survives a full refresh.
        dash.refresh().await.unwrap();
        assert_eq!(dash.view_models()[0].id, StudentId::Persisted(42));
        assert!(dash.view_models()[0].is_favorited);
    }

    #[tokio::test]
    async fn gender_auto_filter_ignores_user_filters() {
        let bruno = RosterEntry {
            name: "Bruno Lima".to_string(),
            genero: Gender::Male,
            ..ana()
        };
        let (mut dash, _notices) =
            dashboard(FixtureApi::new(vec![ana(), bruno]), HouseType::Feminina);
        dash.refresh().await.unwrap();

        assert_eq!(dash.view_models().len(), 1);
        dash.toggle_filter(FilterValue::Course("Medicina".to_string()));
        let page = dash.page();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].name, "Ana Silva");
        assert_eq!(page.chips[0].value, None);
    }

    #[tokio::test]
    async fn filter_changes_return_to_first_page() {
        let (mut dash, _notices) = dashboard(FixtureApi::demo(), HouseType::Mista);
        dash.refresh().await.unwrap();
        dash.set_items_per_page(2);
        dash.go_to_page(3);
        assert_eq!(dash.page().controls.current_page, 3);

        dash.toggle_filter(FilterValue::CallNumber(1));
        assert_eq!(dash.page().controls.current_page, 1);

        dash.go_to_page(2);
        dash.clear_filters();
        assert_eq!(dash.page().controls.current_page, 1);
        assert!(dash.filters().is_empty());
    }

    #[tokio::test]
    async fn export_covers_every_filtered_row() {
        let (mut dash, _notices) = dashboard(FixtureApi::demo(), HouseType::Mista);
        dash.refresh().await.unwrap();
        dash.set_items_per_page(1);
        dash.toggle_filter(FilterValue::Course("Medicina".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let path = dash.export(dir.path(), ExportFormat::Csv, date).unwrap();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("calouros-campinas-2024-01-15.csv")
        );

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);

        let xlsx = dash.export(dir.path(), ExportFormat::Xlsx, date).unwrap();
        assert!(xlsx.ends_with("calouros-campinas-2024-01-15.xlsx"));
    }

    #[tokio::test]
    async fn missing_city_blocks_loading() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut dash = Dashboard::new(
            Arc::new(FixtureApi::demo()),
            HouseProfile {
                city: Some("  ".to_string()),
                ..HouseProfile::default()
            },
            tx,
        );

        assert!(matches!(
            dash.refresh().await,
            Err(DashboardError::CityNotConfigured)
        ));
        assert_eq!(dash.content_state(), ContentState::CityNotConfigured);
        assert!(dash.load_options().is_err());
    }

    #[tokio::test]
    async fn failed_first_load_is_unavailable() {
        let (mut dash, _notices) = dashboard(FixtureApi::demo().failing_reads(), HouseType::Mista);
        assert!(dash.refresh().await.is_err());
        assert!(matches!(
            dash.content_state(),
            ContentState::Unavailable { .. }
        ));
        assert!(dash.view_models().is_empty());
    }

    #[tokio::test]
    async fn saved_filter_replaces_live_selection() {
        let (mut dash, _notices) = dashboard(FixtureApi::demo(), HouseType::Mista);
        dash.refresh().await.unwrap();

        let mut stored = FilterState::default();
        stored.call_numbers.insert(2);
        let saved = dash
            .saved_filters()
            .save("Segunda chamada", &stored, false)
            .await
            .unwrap();

        dash.toggle_filter(FilterValue::Course("Direito".to_string()));
        dash.set_items_per_page(1);
        dash.go_to_page(1);
        dash.apply_saved_filter(saved.id).await.unwrap();

        assert_eq!(dash.filters(), &stored);
        let page = dash.page();
        assert_eq!(page.controls.current_page, 1);
        assert_eq!(page.controls.total_items, 2);
    }

    #[tokio::test]
    async fn options_load_for_house_city() {
        let (mut dash, _notices) = dashboard(FixtureApi::demo(), HouseType::Mista);
        let pending = dash.load_options().unwrap();
        assert_eq!(pending.city(), "campinas");
        match pending.outcome().await {
            LoadOutcome::Loaded(options) => assert_eq!(options.call_numbers, vec![1, 2, 3]),
            LoadOutcome::Superseded => panic!("only load must complete"),
        }
    }
}
