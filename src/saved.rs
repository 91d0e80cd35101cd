use std::sync::Arc;

use tracing::info;

use crate::api::CalouroApi;
use crate::error::{DashboardError, ValidationError};
use crate::filter::FilterState;
use crate::models::{NewSavedFilter, SavedFilter, SavedFilterPatch, SAVED_FILTER_TYPE};

/// Proof that the user was asked before deleting a saved filter.
#[derive(Debug)]
#[must_use = "a pending delete does nothing until confirmed"]
pub struct PendingDelete {
    filter: SavedFilter,
}

impl PendingDelete {
    pub fn filter(&self) -> &SavedFilter {
        &self.filter
    }

    pub fn prompt(&self) -> String {
        format!(
            "Excluir o filtro \"{}\"? Esta ação não pode ser desfeita.",
            self.filter.name
        )
    }
}

/// Server-backed named filter snapshots.
pub struct SavedFilterManager {
    api: Arc<dyn CalouroApi>,
}

impl SavedFilterManager {
    pub fn new(api: Arc<dyn CalouroApi>) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<SavedFilter>, DashboardError> {
        self.api
            .list_saved_filters()
            .await
            .map_err(DashboardError::fetch("saved filters"))
    }

    /// Saves the current selection under `name`. Blank names and empty
    /// selections are rejected before anything is sent.
    pub async fn save(
        &self,
        name: &str,
        filters: &FilterState,
        shared: bool,
    ) -> Result<SavedFilter, DashboardError> {
        let name = validate_name(name)?;
        if filters.is_empty() {
            return Err(ValidationError::EmptyCriteria.into());
        }

        let saved = self
            .api
            .create_saved_filter(&NewSavedFilter {
                name,
                filter_type: SAVED_FILTER_TYPE.to_string(),
                filters: filters.clone(),
                is_shared: shared,
            })
            .await
            .map_err(DashboardError::fetch("save filter"))?;

        info!(id = saved.id, name = %saved.name, "filter saved");
        Ok(saved)
    }

    pub async fn rename(&self, id: u64, name: &str) -> Result<SavedFilter, DashboardError> {
        let name = validate_name(name)?;
        self.api
            .update_saved_filter(id, &SavedFilterPatch { name })
            .await
            .map_err(DashboardError::fetch("rename filter"))
    }

    /// Looks the filter up so the caller can show what is about to go.
    pub async fn request_delete(&self, id: u64) -> Result<PendingDelete, DashboardError> {
        let filters = self.list().await?;
        let filter = filters
            .into_iter()
            .find(|filter| filter.id == id)
            .ok_or(ValidationError::UnknownFilter(id))?;
        Ok(PendingDelete { filter })
    }

    pub async fn confirm_delete(&self, pending: PendingDelete) -> Result<(), DashboardError> {
        let id = pending.filter.id;
        self.api
            .delete_saved_filter(id)
            .await
            .map_err(DashboardError::fetch("delete filter"))?;
        info!(id, "filter deleted");
        Ok(())
    }

    /// Fetches the stored selection. Dimensions missing from the payload
    /// come back empty.
    pub async fn load(&self, id: u64) -> Result<FilterState, DashboardError> {
        let saved = self
            .api
            .get_saved_filter(id)
            .await
            .map_err(DashboardError::fetch("saved filter"))?;
        Ok(saved.filters)
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}
