use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::CalouroApi;
use crate::error::ApiError;
use crate::models::{FilterOptions, OptionDimension};

/// Call lists offered when the backend cannot tell us which exist.
pub fn fallback_call_numbers() -> Vec<u32> {
    (1..=10).collect()
}

/// Fetches every option list for a city. Failures never block the filter
/// bar: text dimensions fall back to empty lists, call numbers to `1..=10`.
pub async fn fetch_filter_options(api: &dyn CalouroApi, city: &str) -> FilterOptions {
    let (courses, universities, units, call_numbers) = tokio::join!(
        api.fetch_text_options(OptionDimension::Courses, city),
        api.fetch_text_options(OptionDimension::Universities, city),
        api.fetch_text_options(OptionDimension::Units, city),
        api.fetch_call_numbers(city),
    );

    let call_numbers = match call_numbers {
        Ok(values) if !values.is_empty() => values,
        Ok(_) => fallback_call_numbers(),
        Err(err) => {
            warn!(city, error = %err, "call numbers unavailable, using fallback");
            fallback_call_numbers()
        }
    };

    FilterOptions {
        courses: or_empty(city, OptionDimension::Courses, courses),
        universities: or_empty(city, OptionDimension::Universities, universities),
        units: or_empty(city, OptionDimension::Units, units),
        call_numbers,
    }
}

fn or_empty(
    city: &str,
    dimension: OptionDimension,
    result: Result<Vec<String>, ApiError>,
) -> Vec<String> {
    result.unwrap_or_else(|err| {
        warn!(city, dimension = dimension.path(), error = %err, "filter options unavailable");
        Vec::new()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(FilterOptions),
    /// A newer load replaced this one; its result must be ignored.
    Superseded,
}

/// Handle to one in-flight options load.
pub struct PendingOptions {
    city: String,
    cancel: CancellationToken,
    task: JoinHandle<Option<FilterOptions>>,
}

impl PendingOptions {
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Resolves to `Superseded` once a newer load has started, even when
    /// this one already finished fetching.
    pub async fn outcome(self) -> LoadOutcome {
        let fetched = match self.task.await {
            Ok(fetched) => fetched,
            Err(err) if err.is_cancelled() => None,
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        };

        match fetched {
            Some(options) if !self.cancel.is_cancelled() => LoadOutcome::Loaded(options),
            _ => {
                debug!(city = %self.city, "options load superseded");
                LoadOutcome::Superseded
            }
        }
    }
}

/// Loads filter options for the active city, keeping at most one load in
/// flight. Starting a new load cancels the previous one.
pub struct FilterOptionsLoader {
    api: Arc<dyn CalouroApi>,
    in_flight: Option<CancellationToken>,
}

impl FilterOptionsLoader {
    pub fn new(api: Arc<dyn CalouroApi>) -> Self {
        Self {
            api,
            in_flight: None,
        }
    }

    pub fn load(&mut self, city: &str) -> PendingOptions {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.in_flight.replace(cancel.clone()) {
            previous.cancel();
        }

        let api = Arc::clone(&self.api);
        let owned_city = city.to_string();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => None,
                options = fetch_filter_options(api.as_ref(), &owned_city) => Some(options),
            }
        });

        PendingOptions {
            city: city.to_string(),
            cancel,
            task,
        }
    }
}

impl Drop for FilterOptionsLoader {
    fn drop(&mut self) {
        if let Some(cancel) = self.in_flight.take() {
            cancel.cancel();
        }
    }
}
