//! Data sources for the dashboard.
//!
//! [`CalouroApi`] is the seam between the dashboard pipeline and whatever
//! serves rosters, persisted calouros and saved filters. [`HttpApi`] talks to
//! the real backend; [`crate::fixtures::FixtureApi`] serves an in-memory
//! roster for demos and tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::{
    CalouroRecord, CalouroStatus, CreatedCalouro, NewCalouro, NewSavedFilter, OptionDimension,
    PlanTier, RosterEntry, RosterPage, SavedFilter, SavedFilterPatch, SelectedCalouros,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const ROSTER_PAGE_LIMIT: u32 = 100;
/// Upper bound on the roster page walk, whatever the server reports.
pub const MAX_ROSTER_PAGES: u32 = 500;

/// Which roster to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterQuery {
    pub city: String,
    pub plan: PlanTier,
}

#[async_trait]
pub trait CalouroApi: Send + Sync {
    async fn fetch_roster_page(&self, query: &RosterQuery, page: u32)
        -> Result<RosterPage, ApiError>;

    async fn fetch_selected(&self) -> Result<Vec<CalouroRecord>, ApiError>;

    /// Persists a roster row and returns its new id.
    async fn create_calouro(&self, calouro: &NewCalouro) -> Result<u64, ApiError>;

    async fn update_favorite(&self, id: u64, favourite: bool) -> Result<(), ApiError>;

    async fn update_status(&self, id: u64, status: CalouroStatus) -> Result<(), ApiError>;

    async fn fetch_text_options(
        &self,
        dimension: OptionDimension,
        city: &str,
    ) -> Result<Vec<String>, ApiError>;

    async fn fetch_call_numbers(&self, city: &str) -> Result<Vec<u32>, ApiError>;

    async fn list_saved_filters(&self) -> Result<Vec<SavedFilter>, ApiError>;

    async fn get_saved_filter(&self, id: u64) -> Result<SavedFilter, ApiError>;

    async fn create_saved_filter(&self, filter: &NewSavedFilter) -> Result<SavedFilter, ApiError>;

    async fn update_saved_filter(
        &self,
        id: u64,
        patch: &SavedFilterPatch,
    ) -> Result<SavedFilter, ApiError>;

    async fn delete_saved_filter(&self, id: u64) -> Result<(), ApiError>;

    /// Walks every roster page for the query and concatenates the rows.
    async fn fetch_roster(&self, query: &RosterQuery) -> Result<Vec<RosterEntry>, ApiError> {
        let mut rows = Vec::new();

        for page in 1..=MAX_ROSTER_PAGES {
            let response = self.fetch_roster_page(query, page).await?;
            let exhausted = response.rows.is_empty() || page >= response.pagination.total_pages;
            rows.extend(response.rows);

            if exhausted {
                break;
            }
            if page == MAX_ROSTER_PAGES {
                warn!(city = %query.city, page, "roster page limit reached, stopping");
            }
        }

        debug!(city = %query.city, rows = rows.len(), "roster fetched");
        Ok(rows)
    }
}

/// Accepts both a bare JSON array and the `{ "data": [...] }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) => items,
            ListBody::Wrapped { data } => data,
        }
    }
}

#[derive(Serialize)]
struct FavouriteBody {
    favourite: bool,
}

#[derive(Serialize)]
struct StatusBody {
    status: CalouroStatus,
}

/// reqwest-backed client for the calouros REST backend.
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(
        base_url: &str,
        token: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = format!("Bearer {}", token.expose_secret());
            let mut value = header::HeaderValue::from_str(&value).map_err(|_| {
                ApiError::Config("API token contains invalid header characters".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|err| ApiError::Config(format!("invalid API base URL {base_url}: {err}")))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Config(format!("invalid API path {path}: {err}")))
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(ApiError::Status { status, message });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        Ok(Self::send(request).await?.json::<T>().await?)
    }
}

#[async_trait]
impl CalouroApi for HttpApi {
    async fn fetch_roster_page(
        &self,
        query: &RosterQuery,
        page: u32,
    ) -> Result<RosterPage, ApiError> {
        let params = [
            ("city", query.city.clone()),
            ("plan", query.plan.as_str().to_string()),
            ("page", page.to_string()),
            ("limit", ROSTER_PAGE_LIMIT.to_string()),
        ];
        let request = self.client.get(self.url("calouros/roster")?).query(&params);
        Self::send_json(request).await
    }

    async fn fetch_selected(&self) -> Result<Vec<CalouroRecord>, ApiError> {
        let request = self.client.get(self.url("calouros/selected")?);
        let body: SelectedCalouros = Self::send_json(request).await?;
        Ok(body.calouros)
    }

    async fn create_calouro(&self, calouro: &NewCalouro) -> Result<u64, ApiError> {
        let request = self.client.post(self.url("calouros")?).json(calouro);
        let created: CreatedCalouro = Self::send_json(request).await?;
        Ok(created.calouro_id)
    }

    async fn update_favorite(&self, id: u64, favourite: bool) -> Result<(), ApiError> {
        let url = self.url(&format!("calouros/{id}/favorite"))?;
        Self::send(self.client.put(url).json(&FavouriteBody { favourite })).await?;
        Ok(())
    }

    async fn update_status(&self, id: u64, status: CalouroStatus) -> Result<(), ApiError> {
        let url = self.url(&format!("calouros/{id}/status"))?;
        Self::send(self.client.put(url).json(&StatusBody { status })).await?;
        Ok(())
    }

    async fn fetch_text_options(
        &self,
        dimension: OptionDimension,
        city: &str,
    ) -> Result<Vec<String>, ApiError> {
        let url = self.url(&format!("filters/{}", dimension.path()))?;
        let body: ListBody<String> =
            Self::send_json(self.client.get(url).query(&[("city", city)])).await?;
        Ok(body.into_vec())
    }

    async fn fetch_call_numbers(&self, city: &str) -> Result<Vec<u32>, ApiError> {
        let url = self.url(&format!("filters/{}", OptionDimension::CallNumbers.path()))?;
        let body: ListBody<u32> =
            Self::send_json(self.client.get(url).query(&[("city", city)])).await?;
        Ok(body.into_vec())
    }

    async fn list_saved_filters(&self) -> Result<Vec<SavedFilter>, ApiError> {
        let body: ListBody<SavedFilter> =
            Self::send_json(self.client.get(self.url("saved-filters")?)).await?;
        Ok(body.into_vec())
    }

    async fn get_saved_filter(&self, id: u64) -> Result<SavedFilter, ApiError> {
        let url = self.url(&format!("saved-filters/{id}"))?;
        Self::send_json(self.client.get(url)).await
    }

    async fn create_saved_filter(&self, filter: &NewSavedFilter) -> Result<SavedFilter, ApiError> {
        let request = self.client.post(self.url("saved-filters")?).json(filter);
        Self::send_json(request).await
    }

    async fn update_saved_filter(
        &self,
        id: u64,
        patch: &SavedFilterPatch,
    ) -> Result<SavedFilter, ApiError> {
        let url = self.url(&format!("saved-filters/{id}"))?;
        Self::send_json(self.client.put(url).json(patch)).await
    }

    async fn delete_saved_filter(&self, id: u64) -> Result<(), ApiError> {
        let url = self.url(&format!("saved-filters/{id}"))?;
        Self::send(self.client.delete(url)).await?;
        Ok(())
    }
}
