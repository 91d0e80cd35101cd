use thiserror::Error;

use crate::export::ExportError;

/// Failures talking to the calouros backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout, or undecodable body.
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The client could not be set up (bad base URL or token).
    #[error("API client misconfigured: {0}")]
    Config(String),

    /// The fixture data source was told to fail this call.
    #[error("simulated failure: {0}")]
    Simulated(String),
}

/// Problems caught before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Selecione pelo menos um filtro antes de salvar.")]
    EmptyCriteria,

    #[error("Informe um nome para o filtro.")]
    EmptyName,

    #[error("no saved filter with id {0}")]
    UnknownFilter(u64),
}

#[derive(Debug, Error)]
pub enum DashboardError {
    /// The house has no city, so there is no roster to show.
    #[error("Configure a cidade da república para ver os calouros.")]
    CityNotConfigured,

    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl DashboardError {
    pub fn fetch(what: &'static str) -> impl FnOnce(ApiError) -> Self {
        move |source| DashboardError::Fetch { what, source }
    }
}
