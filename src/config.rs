use std::env;
use std::time::Duration;

use anyhow::Context;
use secrecy::SecretString;
use tracing::info;

use crate::api::DEFAULT_TIMEOUT;
use crate::dashboard::HouseProfile;
use crate::models::{HouseType, PlanTier};

pub struct Config {
    pub api_url: Option<String>,
    pub api_token: Option<SecretString>,
    pub timeout: Duration,
    pub house: HouseProfile,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(var)
    }

    /// Builds the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let timeout = match var("CALOUROS_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("CALOUROS_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            None => {
                info!(
                    "CALOUROS_TIMEOUT_SECS not set, using default: {}s",
                    DEFAULT_TIMEOUT.as_secs()
                );
                DEFAULT_TIMEOUT
            }
        };

        Ok(Self {
            api_url: var("CALOUROS_API_URL"),
            api_token: var("CALOUROS_API_TOKEN").map(SecretString::from),
            timeout,
            house: HouseProfile {
                city: var("CALOUROS_CITY"),
                house_type: HouseType::parse_lenient(var("CALOUROS_HOUSE_TYPE").as_deref()),
                plan: PlanTier::parse_lenient(var("CALOUROS_PLAN").as_deref()),
            },
        })
    }

    pub fn require_api_url(&self) -> anyhow::Result<&str> {
        self.api_url.as_deref().context(
            "CALOUROS_API_URL must be set to the calouros backend (or pass --demo/--fixtures)",
        )
    }
}

/// Set and non-blank environment variable.
fn var(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
