// src/config.rs
use std::net::SocketAddr;

use serde::Deserialize;
use tracing::warn;

use crate::engine::EngineConfig;
use crate::error::AppError;
use crate::payroll::EventCodes;

pub const ENV_PREFIX: &str = "PONTO_";

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrency() -> usize {
    8
}

/// Settings read from `PONTO_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend_url: String,
    #[serde(default)]
    pub backend_token: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,

    // Ledger codes of the payroll events
    #[serde(default)]
    pub event_code_overtime: Option<String>,
    #[serde(default)]
    pub event_code_overtime_100: Option<String>,
    #[serde(default)]
    pub event_code_night: Option<String>,
    #[serde(default)]
    pub event_code_absence: Option<String>,
    #[serde(default)]
    pub event_code_dsr: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .map_err(config_error)
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, AppConfig>(vars)
            .map_err(config_error)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        self.bind_addr
            .parse()
            .map_err(|e| AppError::Config(format!("{}BIND_ADDR '{}': {}", ENV_PREFIX, self.bind_addr, e)))
    }

    /// Both paths when TLS is configured. A lone cert or key is ignored with
    /// a warning.
    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        match (self.cert_path.as_deref(), self.key_path.as_deref()) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => {
                warn!("Only one of CERT_PATH / KEY_PATH is set, serving plain HTTP");
                None
            }
        }
    }

    pub fn event_codes(&self) -> EventCodes {
        let defaults = EventCodes::default();
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);
        EventCodes {
            overtime: pick(&self.event_code_overtime, defaults.overtime),
            overtime100: pick(&self.event_code_overtime_100, defaults.overtime100),
            night_differential: pick(&self.event_code_night, defaults.night_differential),
            absence: pick(&self.event_code_absence, defaults.absence),
            dsr_on_overtime: pick(&self.event_code_dsr, defaults.dsr_on_overtime),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            page_size: self.page_size.max(1),
            max_concurrency: self.max_concurrency.max(1),
            event_codes: self.event_codes(),
        }
    }
}

fn config_error(e: envy::Error) -> AppError {
    match e {
        envy::Error::MissingValue(field) => {
            AppError::MissingEnvVar(format!("{}{}", ENV_PREFIX, field.to_uppercase()))
        }
        other => AppError::Config(other.to_string()),
    }
}
