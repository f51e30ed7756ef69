//! Server configuration loaded from a TOML file.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! max_body_bytes = 10485760
//! request_timeout_secs = 120
//! log_format = "json"
//!
//! [scoring]
//! primary_model = "ada002"
//!
//! [scoring.limits]
//! call_timeout_ms = 20000
//! request_deadline_ms = 90000
//! ```
//!
//! Provider endpoints and keys are usually left out of the file and read
//! from the environment (see [`ScoringConfig::apply_env`]).

use std::path::Path;
use std::time::Duration;

use imgscore_scoring::ScoringConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,

    /// Largest accepted request body, image included.
    pub max_body_bytes: usize,

    /// Whole-request deadline. Must exceed the per-call provider timeout.
    pub request_timeout_secs: u64,

    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 120,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl AppConfig {
    /// Read `path`, or fall back to defaults when no path is given.
    /// Environment overrides are applied either way.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    AppError::Config(format!("failed to read {}: {err}", path.display()))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.scoring.apply_env();
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| AppError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.server.max_body_bytes == 0 {
            return Err(AppError::Config(
                "server.max_body_bytes must be positive".to_string(),
            ));
        }
        // The scorer has to give up before the HTTP layer does, or the client
        // gets a bare timeout instead of a degraded report.
        if self.server.request_timeout() <= self.scoring.limits.request_deadline() {
            return Err(AppError::Config(format!(
                "server.request_timeout_secs ({}s) must exceed scoring.limits.request_deadline_ms ({}ms)",
                self.server.request_timeout_secs, self.scoring.limits.request_deadline_ms
            )));
        }
        self.scoring
            .validate()
            .map_err(|err| AppError::Config(err.to_string()))
    }
}
