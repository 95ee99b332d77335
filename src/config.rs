//! Server configuration from command-line flags and environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::Parser;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::Credentials;
use crate::kaiten::KaitenConfig;
use crate::workflow::WorkflowConfig;

/// Columns used by `--demo` when none are given
const DEMO_QUEUE_COLUMN: u64 = 1;
const DEMO_ASSIGNED_COLUMN: u64 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("AUTH_USERNAME and AUTH_PASSWORD must be set together")]
    IncompleteCredentials,

    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),

    #[error("failed to set up Kaiten client: {0}")]
    Gateway(String),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "kaiten-inbox")]
#[command(about = "Routes incoming letters from a Kaiten queue to operators")]
#[command(version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Kaiten API base URL, e.g. https://company.kaiten.ru/api/latest
    #[arg(long, env = "KAITEN_BASE_URL")]
    pub kaiten_base_url: Option<String>,

    /// Kaiten API token
    #[arg(long, env = "KAITEN_TOKEN", hide_env_values = true)]
    pub kaiten_token: Option<String>,

    #[arg(long, env = "KAITEN_BOARD_ID", default_value_t = 0)]
    pub board_id: u64,

    /// Column holding incoming letters
    #[arg(long, env = "KAITEN_COLUMN_QUEUE_ID")]
    pub queue_column: Option<u64>,

    /// Column assigned letters are moved to
    #[arg(long, env = "KAITEN_COLUMN_ASSIGN_ID")]
    pub assigned_column: Option<u64>,

    /// Card property holding the incoming number
    #[arg(long, env = "KAITEN_PROPERTY_INCOMING_NO", default_value = "id_228499")]
    pub incoming_property: String,

    /// Timeout for each Kaiten request, in seconds
    #[arg(long, env = "KAITEN_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Folder with letter files, one subfolder per incoming number
    #[arg(long, env = "FILES_ROOT", default_value = "./samples")]
    pub files_root: PathBuf,

    /// Operator login; authentication is off when unset
    #[arg(long, env = "AUTH_USERNAME")]
    pub auth_username: Option<String>,

    #[arg(long, env = "AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Lifetime of an operator session, in hours
    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 8)]
    pub session_ttl_hours: i64,

    /// Allowed browser origins (repeat the flag or separate with commas)
    #[arg(
        long = "cors-origin",
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_values = ["http://localhost:3000", "http://127.0.0.1:3000"]
    )]
    pub cors_origins: Vec<String>,

    /// Serve an in-memory board with sample letters instead of Kaiten
    #[arg(long, env = "INBOX_DEMO")]
    pub demo: bool,
}

impl Config {
    pub fn workflow_config(&self) -> Result<WorkflowConfig, ConfigError> {
        let (queue_column, assigned_column) = if self.demo {
            (
                self.queue_column.unwrap_or(DEMO_QUEUE_COLUMN),
                self.assigned_column.unwrap_or(DEMO_ASSIGNED_COLUMN),
            )
        } else {
            (
                self.queue_column
                    .ok_or(ConfigError::Missing("KAITEN_COLUMN_QUEUE_ID"))?,
                self.assigned_column
                    .ok_or(ConfigError::Missing("KAITEN_COLUMN_ASSIGN_ID"))?,
            )
        };
        Ok(WorkflowConfig {
            queue_column,
            assigned_column,
        })
    }

    pub fn kaiten_config(&self) -> Result<KaitenConfig, ConfigError> {
        Ok(KaitenConfig {
            base_url: self
                .kaiten_base_url
                .clone()
                .ok_or(ConfigError::Missing("KAITEN_BASE_URL"))?,
            token: self
                .kaiten_token
                .clone()
                .ok_or(ConfigError::Missing("KAITEN_TOKEN"))?,
            board_id: self.board_id,
            incoming_property: self.incoming_property.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        match (&self.auth_username, &self.auth_password) {
            (Some(username), Some(password)) => Ok(Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::IncompleteCredentials),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn cors_layer(&self) -> Result<CorsLayer, ConfigError> {
        let origins = self
            .cors_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o.trim()).map_err(|_| ConfigError::InvalidOrigin(o.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any))
    }
}
