//! Kaiten inbox - routes incoming letters from a queue column to operators

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod kaiten;
pub mod models;
pub mod workflow;

use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::{Config, ConfigError};
use crate::files::FileStore;
use crate::gateway::{MemoryGateway, QueueGateway};
use crate::kaiten::KaitenClient;
use crate::workflow::InboxWorkflow;

/// Application state shared across handlers
pub struct AppState {
    pub workflow: InboxWorkflow,
    pub sessions: SessionStore,
    pub files: FileStore,
}

impl AppState {
    pub fn new(workflow: InboxWorkflow, sessions: SessionStore, files: FileStore) -> Arc<Self> {
        Arc::new(Self {
            workflow,
            sessions,
            files,
        })
    }

    /// Wire the gateway, file store and sessions described by `config`
    pub async fn from_config(config: &Config) -> Result<Arc<Self>, ConfigError> {
        let columns = config.workflow_config()?;

        let gateway: Arc<dyn QueueGateway> = if config.demo {
            tracing::warn!("Demo mode: serving an in-memory board, Kaiten is not contacted");
            Arc::new(MemoryGateway::with_sample_cards(columns.queue_column).await)
        } else {
            let client = KaitenClient::new(config.kaiten_config()?)
                .map_err(|e| ConfigError::Gateway(e.to_string()))?;
            Arc::new(client)
        };

        let files = FileStore::new(config.files_root.clone());
        let sessions = SessionStore::new(config.credentials()?, config.session_ttl());
        if !sessions.is_enabled() {
            tracing::warn!("AUTH_USERNAME/AUTH_PASSWORD not set, authentication disabled");
        }

        let workflow = InboxWorkflow::new(gateway, files.clone(), columns);
        Ok(Self::new(workflow, sessions, files))
    }
}
