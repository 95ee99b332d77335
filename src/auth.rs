//! Operator login sessions
//!
//! Credentials come from configuration; sessions live in memory and expire
//! after a fixed lifetime. Without configured credentials authentication is
//! off and every request is accepted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorSession {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    credentials: Option<Credentials>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, OperatorSession>>,
}

impl SessionStore {
    pub fn new(credentials: Option<Credentials>, ttl: Duration) -> Self {
        Self {
            credentials,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Whether requests must carry a session token
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<OperatorSession> {
        if let Some(creds) = &self.credentials {
            if creds.username != username || creds.password != password {
                tracing::warn!(username, "Rejected login");
                return Err(AppError::Unauthorized("Invalid credentials".to_string()));
            }
        }

        let now = Utc::now();
        let session = OperatorSession {
            token: new_token(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        tracing::info!(username, token = %&session.token[..10], "Session created");
        Ok(session)
    }

    /// Username behind a live token. Expired sessions are dropped on the way.
    pub async fn verify(&self, token: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get(token)?;

        if Utc::now() > session.expires_at {
            tracing::info!(username = %session.username, "Session expired");
            sessions.remove(token);
            return None;
        }

        Some(session.username.clone())
    }

    pub async fn logout(&self, token: &str) -> bool {
        match self.sessions.write().await.remove(token) {
            Some(session) => {
                tracing::info!(username = %session.username, "Session deleted");
                true
            }
            None => false,
        }
    }
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
