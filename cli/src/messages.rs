//! Wire types of the inbox HTTP API
//!
//! These mirror the server's JSON. Some fields are only printed, never
//! inspected, by the CLI.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub url: String,
    pub ext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCard {
    pub card_id: u64,
    pub title: String,
    pub incoming_no: i64,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxState {
    pub queue_count: usize,
    pub deferred_count: usize,
    pub assigned_session_count: u64,
    pub current_card: Option<CurrentCard>,
}

/// Assign/undo response: the state plus drift warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(flatten)]
    pub state: InboxState,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipRequest {
    pub card_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignRequest {
    pub card_id: u64,
    pub owner_id: u64,
    pub co_owner_ids: Vec<u64>,
    pub comment_text: String,
    pub multi: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_result_without_warnings() {
        let json = r#"{
            "queue_count": 2,
            "deferred_count": 0,
            "assigned_session_count": 1,
            "current_card": {"card_id": 5, "title": "Letter", "incoming_no": 1233, "files": []}
        }"#;
        let result: ActionResult = serde_json::from_str(json).unwrap();
        assert!(result.warnings.is_empty());
        assert_eq!(result.state.current_card.unwrap().incoming_no, 1233);
    }

    #[test]
    fn test_empty_queue_state() {
        let json = r#"{"queue_count":0,"deferred_count":0,"assigned_session_count":0,"current_card":null}"#;
        let state: InboxState = serde_json::from_str(json).unwrap();
        assert!(state.current_card.is_none());
    }
}
