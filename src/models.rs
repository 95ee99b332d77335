//! Data models for queue cards and the operator-facing inbox state

use serde::{Deserialize, Serialize};

pub type CardId = u64;
pub type UserId = u64;
pub type ColumnId = u64;
/// Incoming letter number; the total-order key of the queue
pub type IncomingNo = i64;

/// Role of a card member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    #[default]
    Participant,
    Responsible,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Participant => "participant",
            MemberRole::Responsible => "responsible",
        }
    }

    /// Kaiten member `type` field: 1 = participant, 2 = responsible
    pub fn kaiten_type(&self) -> u8 {
        match self {
            MemberRole::Participant => 1,
            MemberRole::Responsible => 2,
        }
    }

    pub fn from_kaiten_type(value: u8) -> Self {
        match value {
            2 => MemberRole::Responsible,
            _ => MemberRole::Participant,
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "participant" => Ok(MemberRole::Participant),
            "responsible" => Ok(MemberRole::Responsible),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user attached to a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub user_id: UserId,
    pub role: MemberRole,
    pub name: String,
}

impl Assignee {
    pub fn new(user_id: UserId, role: MemberRole, name: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            name: name.into(),
        }
    }
}

/// A card as seen in the remote board. Rebuilt on every query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: CardId,
    pub title: String,
    pub incoming_no: Option<IncomingNo>,
    pub column_id: ColumnId,
    pub assignees: Vec<Assignee>,
}

/// A letter attachment shown next to the current card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub url: String,
    pub ext: String,
}

/// The card currently presented to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCard {
    pub card_id: CardId,
    pub title: String,
    pub incoming_no: IncomingNo,
    pub files: Vec<FileInfo>,
}

/// Snapshot returned by every inbox operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxState {
    pub queue_count: usize,
    pub deferred_count: usize,
    pub assigned_session_count: u64,
    pub current_card: Option<CurrentCard>,
}

/// State after a remote-mutating action, with any drift warnings collected on the way
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(flatten)]
    pub state: InboxState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Request to assign a card
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignRequest {
    pub card_id: CardId,
    pub owner_id: UserId,
    #[serde(default)]
    pub co_owner_ids: Vec<UserId>,
    #[serde(default)]
    pub comment_text: String,
    #[serde(default)]
    pub multi: bool,
}

/// Request to skip (defer) a card
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkipRequest {
    pub card_id: CardId,
}
