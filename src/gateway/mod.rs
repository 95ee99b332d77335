//! Remote queue gateway
//!
//! The workflow talks to the Kanban board only through [`QueueGateway`]. The
//! production implementation is [`crate::kaiten::KaitenClient`]; [`memory`]
//! holds an in-process board used for demos and tests.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CardId, ColumnId, MemberRole, QueueItem, UserId};

pub use memory::{GatewayOp, MemoryGateway};

/// Operations the inbox workflow needs from the remote board
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// List the cards currently located in a column
    async fn list_queue_items(&self, column_id: ColumnId) -> Result<Vec<QueueItem>>;

    /// Fetch one card with its members and location. `None` if it does not exist.
    async fn get_item(&self, card_id: CardId) -> Result<Option<QueueItem>>;

    async fn move_item(&self, card_id: CardId, column_id: ColumnId) -> Result<()>;

    /// Add a user as a plain participant
    async fn add_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()>;

    async fn set_assignee_role(
        &self,
        card_id: CardId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<()>;

    /// Remove a user from the card. Removing an absent member succeeds.
    async fn remove_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()>;

    async fn add_comment(&self, card_id: CardId, text: &str) -> Result<()>;
}
