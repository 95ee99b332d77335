//! In-memory board
//!
//! Behaves like the Kaiten endpoints the workflow uses, with switchable
//! failures per operation so partial-failure paths can be exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::QueueGateway;
use crate::error::{AppError, Result};
use crate::models::{Assignee, CardId, ColumnId, MemberRole, QueueItem, UserId};

/// Gateway operation, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    List,
    Get,
    Move,
    AddAssignee,
    SetRole,
    RemoveAssignee,
    AddComment,
}

#[derive(Default)]
struct Board {
    cards: Vec<QueueItem>,
    comments: HashMap<CardId, Vec<String>>,
    users: HashMap<UserId, String>,
    failures: HashSet<(GatewayOp, Option<UserId>)>,
    calls: Vec<String>,
}

impl Board {
    fn check(&self, op: GatewayOp, user_id: Option<UserId>) -> Result<()> {
        if self.failures.contains(&(op, None))
            || (user_id.is_some() && self.failures.contains(&(op, user_id)))
        {
            return Err(AppError::Kaiten(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }

    fn card_mut(&mut self, card_id: CardId) -> Result<&mut QueueItem> {
        self.cards
            .iter_mut()
            .find(|c| c.id == card_id)
            .ok_or_else(|| AppError::Kaiten(format!("404 Not Found - card {}", card_id)))
    }
}

/// Board kept in process memory
#[derive(Default)]
pub struct MemoryGateway {
    board: RwLock<Board>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Board pre-filled with a handful of letters in `queue_column`
    pub async fn with_sample_cards(queue_column: ColumnId) -> Self {
        let gateway = Self::new();
        let samples = [
            (59536701, "Запрос на согласование договора", 1233),
            (59536702, "Письмо из налоговой инспекции", 1234),
            (59536703, "Приглашение на конференцию", 1235),
            (59536704, "Претензия поставщика", 1236),
            (59536705, "Запрос документов от аудитора", 1237),
        ];
        for (id, title, no) in samples {
            gateway
                .insert(QueueItem {
                    id,
                    title: title.to_string(),
                    incoming_no: Some(no),
                    column_id: queue_column,
                    assignees: vec![],
                })
                .await;
        }
        gateway
    }

    /// Add or replace a card
    pub async fn insert(&self, item: QueueItem) {
        let mut board = self.board.write().await;
        board.cards.retain(|c| c.id != item.id);
        board.cards.push(item);
    }

    /// Delete a card, as if it were removed on the board
    pub async fn remove(&self, card_id: CardId) -> Option<QueueItem> {
        let mut board = self.board.write().await;
        let index = board.cards.iter().position(|c| c.id == card_id)?;
        Some(board.cards.remove(index))
    }

    /// Register a display name used when a user is added to a card
    pub async fn add_user(&self, user_id: UserId, name: impl Into<String>) {
        self.board.write().await.users.insert(user_id, name.into());
    }

    pub async fn card(&self, card_id: CardId) -> Option<QueueItem> {
        let board = self.board.read().await;
        board.cards.iter().find(|c| c.id == card_id).cloned()
    }

    pub async fn comments(&self, card_id: CardId) -> Vec<String> {
        let board = self.board.read().await;
        board.comments.get(&card_id).cloned().unwrap_or_default()
    }

    /// Make every call of `op` fail
    pub async fn fail(&self, op: GatewayOp) {
        self.board.write().await.failures.insert((op, None));
    }

    /// Make `op` fail only when it targets `user_id`
    pub async fn fail_for_user(&self, op: GatewayOp, user_id: UserId) {
        self.board.write().await.failures.insert((op, Some(user_id)));
    }

    pub async fn clear_failures(&self) {
        self.board.write().await.failures.clear();
    }

    /// Mutating calls received so far, e.g. `add_assignee 5 777`
    pub async fn calls(&self) -> Vec<String> {
        self.board.read().await.calls.clone()
    }
}

#[async_trait]
impl QueueGateway for MemoryGateway {
    async fn list_queue_items(&self, column_id: ColumnId) -> Result<Vec<QueueItem>> {
        let board = self.board.read().await;
        board.check(GatewayOp::List, None)?;
        Ok(board
            .cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .cloned()
            .collect())
    }

    async fn get_item(&self, card_id: CardId) -> Result<Option<QueueItem>> {
        let board = self.board.read().await;
        board.check(GatewayOp::Get, None)?;
        Ok(board.cards.iter().find(|c| c.id == card_id).cloned())
    }

    async fn move_item(&self, card_id: CardId, column_id: ColumnId) -> Result<()> {
        let mut board = self.board.write().await;
        board.check(GatewayOp::Move, None)?;
        board.card_mut(card_id)?.column_id = column_id;
        board.calls.push(format!("move {} {}", card_id, column_id));
        Ok(())
    }

    async fn add_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()> {
        let mut board = self.board.write().await;
        board.check(GatewayOp::AddAssignee, Some(user_id))?;
        let name = board
            .users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| format!("User {}", user_id));
        let card = board.card_mut(card_id)?;
        if !card.assignees.iter().any(|a| a.user_id == user_id) {
            card.assignees
                .push(Assignee::new(user_id, MemberRole::Participant, name));
        }
        board.calls.push(format!("add_assignee {} {}", card_id, user_id));
        Ok(())
    }

    async fn set_assignee_role(
        &self,
        card_id: CardId,
        user_id: UserId,
        role: MemberRole,
    ) -> Result<()> {
        let mut board = self.board.write().await;
        board.check(GatewayOp::SetRole, Some(user_id))?;
        let card = board.card_mut(card_id)?;
        let member = card
            .assignees
            .iter_mut()
            .find(|a| a.user_id == user_id)
            .ok_or_else(|| {
                AppError::Kaiten(format!("404 Not Found - member {} on card {}", user_id, card_id))
            })?;
        member.role = role;
        board
            .calls
            .push(format!("set_role {} {} {}", card_id, user_id, role));
        Ok(())
    }

    async fn remove_assignee(&self, card_id: CardId, user_id: UserId) -> Result<()> {
        let mut board = self.board.write().await;
        board.check(GatewayOp::RemoveAssignee, Some(user_id))?;
        if let Some(card) = board.cards.iter_mut().find(|c| c.id == card_id) {
            card.assignees.retain(|a| a.user_id != user_id);
        }
        board
            .calls
            .push(format!("remove_assignee {} {}", card_id, user_id));
        Ok(())
    }

    async fn add_comment(&self, card_id: CardId, text: &str) -> Result<()> {
        let mut board = self.board.write().await;
        board.check(GatewayOp::AddComment, None)?;
        board.card_mut(card_id)?;
        board
            .comments
            .entry(card_id)
            .or_default()
            .push(text.to_string());
        board.calls.push(format!("add_comment {}", card_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: CardId, no: i64, column: ColumnId) -> QueueItem {
        QueueItem {
            id,
            title: format!("Letter {}", id),
            incoming_no: Some(no),
            column_id: column,
            assignees: vec![],
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_column() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;
        gateway.insert(card(2, 20, 200)).await;

        let items = gateway.list_queue_items(100).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
    }

    #[tokio::test]
    async fn test_add_and_promote_member() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;
        gateway.add_user(777, "Горская").await;

        gateway.add_assignee(1, 777).await.unwrap();
        gateway
            .set_assignee_role(1, 777, MemberRole::Responsible)
            .await
            .unwrap();

        let item = gateway.card(1).await.unwrap();
        assert_eq!(
            item.assignees,
            vec![Assignee::new(777, MemberRole::Responsible, "Горская")]
        );
    }

    #[tokio::test]
    async fn test_remove_absent_member_succeeds() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;
        assert!(gateway.remove_assignee(1, 42).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;
        gateway.fail_for_user(GatewayOp::AddAssignee, 5).await;

        assert!(gateway.add_assignee(1, 5).await.is_err());
        assert!(gateway.add_assignee(1, 6).await.is_ok());

        gateway.fail(GatewayOp::Move).await;
        assert!(gateway.move_item(1, 200).await.is_err());

        gateway.clear_failures().await;
        assert!(gateway.move_item(1, 200).await.is_ok());
        assert_eq!(gateway.card(1).await.unwrap().column_id, 200);
    }

    #[tokio::test]
    async fn test_sample_cards() {
        let gateway = MemoryGateway::with_sample_cards(100).await;
        let items = gateway.list_queue_items(100).await.unwrap();
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|c| c.incoming_no.is_some()));
    }

    #[tokio::test]
    async fn test_reads_share_the_board() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;

        // A reader holding the board must not block list or get
        let _reader = gateway.board.read().await;
        let reads = async {
            let items = gateway.list_queue_items(100).await.unwrap();
            let item = gateway.get_item(1).await.unwrap();
            (items.len(), item.map(|c| c.id))
        };
        let (count, id) = tokio::time::timeout(std::time::Duration::from_secs(1), reads)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(id, Some(1));
    }

    #[tokio::test]
    async fn test_read_failures_still_injected() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;
        gateway.fail(GatewayOp::List).await;
        gateway.fail(GatewayOp::Get).await;

        assert!(gateway.list_queue_items(100).await.is_err());
        assert!(gateway.get_item(1).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_card() {
        let gateway = MemoryGateway::new();
        gateway.insert(card(1, 10, 100)).await;

        assert_eq!(gateway.remove(1).await.map(|c| c.id), Some(1));
        assert!(gateway.remove(1).await.is_none());
        assert!(gateway.get_item(1).await.unwrap().is_none());
    }
}
