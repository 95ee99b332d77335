//! Inbox workflow coordinating focus, skip, assign and undo
//!
//! The manager owns all local state:
//! - the deferred-card ledger
//! - the single undo slot
//! - the session counter of assigned cards
//!
//! Every operation takes one lock for its whole duration, so the remote call
//! sequences of two operations never interleave.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::assign::{self, AssignContext, AssignPlan};
use super::focus::{select_focus, Focus, QueueSnapshot};
use super::ledger::{DeferLedger, DeferredEntry};
use super::outcome::{StepLog, WorkflowStep};
use super::undo::{self, UndoLedger, UndoRecord};
use crate::error::{AppError, Result};
use crate::files::FileStore;
use crate::gateway::QueueGateway;
use crate::models::{
    ActionResult, AssignRequest, CardId, ColumnId, CurrentCard, IncomingNo, InboxState,
};

/// Board columns the workflow moves cards between
#[derive(Debug, Clone, Copy)]
pub struct WorkflowConfig {
    pub queue_column: ColumnId,
    pub assigned_column: ColumnId,
}

#[derive(Debug, Default)]
struct WorkflowState {
    ledger: DeferLedger,
    undo: UndoLedger,
    assigned_count: u64,
}

pub struct InboxWorkflow {
    gateway: Arc<dyn QueueGateway>,
    files: FileStore,
    config: WorkflowConfig,
    state: Mutex<WorkflowState>,
}

impl InboxWorkflow {
    pub fn new(gateway: Arc<dyn QueueGateway>, files: FileStore, config: WorkflowConfig) -> Self {
        Self {
            gateway,
            files,
            config,
            state: Mutex::new(WorkflowState::default()),
        }
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    /// Current queue counters and the card in focus
    pub async fn get_state(&self) -> Result<InboxState> {
        let mut state = self.state.lock().await;
        let queue = self.load_queue().await?;
        self.build_state(&queue, &mut state).await
    }

    /// Defer the card in focus until its party has been worked through
    pub async fn skip(&self, card_id: CardId) -> Result<InboxState> {
        let mut state = self.state.lock().await;
        let queue = self.load_queue().await?;

        let party_end = queue
            .max_incoming_no()
            .ok_or_else(|| AppError::PreconditionFailed("Queue is empty".to_string()))?;
        let card = queue
            .get(card_id)
            .ok_or_else(|| AppError::NotFound(format!("Card {} is not in the queue", card_id)))?;

        let replaced = state.ledger.defer(card_id, card.incoming_no, party_end);
        tracing::info!(
            card_id,
            incoming_no = card.incoming_no,
            party_end,
            redeferred = replaced.is_some(),
            "Card skipped"
        );

        self.build_state(&queue, &mut state).await
    }

    /// Hand a card to its owner and co-owners
    pub async fn assign(&self, request: AssignRequest) -> Result<ActionResult> {
        let plan = AssignPlan::from_request(request);
        let mut state = self.state.lock().await;

        let WorkflowState { ledger, undo, .. } = &mut *state;
        let ctx = AssignContext {
            gateway: self.gateway.as_ref(),
            assigned_column: self.config.assigned_column,
            ledger,
            undo,
        };
        let log = assign::run(ctx, &plan).await?;

        state.assigned_count += 1;
        tracing::info!(
            card_id = plan.card_id,
            owner_id = plan.owner_id,
            session_assigned = state.assigned_count,
            "Card assigned"
        );

        Ok(self.finish(&mut state, log).await)
    }

    /// Reverse the latest assignment
    pub async fn undo(&self) -> Result<ActionResult> {
        let mut state = self.state.lock().await;
        let record = state
            .undo
            .current()
            .cloned()
            .ok_or_else(|| AppError::PreconditionFailed("Nothing to undo".to_string()))?;

        let mut log = StepLog::new();
        undo::restore(self.gateway.as_ref(), &record, &mut log).await?;

        state.assigned_count = state.assigned_count.saturating_sub(1);
        state.undo.clear();
        tracing::info!(
            card_id = record.card_id,
            column_id = record.previous_column,
            session_assigned = state.assigned_count,
            "Assignment undone"
        );

        Ok(self.finish(&mut state, log).await)
    }

    /// Deferred entries, oldest first
    pub async fn deferred(&self) -> Vec<DeferredEntry> {
        self.state.lock().await.ledger.entries().to_vec()
    }

    pub async fn undo_record(&self) -> Option<UndoRecord> {
        self.state.lock().await.undo.current().cloned()
    }

    pub async fn assigned_count(&self) -> u64 {
        self.state.lock().await.assigned_count
    }

    /// State after a committed assign or undo. The remote changes are already
    /// made, so a failed reload becomes a `refresh` warning over a partial
    /// state (no current card, empty queue count) instead of an error.
    async fn finish(&self, state: &mut WorkflowState, mut log: StepLog) -> ActionResult {
        let rebuilt = match self.load_queue().await {
            Ok(queue) => self.build_state(&queue, state).await,
            Err(e) => Err(e),
        };

        let inbox = match rebuilt {
            Ok(inbox) => {
                log.done(WorkflowStep::Refresh);
                inbox
            }
            Err(e) => {
                log.warn(
                    WorkflowStep::Refresh,
                    format!("failed to reload the queue, state is partial: {}", e),
                );
                InboxState {
                    queue_count: 0,
                    deferred_count: state.ledger.len(),
                    assigned_session_count: state.assigned_count,
                    current_card: None,
                }
            }
        };

        ActionResult {
            state: inbox,
            warnings: log.warnings(),
        }
    }

    async fn load_queue(&self) -> Result<QueueSnapshot> {
        let items = self
            .gateway
            .list_queue_items(self.config.queue_column)
            .await?;
        Ok(QueueSnapshot::new(items))
    }

    async fn build_state(
        &self,
        queue: &QueueSnapshot,
        state: &mut WorkflowState,
    ) -> Result<InboxState> {
        let current_card = self.resolve_focus(queue, &mut state.ledger).await?;
        Ok(InboxState {
            queue_count: queue.len(),
            deferred_count: state.ledger.len(),
            assigned_session_count: state.assigned_count,
            current_card,
        })
    }

    /// Run focus selection, fetching the deferred card when the party is
    /// exhausted. A deferred card that is gone or no longer in the queue
    /// column is dropped from the ledger and selection starts over.
    async fn resolve_focus(
        &self,
        queue: &QueueSnapshot,
        ledger: &mut DeferLedger,
    ) -> Result<Option<CurrentCard>> {
        loop {
            let entry = match select_focus(queue, ledger) {
                Focus::Empty => return Ok(None),
                Focus::Live(card) => {
                    let current = self
                        .current_card(card.item.id, card.item.title.clone(), card.incoming_no)
                        .await;
                    return Ok(Some(current));
                }
                Focus::Fallback(entry) => entry.clone(),
            };

            match self.gateway.get_item(entry.card_id).await? {
                Some(item) if item.column_id == self.config.queue_column => {
                    let incoming_no = item.incoming_no.unwrap_or(entry.incoming_no);
                    return Ok(Some(self.current_card(item.id, item.title, incoming_no).await));
                }
                Some(item) => {
                    tracing::warn!(
                        card_id = entry.card_id,
                        column_id = item.column_id,
                        "Deferred card left the queue, dropping it"
                    );
                    ledger.remove(entry.card_id);
                }
                None => {
                    tracing::warn!(card_id = entry.card_id, "Deferred card no longer exists, dropping it");
                    ledger.remove(entry.card_id);
                }
            }
        }
    }

    async fn current_card(&self, card_id: CardId, title: String, incoming_no: IncomingNo) -> CurrentCard {
        CurrentCard {
            card_id,
            title,
            incoming_no,
            files: self.files.list(incoming_no).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayOp, MemoryGateway};
    use crate::models::{Assignee, MemberRole, QueueItem};

    const QUEUE: ColumnId = 100;
    const ASSIGNED: ColumnId = 200;

    fn card(id: CardId, no: IncomingNo) -> QueueItem {
        QueueItem {
            id,
            title: format!("Letter {}", id),
            incoming_no: Some(no),
            column_id: QUEUE,
            assignees: vec![],
        }
    }

    async fn setup(cards: &[(CardId, IncomingNo)]) -> (Arc<MemoryGateway>, InboxWorkflow) {
        let gateway = Arc::new(MemoryGateway::new());
        for &(id, no) in cards {
            gateway.insert(card(id, no)).await;
        }
        let workflow = InboxWorkflow::new(
            gateway.clone(),
            FileStore::new("/nonexistent"),
            WorkflowConfig {
                queue_column: QUEUE,
                assigned_column: ASSIGNED,
            },
        );
        (gateway, workflow)
    }

    fn focus_id(state: &InboxState) -> Option<CardId> {
        state.current_card.as_ref().map(|c| c.card_id)
    }

    fn request(card_id: CardId, owner_id: u64) -> AssignRequest {
        AssignRequest {
            card_id,
            owner_id,
            co_owner_ids: vec![],
            comment_text: String::new(),
            multi: false,
        }
    }

    #[tokio::test]
    async fn test_get_state_empty_queue() {
        let (_gateway, workflow) = setup(&[]).await;
        let state = workflow.get_state().await.unwrap();
        assert_eq!(state.queue_count, 0);
        assert_eq!(state.deferred_count, 0);
        assert!(state.current_card.is_none());
    }

    #[tokio::test]
    async fn test_get_state_ignores_cards_without_number() {
        let (gateway, workflow) = setup(&[(2, 20)]).await;
        gateway
            .insert(QueueItem {
                incoming_no: None,
                ..card(1, 0)
            })
            .await;

        let state = workflow.get_state().await.unwrap();
        assert_eq!(state.queue_count, 1);
        assert_eq!(focus_id(&state), Some(2));
    }

    #[tokio::test]
    async fn test_skip_empty_queue_fails() {
        let (_gateway, workflow) = setup(&[]).await;
        let err = workflow.skip(1).await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert!(workflow.deferred().await.is_empty());
    }

    #[tokio::test]
    async fn test_skip_unknown_card_fails() {
        let (_gateway, workflow) = setup(&[(1, 10)]).await;
        let err = workflow.skip(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(workflow.deferred().await.is_empty());
    }

    #[tokio::test]
    async fn test_skip_records_party_end() {
        let (_gateway, workflow) = setup(&[(1, 10), (2, 20), (3, 30)]).await;
        let state = workflow.skip(1).await.unwrap();

        assert_eq!(state.deferred_count, 1);
        assert_eq!(focus_id(&state), Some(2));
        let deferred = workflow.deferred().await;
        assert_eq!(deferred[0].card_id, 1);
        assert_eq!(deferred[0].incoming_no, 10);
        assert_eq!(deferred[0].party_end, 30);
    }

    #[tokio::test]
    async fn test_fallback_returns_deferred_card() {
        let (_gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        workflow.skip(1).await.unwrap();
        let state = workflow.skip(2).await.unwrap();
        assert_eq!(focus_id(&state), Some(1));
        assert_eq!(state.current_card.unwrap().incoming_no, 10);
    }

    #[tokio::test]
    async fn test_stale_fallback_is_dropped() {
        let (gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        workflow.skip(1).await.unwrap();
        workflow.skip(2).await.unwrap();

        // Someone else moves card 1 out of the queue
        gateway.move_item(1, 300).await.unwrap();

        let state = workflow.get_state().await.unwrap();
        assert_eq!(state.deferred_count, 1);
        assert_eq!(focus_id(&state), Some(2));
        assert_eq!(workflow.deferred().await[0].card_id, 2);
    }

    #[tokio::test]
    async fn test_deleted_deferred_card_is_dropped() {
        let (gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        workflow.skip(1).await.unwrap();
        workflow.skip(2).await.unwrap();

        assert!(gateway.remove(1).await.is_some());

        let state = workflow.get_state().await.unwrap();
        assert_eq!(state.queue_count, 1);
        assert_eq!(state.deferred_count, 1);
        assert_eq!(focus_id(&state), Some(2));
        assert_eq!(workflow.deferred().await[0].card_id, 2);
    }

    #[tokio::test]
    async fn test_fallback_fetch_error_propagates() {
        let (gateway, workflow) = setup(&[(1, 10)]).await;
        workflow.skip(1).await.unwrap();
        gateway.fail(GatewayOp::Get).await;

        assert!(workflow.get_state().await.is_err());
        assert_eq!(workflow.deferred().await.len(), 1);
    }

    #[tokio::test]
    async fn test_assign_and_undo_counter() {
        let (gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;

        let result = workflow.assign(request(1, 777)).await.unwrap();
        assert_eq!(result.state.assigned_session_count, 1);
        assert_eq!(result.state.queue_count, 1);
        assert_eq!(focus_id(&result.state), Some(2));
        assert!(workflow.undo_record().await.is_some());

        let result = workflow.undo().await.unwrap();
        assert_eq!(result.state.assigned_session_count, 0);
        assert_eq!(result.state.queue_count, 2);
        assert_eq!(focus_id(&result.state), Some(1));
        assert!(workflow.undo_record().await.is_none());
        assert!(gateway.card(1).await.unwrap().assignees.is_empty());
    }

    #[tokio::test]
    async fn test_undo_without_record_fails() {
        let (gateway, workflow) = setup(&[(1, 10)]).await;
        let err = workflow.undo().await.unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(workflow.assigned_count().await, 0);
        assert!(gateway.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_undo_is_single_use() {
        let (_gateway, workflow) = setup(&[(1, 10)]).await;
        workflow.assign(request(1, 777)).await.unwrap();
        workflow.undo().await.unwrap();
        assert!(matches!(
            workflow.undo().await,
            Err(AppError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_undo_keeps_record() {
        let (gateway, workflow) = setup(&[(1, 10)]).await;
        workflow.assign(request(1, 777)).await.unwrap();
        gateway.fail(GatewayOp::Move).await;

        assert!(workflow.undo().await.is_err());
        assert!(workflow.undo_record().await.is_some());
        assert_eq!(workflow.assigned_count().await, 1);

        gateway.clear_failures().await;
        workflow.undo().await.unwrap();
        assert_eq!(workflow.assigned_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_assign_replaces_undo_record() {
        let (gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        workflow.assign(request(1, 777)).await.unwrap();
        workflow.assign(request(2, 888)).await.unwrap();

        let result = workflow.undo().await.unwrap();
        assert_eq!(result.state.assigned_session_count, 1);
        assert_eq!(gateway.card(2).await.unwrap().column_id, QUEUE);
        // The first assignment stays in place
        assert_eq!(gateway.card(1).await.unwrap().column_id, ASSIGNED);
        assert!(workflow.undo().await.is_err());
    }

    #[tokio::test]
    async fn test_undo_does_not_restore_deferral() {
        let (_gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        workflow.skip(1).await.unwrap();
        workflow.assign(request(1, 777)).await.unwrap();
        assert!(workflow.deferred().await.is_empty());

        let result = workflow.undo().await.unwrap();
        assert_eq!(result.state.deferred_count, 0);
        assert_eq!(focus_id(&result.state), Some(1));
    }

    #[tokio::test]
    async fn test_failed_assign_leaves_counter() {
        let (gateway, workflow) = setup(&[(1, 10)]).await;
        gateway.fail(GatewayOp::SetRole).await;
        assert!(workflow.assign(request(1, 777)).await.is_err());
        assert_eq!(workflow.assigned_count().await, 0);
    }

    #[tokio::test]
    async fn test_assign_restores_previous_roles_on_undo() {
        let (gateway, workflow) = setup(&[]).await;
        gateway
            .insert(QueueItem {
                assignees: vec![Assignee::new(5, MemberRole::Responsible, "Lead")],
                ..card(1, 10)
            })
            .await;

        workflow.assign(request(1, 777)).await.unwrap();
        workflow.undo().await.unwrap();

        let members = gateway.card(1).await.unwrap().assignees;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, 5);
        assert_eq!(members[0].role, MemberRole::Responsible);
    }

    #[tokio::test]
    async fn test_assign_commits_when_reload_fails() {
        let (gateway, workflow) = setup(&[(1, 10), (2, 20)]).await;
        gateway.fail(GatewayOp::List).await;

        let result = workflow.assign(request(1, 777)).await.unwrap();
        assert_eq!(result.state.assigned_session_count, 1);
        assert!(result.state.current_card.is_none());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("refresh: failed to reload the queue")));
        assert_eq!(gateway.card(1).await.unwrap().column_id, ASSIGNED);
        assert!(workflow.undo_record().await.is_some());

        gateway.clear_failures().await;
        let state = workflow.get_state().await.unwrap();
        assert_eq!(state.assigned_session_count, 1);
        assert_eq!(state.queue_count, 1);
        assert_eq!(focus_id(&state), Some(2));
    }

    #[tokio::test]
    async fn test_undo_commits_when_reload_fails() {
        let (gateway, workflow) = setup(&[(1, 10)]).await;
        workflow.assign(request(1, 777)).await.unwrap();
        gateway.fail(GatewayOp::List).await;

        let result = workflow.undo().await.unwrap();
        assert_eq!(result.state.assigned_session_count, 0);
        assert!(result.warnings.iter().any(|w| w.starts_with("refresh:")));
        assert_eq!(gateway.card(1).await.unwrap().column_id, QUEUE);
        assert!(workflow.undo_record().await.is_none());
    }
}
