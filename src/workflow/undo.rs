//! Single-slot undo of the latest assignment

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::outcome::{StepLog, WorkflowStep};
use crate::error::{AppError, Result};
use crate::gateway::QueueGateway;
use crate::models::{Assignee, CardId, ColumnId, MemberRole};

/// What a card looked like right before it was assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoRecord {
    pub card_id: CardId,
    pub previous_column: ColumnId,
    pub previous_assignees: Vec<Assignee>,
    pub recorded_at: DateTime<Utc>,
}

impl UndoRecord {
    pub fn new(card_id: CardId, previous_column: ColumnId, previous_assignees: Vec<Assignee>) -> Self {
        Self {
            card_id,
            previous_column,
            previous_assignees,
            recorded_at: Utc::now(),
        }
    }
}

/// Holds at most one record; a newer assignment replaces the older one
#[derive(Debug, Default)]
pub struct UndoLedger {
    slot: Option<UndoRecord>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returning the one it displaced
    pub fn replace(&mut self, record: UndoRecord) -> Option<UndoRecord> {
        self.slot.replace(record)
    }

    pub fn current(&self) -> Option<&UndoRecord> {
        self.slot.as_ref()
    }

    pub fn clear(&mut self) -> Option<UndoRecord> {
        self.slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

/// Put the card back the way `record` describes it.
///
/// Member changes are best effort and end up as warnings in `log`; moving the
/// card back is the part that matters, so a failed move is fatal.
pub async fn restore(gateway: &dyn QueueGateway, record: &UndoRecord, log: &mut StepLog) -> Result<()> {
    let card_id = record.card_id;

    match gateway.get_item(card_id).await {
        Ok(Some(item)) => {
            let mut failed = false;
            for member in &item.assignees {
                if let Err(e) = gateway.remove_assignee(card_id, member.user_id).await {
                    failed = true;
                    log.warn(
                        WorkflowStep::ClearAssignees,
                        format!("failed to remove user {}: {}", member.user_id, e),
                    );
                }
            }
            if !failed {
                log.done(WorkflowStep::ClearAssignees);
            }
        }
        Ok(None) => log.warn(
            WorkflowStep::ClearAssignees,
            format!("card {} not found", card_id),
        ),
        Err(e) => log.warn(
            WorkflowStep::ClearAssignees,
            format!("failed to fetch card {}: {}", card_id, e),
        ),
    }

    let mut failed = false;
    for member in &record.previous_assignees {
        if let Err(e) = gateway.add_assignee(card_id, member.user_id).await {
            failed = true;
            log.warn(
                WorkflowStep::RestoreAssignees,
                format!("failed to re-add user {}: {}", member.user_id, e),
            );
            continue;
        }
        if member.role != MemberRole::default() {
            if let Err(e) = gateway
                .set_assignee_role(card_id, member.user_id, member.role)
                .await
            {
                failed = true;
                log.warn(
                    WorkflowStep::RestoreAssignees,
                    format!("failed to restore role of user {}: {}", member.user_id, e),
                );
            }
        }
    }
    if record.previous_assignees.is_empty() {
        log.skipped(WorkflowStep::RestoreAssignees, "card had no members");
    } else if !failed {
        log.done(WorkflowStep::RestoreAssignees);
    }

    gateway
        .move_item(card_id, record.previous_column)
        .await
        .map_err(|e| AppError::step(WorkflowStep::RestoreLocation, e))?;
    log.done(WorkflowStep::RestoreLocation);

    Ok(())
}
