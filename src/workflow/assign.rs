//! Assignment of a card to an owner and co-owners
//!
//! The board offers no transactions, so the sequence is:
//!
//! 1. snapshot the card for undo (best effort)
//! 2. clear members, add the owner, promote the owner to responsible (fatal)
//! 3. add co-owners and the comment (warnings only)
//! 4. drop the card from the deferred list
//! 5. move the card to the assigned column (fatal)
//! 6. re-read the card and remove anyone who should not be there

use std::collections::HashSet;

use super::ledger::DeferLedger;
use super::outcome::{StepLog, WorkflowStep};
use super::undo::{UndoLedger, UndoRecord};
use crate::error::{AppError, Result};
use crate::gateway::QueueGateway;
use crate::models::{Assignee, AssignRequest, CardId, ColumnId, MemberRole, UserId};

/// Normalized assignment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignPlan {
    pub card_id: CardId,
    pub owner_id: UserId,
    /// Unique, in request order, never containing the owner
    pub co_owner_ids: Vec<UserId>,
    /// Trimmed comment; `None` when blank
    pub comment: Option<String>,
    pub multi: bool,
}

impl AssignPlan {
    pub fn from_request(request: AssignRequest) -> Self {
        let mut seen = HashSet::from([request.owner_id]);
        let co_owner_ids = request
            .co_owner_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        let comment = Some(request.comment_text.trim().to_string()).filter(|c| !c.is_empty());

        Self {
            card_id: request.card_id,
            owner_id: request.owner_id,
            co_owner_ids,
            comment,
            multi: request.multi,
        }
    }

    /// Members the card must have once assignment completes
    pub fn expected_members(&self) -> HashSet<UserId> {
        std::iter::once(self.owner_id)
            .chain(self.co_owner_ids.iter().copied())
            .collect()
    }
}

/// Mutable local state the assignment touches
pub struct AssignContext<'a> {
    pub gateway: &'a dyn QueueGateway,
    pub assigned_column: ColumnId,
    pub ledger: &'a mut DeferLedger,
    pub undo: &'a mut UndoLedger,
}

/// Run the assignment sequence. Returns the step log on success; a fatal
/// step returns `AppError::StepFailed` and leaves earlier effects in place.
pub async fn run(ctx: AssignContext<'_>, plan: &AssignPlan) -> Result<StepLog> {
    let AssignContext {
        gateway,
        assigned_column,
        ledger,
        undo,
    } = ctx;
    let card_id = plan.card_id;
    let mut log = StepLog::new();

    tracing::info!(
        card_id,
        owner_id = plan.owner_id,
        co_owners = ?plan.co_owner_ids,
        multi = plan.multi,
        "Assigning card"
    );

    // Snapshot for undo
    let snapshot: Option<Vec<Assignee>> = match gateway.get_item(card_id).await {
        Ok(Some(item)) => {
            undo.replace(UndoRecord::new(card_id, item.column_id, item.assignees.clone()));
            log.done(WorkflowStep::Snapshot);
            Some(item.assignees)
        }
        Ok(None) => {
            undo.clear();
            log.warn(
                WorkflowStep::Snapshot,
                format!("card {} not found, undo unavailable", card_id),
            );
            None
        }
        Err(e) => {
            undo.clear();
            log.warn(
                WorkflowStep::Snapshot,
                format!("failed to snapshot card {}, undo unavailable: {}", card_id, e),
            );
            None
        }
    };

    // Clear existing members
    let members = match snapshot {
        Some(members) => members,
        None => gateway
            .get_item(card_id)
            .await
            .map_err(|e| AppError::step(WorkflowStep::ClearAssignees, e))?
            .ok_or_else(|| AppError::StepFailed {
                step: WorkflowStep::ClearAssignees,
                reason: format!("card {} not found", card_id),
            })?
            .assignees,
    };
    if members.is_empty() {
        log.skipped(WorkflowStep::ClearAssignees, "card had no members");
    } else {
        for member in &members {
            gateway
                .remove_assignee(card_id, member.user_id)
                .await
                .map_err(|e| AppError::step(WorkflowStep::ClearAssignees, e))?;
        }
        log.done(WorkflowStep::ClearAssignees);
    }

    // Owner
    gateway
        .add_assignee(card_id, plan.owner_id)
        .await
        .map_err(|e| AppError::step(WorkflowStep::AddOwner, e))?;
    log.done(WorkflowStep::AddOwner);

    gateway
        .set_assignee_role(card_id, plan.owner_id, MemberRole::Responsible)
        .await
        .map_err(|e| AppError::step(WorkflowStep::PromoteOwner, e))?;
    log.done(WorkflowStep::PromoteOwner);

    // Co-owners
    if plan.co_owner_ids.is_empty() {
        log.skipped(WorkflowStep::AddCoOwners, "no co-owners");
    } else {
        let mut failed = false;
        for &user_id in &plan.co_owner_ids {
            if let Err(e) = gateway.add_assignee(card_id, user_id).await {
                failed = true;
                log.warn(
                    WorkflowStep::AddCoOwners,
                    format!("failed to add co-owner {}: {}", user_id, e),
                );
            }
        }
        if !failed {
            log.done(WorkflowStep::AddCoOwners);
        }
    }

    // Comment
    match &plan.comment {
        None => log.skipped(WorkflowStep::AddComment, "empty comment"),
        Some(text) => match gateway.add_comment(card_id, text).await {
            Ok(()) => log.done(WorkflowStep::AddComment),
            Err(e) => log.warn(
                WorkflowStep::AddComment,
                format!("failed to add comment: {}", e),
            ),
        },
    }

    // The card is resolved, it no longer waits in a party
    match ledger.remove(card_id) {
        Some(_) => log.done(WorkflowStep::ReconcileDefer),
        None => log.skipped(WorkflowStep::ReconcileDefer, "card was not deferred"),
    }

    gateway
        .move_item(card_id, assigned_column)
        .await
        .map_err(|e| AppError::step(WorkflowStep::Relocate, e))?;
    log.done(WorkflowStep::Relocate);

    verify(gateway, plan, &mut log).await;

    Ok(log)
}

/// Re-read the card and strip members nobody asked for
async fn verify(gateway: &dyn QueueGateway, plan: &AssignPlan, log: &mut StepLog) {
    let card_id = plan.card_id;
    let item = match gateway.get_item(card_id).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            log.warn(
                WorkflowStep::Verify,
                format!("card {} disappeared before verification", card_id),
            );
            return;
        }
        Err(e) => {
            log.warn(
                WorkflowStep::Verify,
                format!("failed to re-read card {}: {}", card_id, e),
            );
            return;
        }
    };

    let expected = plan.expected_members();
    let mut drifted = false;

    for member in item.assignees.iter().filter(|a| !expected.contains(&a.user_id)) {
        drifted = true;
        match gateway.remove_assignee(card_id, member.user_id).await {
            Ok(()) => log.warn(
                WorkflowStep::Verify,
                format!("removed unexpected member {}", member.user_id),
            ),
            Err(e) => log.warn(
                WorkflowStep::Verify,
                format!("failed to remove unexpected member {}: {}", member.user_id, e),
            ),
        }
    }

    let present: HashSet<UserId> = item.assignees.iter().map(|a| a.user_id).collect();
    let mut missing: Vec<UserId> = expected.difference(&present).copied().collect();
    missing.sort_unstable();
    for user_id in missing {
        drifted = true;
        log.warn(WorkflowStep::Verify, format!("member {} is missing", user_id));
    }

    if let Some(owner) = item.assignees.iter().find(|a| a.user_id == plan.owner_id) {
        if owner.role != MemberRole::Responsible {
            drifted = true;
            log.warn(
                WorkflowStep::Verify,
                format!("owner {} is not responsible", plan.owner_id),
            );
        }
    }

    if !drifted {
        log.done(WorkflowStep::Verify);
    }
}
