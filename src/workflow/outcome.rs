//! Per-step results of the remote-mutating workflows
//!
//! Assign and undo run a fixed sequence of gateway calls. A fatal failure
//! aborts the sequence with [`AppError::StepFailed`](crate::error::AppError);
//! everything else is recorded here as done, skipped or a drift warning.

use serde::Serialize;

/// A step of the assign or undo sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Snapshot,
    ClearAssignees,
    AddOwner,
    PromoteOwner,
    AddCoOwners,
    AddComment,
    ReconcileDefer,
    Relocate,
    Verify,
    RestoreAssignees,
    RestoreLocation,
    Refresh,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Snapshot => "snapshot",
            WorkflowStep::ClearAssignees => "clear_assignees",
            WorkflowStep::AddOwner => "add_owner",
            WorkflowStep::PromoteOwner => "promote_owner",
            WorkflowStep::AddCoOwners => "add_co_owners",
            WorkflowStep::AddComment => "add_comment",
            WorkflowStep::ReconcileDefer => "reconcile_defer",
            WorkflowStep::Relocate => "relocate",
            WorkflowStep::Verify => "verify",
            WorkflowStep::RestoreAssignees => "restore_assignees",
            WorkflowStep::RestoreLocation => "restore_location",
            WorkflowStep::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Skipped(String),
    Warning(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: WorkflowStep,
    pub status: StepStatus,
}

/// Ordered reports of a completed (possibly degraded) sequence
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    reports: Vec<StepReport>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done(&mut self, step: WorkflowStep) {
        self.push(step, StepStatus::Done);
    }

    pub fn skipped(&mut self, step: WorkflowStep, reason: impl Into<String>) {
        self.push(step, StepStatus::Skipped(reason.into()));
    }

    /// Record a drift warning; it is logged immediately and returned to the caller later
    pub fn warn(&mut self, step: WorkflowStep, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(step = %step, "{}", message);
        self.push(step, StepStatus::Warning(message));
    }

    fn push(&mut self, step: WorkflowStep, status: StepStatus) {
        self.reports.push(StepReport { step, status });
    }

    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    /// Warnings rendered as `step: message`, in the order they occurred
    pub fn warnings(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter_map(|r| match &r.status {
                StepStatus::Warning(msg) => Some(format!("{}: {}", r.step, msg)),
                _ => None,
            })
            .collect()
    }

    pub fn status_of(&self, step: WorkflowStep) -> Option<&StepStatus> {
        self.reports
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.status)
    }
}
