//! Inbox workflow: which card is in focus, and what skip, assign and undo do
//!
//! The selection logic is pure ([`focus`]); the remote-mutating sequences
//! ([`assign`], [`undo`]) report each step through [`outcome`]. [`InboxWorkflow`]
//! owns the shared state and serializes the operations.

pub mod assign;
pub mod focus;
pub mod ledger;
pub mod manager;
pub mod outcome;
pub mod undo;

pub use focus::{select_focus, Focus, QueueSnapshot};
pub use ledger::{DeferLedger, DeferredEntry};
pub use manager::{InboxWorkflow, WorkflowConfig};
pub use outcome::{StepLog, StepReport, StepStatus, WorkflowStep};
pub use undo::{UndoLedger, UndoRecord};
