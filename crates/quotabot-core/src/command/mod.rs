//! Command layer: flow lifecycle helpers and the fee-registration command.
//!
//! Commands orchestrate a sequence of steps for one business flow. All
//! side effects (persisting, sending, tracking) live here; the steps
//! themselves stay pure.

pub mod fee;
pub mod flow;

pub use fee::{FeeCommand, FeeDraft, FeeFlavor, FeeStep};
pub use flow::{CleanupReport, Flow};

use uuid::Uuid;

/// What handling one inbound event did to a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Flow started (or restarted), first prompt sent.
    Started,
    /// Valid input accepted, session advanced to the named step.
    Advanced { step: String },
    /// Input rejected by the step; the error was re-presented and the
    /// step did not move. The expected ask-again path, not a failure.
    Rejected,
    /// Keyboard refreshed in place without advancing (pagination).
    KeyboardUpdated,
    /// The event reached a command but did not apply to its current step
    /// (stale button, cancel with nothing to cancel).
    Ignored,
    /// Flow finished: the record is stored and the session is gone.
    Completed { transaction_id: Uuid },
    /// Session cancelled by the user.
    Cancelled,
    /// A store failure was degraded to a retry message; nothing advanced.
    RetryLater,
}
