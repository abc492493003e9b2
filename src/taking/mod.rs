pub mod queue;
pub mod session;
pub mod timer;

pub use queue::*;
pub use session::*;
pub use timer::*;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle of one in-progress attempt, forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TakingPhase {
    /// Attempt fetched, test screen not shown yet. The server-side deadline
    /// may already be ticking.
    Instructions,
    /// Question on screen, countdown running.
    InProgress,
    /// Completion call issued (by the user or the timer); edits suspended.
    Submitting,
    /// Navigated away, timer cancelled.
    Terminated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TakingError {
    #[error("No test is currently in progress")]
    NoActiveSession,
    #[error("The test has not been started yet")]
    NotStarted,
    #[error("Answers can no longer be changed while the test is being submitted")]
    EditsSuspended,
    #[error("The test was already submitted")]
    AlreadySubmitted,
}
