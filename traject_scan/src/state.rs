//! Move lifecycle: Idle → Prepared → Executing → Completed/Failed → (Stopped) → Idle.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of one trajectory move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    /// Nothing built.
    #[default]
    Idle,
    /// Profile pushed and built, ready to start.
    Prepared,
    /// Execution task running.
    Executing,
    /// Execution finished successfully.
    Completed,
    /// Execution finished with an error.
    Failed,
    /// Stop issued, reset in progress.
    Stopped,
}

impl fmt::Display for MoveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveState::Idle => "Idle",
            MoveState::Prepared => "Prepared",
            MoveState::Executing => "Executing",
            MoveState::Completed => "Completed",
            MoveState::Failed => "Failed",
            MoveState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Event driving a [`MoveState`] transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEvent {
    /// Profile compiled, pushed and built.
    PrepareSucceeded,
    /// Any prepare step failed.
    PrepareFailed,
    /// Execution task spawned.
    Start,
    /// Execution task finished without error.
    ExecuteSucceeded,
    /// Execution task finished with an error.
    ExecuteFailed,
    /// Hardware stop issued.
    Stop,
    /// Buffer cleared and motors disabled after a stop.
    ResetComplete,
}

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition accepted, new state.
    Ok(MoveState),
    /// Transition rejected, reason.
    Rejected(&'static str),
}

/// Holds the current [`MoveState`] and applies the transition table.
#[derive(Debug, Clone, Default)]
pub struct MoveStateMachine {
    state: MoveState,
}

impl MoveStateMachine {
    /// State machine in `Idle`.
    pub const fn new() -> Self {
        Self {
            state: MoveState::Idle,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> MoveState {
        self.state
    }

    /// Attempt a transition.
    pub fn handle_event(&mut self, event: MoveEvent) -> TransitionResult {
        use MoveEvent::*;
        use MoveState::*;

        let next = match (self.state, event) {
            // prepare may be repeated from any settled state
            (Executing, PrepareSucceeded | PrepareFailed) => {
                return TransitionResult::Rejected("cannot prepare while executing");
            }
            (_, PrepareSucceeded) => Prepared,
            (_, PrepareFailed) => Idle,

            (Prepared, Start) => Executing,

            (Executing, ExecuteSucceeded) => Completed,
            (Executing, ExecuteFailed) => Failed,

            // stop is always accepted
            (_, Stop) => Stopped,
            (Stopped, ResetComplete) => Idle,

            (_, Start) => return TransitionResult::Rejected("start requires a prepared trajectory"),
            (_, ExecuteSucceeded | ExecuteFailed) => {
                return TransitionResult::Rejected("no execution in progress");
            }
            (_, ResetComplete) => return TransitionResult::Rejected("reset requires a stop"),
        };

        self.state = next;
        TransitionResult::Ok(next)
    }
}
