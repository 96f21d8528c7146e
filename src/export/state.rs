//! Export state machine.
//!
//! ```text
//! Idle -> Collecting -> Serializing -> Committing -> Pushing -> Done
//!                                           \---------------------^
//! any non-terminal state -> Cancelled | Failed
//! ```
//!
//! `Committing -> Done` is taken when there is nothing to commit.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportState {
    Idle,
    Collecting,
    Serializing,
    Committing,
    Pushing,
    Done,
    Cancelled,
    Failed,
}

impl ExportState {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportState::Idle => "idle",
            ExportState::Collecting => "collecting",
            ExportState::Serializing => "serializing",
            ExportState::Committing => "committing",
            ExportState::Pushing => "pushing",
            ExportState::Done => "done",
            ExportState::Cancelled => "cancelled",
            ExportState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportState::Done | ExportState::Cancelled | ExportState::Failed
        )
    }

    pub fn can_transition_to(self, next: ExportState) -> bool {
        use ExportState::*;

        if self.is_terminal() {
            return false;
        }

        matches!(
            (self, next),
            (Idle, Collecting)
                | (Collecting, Serializing)
                | (Serializing, Committing)
                | (Committing, Pushing)
                | (Committing, Done)
                | (Pushing, Done)
                | (_, Cancelled)
                | (_, Failed)
        )
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid export state transition from {from} to {to}")]
#[diagnostic(code(robocjk::export::invalid_transition))]
pub struct TransitionError {
    pub from: ExportState,
    pub to: ExportState,
}

/// Tracks the state of one export invocation.
#[derive(Debug)]
pub struct ExportStateMachine {
    state: ExportState,
}

impl Default for ExportStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportStateMachine {
    pub fn new() -> Self {
        Self {
            state: ExportState::Idle,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn advance(&mut self, next: ExportState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "Export state transition");
        self.state = next;
        Ok(())
    }
}
