//! Deployment lifecycle state machine.
//!
//! The remote reports a state on every poll; [`DeploymentPhase`] folds those
//! reports into a monotonic sequence of transitions:
//!
//! ```text
//! CREATING -> QUEUED | BUILDING | READY | ERROR | CANCELED
//! QUEUED   -> BUILDING | READY | ERROR | CANCELED
//! BUILDING -> READY | ERROR | CANCELED
//! ```
//!
//! Terminal states (`READY`, `ERROR`, `CANCELED`) absorb every later report.

use crate::types::DeploymentState;

/// Outcome of feeding one remote report into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The deployment moved forward. `from` is `None` for the first report.
    Advanced {
        from: Option<DeploymentState>,
        to: DeploymentState,
    },
    /// Same state as before.
    Unchanged,
    /// A report that would move the deployment backwards (or out of a
    /// terminal state). Ignored.
    Stale {
        current: DeploymentState,
        reported: DeploymentState,
    },
}

/// Locally tracked phase of one deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeploymentPhase {
    current: Option<DeploymentState>,
}

impl DeploymentPhase {
    /// Starts in the `CREATING` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last accepted state, or `None` while still creating.
    pub fn current(&self) -> Option<DeploymentState> {
        self.current
    }

    pub fn is_creating(&self) -> bool {
        self.current.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_some_and(DeploymentState::is_terminal)
    }

    /// Applies a state reported by the remote.
    pub fn observe(&mut self, reported: DeploymentState) -> Transition {
        let Some(current) = self.current else {
            self.current = Some(reported);
            return Transition::Advanced {
                from: None,
                to: reported,
            };
        };

        if reported == current {
            return Transition::Unchanged;
        }

        if current.is_terminal() || reported.rank() <= current.rank() {
            return Transition::Stale { current, reported };
        }

        self.current = Some(reported);
        Transition::Advanced {
            from: Some(current),
            to: reported,
        }
    }
}
