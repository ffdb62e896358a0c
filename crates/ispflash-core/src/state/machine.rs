//! Phase tracking for the update orchestrator.

use crate::error::UpdateError;
use crate::events::UpdatePhase;

/// Current phase plus the rules for leaving it.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    phase: UpdatePhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Whether `from -> to` is a legal transition.
    ///
    /// Phases run strictly forward; any non-terminal phase may fail.
    pub fn is_allowed(from: UpdatePhase, to: UpdatePhase) -> bool {
        use UpdatePhase::*;
        match (from, to) {
            (Idle, Authenticating) | (Idle, ModeEntry) => true,
            (Authenticating, ModeEntry) => true,
            (ModeEntry, Erasing) => true,
            (Erasing, Programming) => true,
            (Programming, Verifying) => true,
            (Verifying, Finalizing) => true,
            (Finalizing, Success) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Transition to a new phase.
    pub fn goto(&mut self, to: UpdatePhase) -> Result<UpdatePhase, UpdateError> {
        let from = self.phase;
        if !Self::is_allowed(from, to) {
            return Err(UpdateError::InvalidTransition { from, to });
        }
        tracing::info!(from = %from, to = %to, "Phase transition");
        self.phase = to;
        Ok(from)
    }
}
