//! Per-action in-flight guard
//!
//! A network-triggering action may not start while a previous invocation of
//! the same action is pending. The guard is released when dropped, so every
//! exit path (success, error, panic unwinding) re-enables the action.

use crate::error::{IntakeError, IntakeResult};
use crate::models::WizardAction;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of actions currently pending
#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<WizardAction>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `action`, or fail with `Busy` if it is already pending
    pub fn try_begin(&self, action: WizardAction) -> IntakeResult<InFlightGuard> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if !active.insert(action) {
            tracing::debug!(%action, "Rejected duplicate submission");
            return Err(IntakeError::Busy(action));
        }
        Ok(InFlightGuard {
            active: Arc::clone(&self.active),
            action,
        })
    }

    /// Whether the trigger for `action` should be disabled
    pub fn is_active(&self, action: WizardAction) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&action)
    }
}

/// Releases its action on drop
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<WizardAction>>>,
    action: WizardAction,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.action);
    }
}
