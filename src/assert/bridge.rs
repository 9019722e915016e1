//! Assertion bridge
//!
//! The single hook through which passing assertions reach whoever is
//! listening. The scheduler installs a hook for the duration of one test and
//! clears it afterwards; an isolate installs its own private hook.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// One successful assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionEvent {
    /// Run-wide sequence number, strictly increasing
    pub sequence: u64,
    pub operator: String,
    pub message: String,
}

/// Callback invoked on every passing assertion
pub type PassHook = Box<dyn Fn(AssertionEvent) + Send + Sync>;

/// Hook registration point shared by the assertion collaborator and the
/// scheduler
#[derive(Default)]
pub struct Bridge {
    hook: Mutex<Option<PassHook>>,
    sequence: AtomicU64,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `hook`, replacing any previous one
    pub fn on_pass(&self, hook: PassHook) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Remove the installed hook
    pub fn clear(&self) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_hooked(&self) -> bool {
        self.hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Deliver a passing assertion.
    ///
    /// Returns `false` when no hook is installed; the event is dropped and no
    /// sequence number is consumed.
    pub fn report(&self, operator: &str, message: &str) -> bool {
        let guard = self.hook.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(hook) => {
                hook(AssertionEvent {
                    sequence: self.next_sequence(),
                    operator: operator.to_string(),
                    message: message.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Consume the next sequence number
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last sequence number handed out
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Start numbering from zero for a new run
    pub fn reset(&self) {
        self.clear();
        self.sequence.store(0, Ordering::SeqCst);
    }
}
