//! Per-thread registry of the running recorder
//!
//! Only for boundary code that cannot take a `&StackRecorder` parameter
//! (interception wrappers, callbacks from foreign APIs). Everything else
//! passes the recorder explicitly.
//!
//! The registry is a stack so a routine may start an unrelated continuation
//! of its own; the inner cycle shadows the outer one until it returns.

use super::recorder::{Flow, StackRecorder};
use super::types::Value;
use crate::errors::{ContinuationError, Result};
use std::cell::RefCell;

thread_local! {
    static RUNNING: RefCell<Vec<StackRecorder>> = RefCell::new(Vec::new());
}

/// Keeps a recorder registered until dropped
#[must_use]
pub(crate) struct AmbientGuard {
    _private: (),
}

pub(crate) fn install(recorder: StackRecorder) -> AmbientGuard {
    RUNNING.with(|running| running.borrow_mut().push(recorder));
    AmbientGuard { _private: () }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        RUNNING.with(|running| {
            running.borrow_mut().pop();
        });
    }
}

/// The recorder of the innermost continuation running on this thread
pub fn current() -> Option<StackRecorder> {
    RUNNING.with(|running| running.borrow().last().cloned())
}

/// Suspend through the registry
pub fn suspend(value: impl Into<Value>) -> Result<Flow<Value>> {
    let recorder = current().ok_or_else(|| {
        ContinuationError::illegal_state("suspend called outside a running continuation")
    })?;
    recorder.suspend(value)
}
