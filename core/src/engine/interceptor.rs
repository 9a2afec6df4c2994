//! Interception balance helpers
//!
//! A wrapper that is not itself eligible but sits between an eligible caller
//! and an eligible target would run its own logic again on every replay.
//! The wrapper brackets its delegation instead:
//!
//! ```text
//! let target = match before_execution()? {
//!     Some(saved) => saved,          // replaying: skip wrapper logic
//!     None => { wrapper logic; pick target }
//! };
//! let flow = call(target);
//! after_execution(target)?;          // capturing: remember target
//! flow
//! ```

use super::ambient;
use super::catalog::RoutineCatalog;
use super::recorder::StackRecorder;
use super::types::Reference;
use crate::errors::Result;

/// Before delegating: while restoring, the reference saved on capture
pub fn before_execution_on(recorder: &StackRecorder) -> Result<Option<Reference>> {
    if recorder.is_restoring() {
        recorder.pop_reference().map(Some)
    } else {
        Ok(None)
    }
}

/// After delegating: while capturing, save `target` for the next restore
pub fn after_execution_on(recorder: &StackRecorder, target: Reference) -> Result<()> {
    if recorder.is_capturing() {
        recorder.push_reference(target)
    } else {
        Ok(())
    }
}

/// [`before_execution_on`] against the recorder running on this thread
pub fn before_execution() -> Result<Option<Reference>> {
    match ambient::current() {
        Some(recorder) => before_execution_on(&recorder),
        None => Ok(None),
    }
}

/// [`after_execution_on`] against the recorder running on this thread
pub fn after_execution(target: Reference) -> Result<()> {
    match ambient::current() {
        Some(recorder) => after_execution_on(&recorder, target),
        None => Ok(()),
    }
}

/// Whether `name` is an eligible (instrumented) routine
pub fn is_instrumented(catalog: &dyn RoutineCatalog, name: &str) -> bool {
    catalog.is_eligible(name)
}
