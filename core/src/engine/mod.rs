//! # Continuation engine - replay-based suspend/resume
//!
//! A paused call chain is not kept on a stack of its own. Instead every
//! eligible activation saves a [`Frame`] while a suspend unwinds, and on
//! resume the entry routine runs again from the top with each activation
//! jumping straight to its recorded call site, until the replay reaches the
//! original `suspend` and execution carries on forward.
//!
//! ## Writing an eligible routine
//!
//! 1. Publish a static [`RoutineLayout`] and a call-site enum
//!    (see [`resume_points!`](crate::resume_points)).
//! 2. Open an [`Activation`] with [`StackRecorder::enter`] and take the
//!    replayed frame with [`Activation::restore`]; if present, jump to its
//!    call site using its locals and pending operands.
//! 3. Pass every call that can reach `suspend` through
//!    [`Activation::invoke`]; on `None`, return [`Activation::unwind`] with
//!    the call site, live locals and pending operands.
//!
//! Skipping any step corrupts the replay; the recorder fails loudly on every
//! mismatch it can see.

pub mod ambient;
pub mod catalog;
pub mod continuation;
pub mod interceptor;
pub mod recorder;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use catalog::{LayoutRegistry, RoutineCatalog};
pub use continuation::{Continuation, Outcome, Routine, Values};
pub use recorder::{Activation, Flow, Mode, Restored, Slots, StackRecorder};
pub use types::{Frame, FrameStack, Reference, ResumePoint, RoutineId, RoutineLayout, Value, ValueKind};
