//! Type definitions for the engine
//!
//! - Values saved in frames (Value, ValueKind, Reference)
//! - Routine layouts and call-site enums (RoutineLayout, RoutineId, ResumePoint)
//! - Frames and the frame stack (Frame, FrameStack)

pub mod frame;
pub mod layout;
pub mod values;

pub use frame::{Frame, FrameStack};
pub use layout::{ResumePoint, RoutineId, RoutineLayout};
pub use values::{Reference, Value, ValueKind};
