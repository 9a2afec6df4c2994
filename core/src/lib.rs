pub mod cli;
pub mod config;
pub mod demos;
pub mod engine;
pub mod errors;

// Re-export main types
pub use config::EngineConfig;
pub use engine::{
    Activation, Continuation, Flow, Frame, FrameStack, LayoutRegistry, Mode, Outcome, Reference,
    Routine, RoutineCatalog, RoutineLayout, StackRecorder, Value, ValueKind,
};
pub use errors::{ContinuationError, Result};
