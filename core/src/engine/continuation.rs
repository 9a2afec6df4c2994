//! Continuation handles
//!
//! `start` runs an entry routine until it finishes or first suspends.
//! `resume` replays the saved frames on a fresh recorder until the chain is
//! back at the suspension point, then carries on forward. A continuation can
//! be resumed once; the handle itself is `Send + Sync` so the next cycle may
//! run on another thread.

use super::ambient;
use super::catalog::RoutineCatalog;
use super::recorder::{Finish, Flow, StackRecorder};
use super::types::{FrameStack, Reference, Value};
use crate::config::EngineConfig;
use crate::errors::{ContinuationError, Result};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/* ===================== Routine ===================== */

/// Entry point of a logical call chain
///
/// Runs from the top on every cycle; eligible code below it follows the
/// activation protocol on the recorder it is handed.
pub trait Routine: Send + Sync {
    fn run(&self, recorder: &StackRecorder) -> Result<Flow<Value>>;

    fn name(&self) -> &str {
        "<entry>"
    }
}

impl<F> Routine for F
where
    F: Fn(&StackRecorder) -> Result<Flow<Value>> + Send + Sync,
{
    fn run(&self, recorder: &StackRecorder) -> Result<Flow<Value>> {
        self(recorder)
    }
}

/* ===================== Outcome ===================== */

/// What one `start`/`resume` cycle produced
#[derive(Debug)]
pub enum Outcome {
    /// The chain paused; resume the continuation to carry on
    Suspended(Continuation),
    /// The entry routine returned
    Finished(Value),
}

impl Outcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Finished(_))
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        match self {
            Outcome::Suspended(c) => Some(c),
            Outcome::Finished(_) => None,
        }
    }

    pub fn into_continuation(self) -> Option<Continuation> {
        match self {
            Outcome::Suspended(c) => Some(c),
            Outcome::Finished(_) => None,
        }
    }

    /// Iterate over every suspended value, resuming with `Null` each time
    pub fn into_values(self) -> Values {
        match self {
            Outcome::Suspended(c) => Values {
                current: Some(c),
                fresh: true,
                result: None,
            },
            Outcome::Finished(v) => Values {
                current: None,
                fresh: false,
                result: Some(v),
            },
        }
    }
}

/* ===================== Continuation ===================== */

enum Snapshot {
    /// Not started yet; the first resume runs the entry from the top
    Fresh,
    Captured {
        frames: FrameStack,
        references: Vec<Reference>,
    },
}

struct Shared {
    id: Uuid,
    entry: Arc<dyn Routine>,
    config: Arc<EngineConfig>,
    value: Value,
    snapshot: Mutex<Option<Snapshot>>,
}

/// Single-use handle on a paused call chain
#[derive(Clone)]
pub struct Continuation {
    shared: Arc<Shared>,
}

impl Continuation {
    /// Run `entry` until it finishes or first suspends
    pub fn start(entry: impl Routine + 'static) -> Result<Outcome> {
        Self::start_with_config(entry, EngineConfig::default())
    }

    pub fn start_with_config(entry: impl Routine + 'static, config: EngineConfig) -> Result<Outcome> {
        drive(Arc::new(entry), Arc::new(config), None)
    }

    /// A continuation that has not run yet
    ///
    /// Its value is `Null`; the first resume behaves like `start`.
    pub fn start_suspended(entry: impl Routine + 'static) -> Continuation {
        Self::from_parts(
            Uuid::new_v4(),
            Arc::new(entry),
            Arc::new(EngineConfig::default()),
            Value::Null,
            Snapshot::Fresh,
        )
    }

    /// Rebuild a continuation around a frame stack held outside the engine
    ///
    /// The stack is checked against `catalog` first; the rebuilt
    /// continuation's value is `Null`.
    pub fn restore_from(
        entry: impl Routine + 'static,
        frames: FrameStack,
        catalog: &dyn RoutineCatalog,
    ) -> Result<Continuation> {
        let config = EngineConfig::default();
        frames.validate(catalog, config.max_frames)?;

        Ok(Self::from_parts(
            Uuid::new_v4(),
            Arc::new(entry),
            Arc::new(config),
            Value::Null,
            Snapshot::Captured {
                frames,
                references: Vec::new(),
            },
        ))
    }

    fn from_parts(
        id: Uuid,
        entry: Arc<dyn Routine>,
        config: Arc<EngineConfig>,
        value: Value,
        snapshot: Snapshot,
    ) -> Self {
        Continuation {
            shared: Arc::new(Shared {
                id,
                entry,
                config,
                value,
                snapshot: Mutex::new(Some(snapshot)),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Value passed to the `suspend` that produced this continuation
    pub fn value(&self) -> &Value {
        &self.shared.value
    }

    /// Whether a resume already consumed this continuation
    pub fn is_resumed(&self) -> bool {
        self.lock().is_none()
    }

    /// Number of saved frames; zero once resumed or before the first run
    pub fn depth(&self) -> usize {
        match &*self.lock() {
            Some(Snapshot::Captured { frames, .. }) => frames.len(),
            _ => 0,
        }
    }

    /// Copy of the saved frames, outermost first
    pub fn frame_stack(&self) -> Option<FrameStack> {
        match &*self.lock() {
            Some(Snapshot::Captured { frames, .. }) => Some(frames.clone()),
            _ => None,
        }
    }

    pub fn resume(&self) -> Result<Outcome> {
        self.resume_with(Value::Null)
    }

    /// Resume; `value` becomes the return value of the replayed `suspend`
    pub fn resume_with(&self, value: impl Into<Value>) -> Result<Outcome> {
        let snapshot = self
            .lock()
            .take()
            .ok_or(ContinuationError::AlreadyResumed { id: self.shared.id })?;

        let restore = match snapshot {
            Snapshot::Fresh => None,
            Snapshot::Captured { frames, references } => Some((frames, references, value.into())),
        };
        drive(self.shared.entry.clone(), self.shared.config.clone(), restore)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        self.shared
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("id", &self.shared.id)
            .field("entry", &self.shared.entry.name())
            .field("value", &self.shared.value)
            .field("depth", &self.depth())
            .finish()
    }
}

/* ===================== Driver ===================== */

/// Run one cycle of `entry` on a fresh recorder
fn drive(
    entry: Arc<dyn Routine>,
    config: Arc<EngineConfig>,
    restore: Option<(FrameStack, Vec<Reference>, Value)>,
) -> Result<Outcome> {
    let recorder = StackRecorder::new(config);
    let span = tracing::debug_span!("continuation", recorder = %recorder.id(), entry = entry.name());
    let _span = span.enter();

    if let Some((frames, references, resume_value)) = restore {
        debug!(depth = frames.len(), "resuming");
        recorder.begin_restore(frames, references, resume_value)?;
    }

    let flow = {
        let _ambient = ambient::install(recorder.clone());
        entry.run(&recorder)?
    };

    match recorder.finish(flow)? {
        Finish::Completed(value) => {
            debug!("entry routine finished");
            Ok(Outcome::Finished(value))
        }
        Finish::Suspended {
            value,
            frames,
            references,
        } => {
            debug!(depth = frames.len(), value = %value, "entry routine suspended");
            Ok(Outcome::Suspended(Continuation::from_parts(
                recorder.id(),
                entry,
                recorder.shared_config(),
                value,
                Snapshot::Captured { frames, references },
            )))
        }
    }
}

/* ===================== Values ===================== */

/// Successive suspended values of one call chain
///
/// Ends when the chain finishes; [`Values::result`] then holds the entry
/// routine's return value. An error is yielded once and ends the iteration.
#[derive(Debug)]
pub struct Values {
    current: Option<Continuation>,
    fresh: bool,
    result: Option<Value>,
}

impl Values {
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }
}

impl Iterator for Values {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if self.fresh {
            self.fresh = false;
            let value = current.value().clone();
            self.current = Some(current);
            return Some(Ok(value));
        }

        match current.resume() {
            Ok(Outcome::Suspended(next)) => {
                let value = next.value().clone();
                self.current = Some(next);
                Some(Ok(value))
            }
            Ok(Outcome::Finished(v)) => {
                self.result = Some(v);
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}
