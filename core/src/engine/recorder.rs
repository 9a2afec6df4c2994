//! Stack recorder - the per-cycle capture/restore state machine
//!
//! ```text
//! Normal --suspend--> Capturing --unwind done--> Suspended
//!    ^                    ^
//!    |                    | suspend after forward resumption
//! Restoring --replay reaches suspend--> Normal
//! ```
//!
//! Instrumented code gets the recorder explicitly as `&StackRecorder` and
//! talks to it through an [`Activation`] opened on entry.

use super::types::{Frame, FrameStack, Reference, ResumePoint, RoutineLayout, Value};
use crate::config::EngineConfig;
use crate::errors::{ContinuationError, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/* ===================== Flow ===================== */

/// What an instrumented routine hands back to its caller
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    /// Ran to completion with a value
    Return(T),
    /// A capture is unwinding; the caller must save its frame and return too
    Unwind,
}

impl<T> Flow<T> {
    pub fn is_unwind(&self) -> bool {
        matches!(self, Flow::Unwind)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Flow<U> {
        match self {
            Flow::Return(v) => Flow::Return(f(v)),
            Flow::Unwind => Flow::Unwind,
        }
    }
}

/* ===================== Mode ===================== */

/// Recorder mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// Plain forward execution
    Normal = 0,
    /// Unwinding after a suspend; every activation saves a frame
    Capturing = 1,
    /// Unwind finished and the frames were handed off
    Suspended = 2,
    /// Replaying saved frames back down to the suspension point
    Restoring = 3,
}

/* ===================== Recorder ===================== */

#[derive(Debug)]
struct RecorderState {
    mode: Mode,
    frames: FrameStack,
    references: Vec<Reference>,
    suspended_value: Option<Value>,
    resume_value: Option<Value>,
    /// Activations entered and not yet dropped
    live: usize,
    live_at_suspend: usize,
}

/// Result of driving one cycle to its end
#[derive(Debug)]
pub(crate) enum Finish<T> {
    Completed(T),
    Suspended {
        value: Value,
        frames: FrameStack,
        references: Vec<Reference>,
    },
}

/// Capture/restore state for one logical call chain
///
/// Cloning is cheap and yields a handle to the same state. The handle is not
/// `Send`: a recorder lives on the thread running its cycle.
#[derive(Debug, Clone)]
pub struct StackRecorder {
    id: Uuid,
    state: Rc<RefCell<RecorderState>>,
    config: Arc<EngineConfig>,
}

impl StackRecorder {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Rc::new(RefCell::new(RecorderState {
                mode: Mode::Normal,
                frames: FrameStack::new(),
                references: Vec::new(),
                suspended_value: None,
                resume_value: None,
                live: 0,
                live_at_suspend: 0,
            })),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<EngineConfig> {
        self.config.clone()
    }

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn is_capturing(&self) -> bool {
        self.mode() == Mode::Capturing
    }

    pub fn is_restoring(&self) -> bool {
        self.mode() == Mode::Restoring
    }

    /// Frames saved (while capturing) or still to replay (while restoring)
    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn pending_references(&self) -> usize {
        self.state.borrow().references.len()
    }

    /// Value passed to the suspend that started the current capture
    pub fn suspended_value(&self) -> Option<Value> {
        self.state.borrow().suspended_value.clone()
    }

    fn transition(&self, state: &mut RecorderState, to: Mode) {
        debug!(recorder = %self.id, from = ?state.mode, to = ?to, "recorder mode transition");
        state.mode = to;
    }

    /* ----- suspend / capture ----- */

    /// Pause the chain, or return the resume value when this is the replayed suspend
    pub fn suspend(&self, value: impl Into<Value>) -> Result<Flow<Value>> {
        if self.is_restoring() {
            return self.reach_suspension_point().map(Flow::Return);
        }
        self.start_capture(value.into())?;
        Ok(Flow::Unwind)
    }

    /// Switch `Normal -> Capturing`, recording `value`
    pub fn start_capture(&self, value: Value) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.mode != Mode::Normal {
            return Err(ContinuationError::illegal_state(format!(
                "suspend called while recorder is {:?}",
                st.mode
            )));
        }
        if st.live == 0 {
            return Err(ContinuationError::violation(
                "<suspend>",
                "suspend reached outside any instrumented activation",
            ));
        }
        st.suspended_value = Some(value);
        st.live_at_suspend = st.live;
        self.transition(&mut st, Mode::Capturing);
        Ok(())
    }

    fn reach_suspension_point(&self) -> Result<Value> {
        let mut st = self.state.borrow_mut();
        if let Some(next) = st.frames.outermost() {
            return Err(ContinuationError::violation(
                next.routine.name.to_string(),
                format!(
                    "suspend reached with {} saved frames not yet replayed",
                    st.frames.len()
                ),
            ));
        }
        if !st.references.is_empty() {
            return Err(ContinuationError::violation(
                "<interceptor>",
                format!(
                    "{} interception references were never popped",
                    st.references.len()
                ),
            ));
        }
        let value = st.resume_value.take().unwrap_or(Value::Null);
        self.transition(&mut st, Mode::Normal);
        debug!(recorder = %self.id, "replay reached suspension point");
        Ok(value)
    }

    fn save_frame(&self, frame: Frame) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.mode != Mode::Capturing {
            return Err(ContinuationError::violation(
                frame.routine.name.to_string(),
                format!("frame saved while recorder is {:?}", st.mode),
            ));
        }
        if st.frames.len() >= self.config.max_frames {
            return Err(ContinuationError::illegal_state(format!(
                "capture exceeds the limit of {} frames",
                self.config.max_frames
            )));
        }
        trace!(
            recorder = %self.id,
            routine = %frame.routine.name,
            call_site = frame.call_site,
            depth = st.frames.len(),
            "saved frame"
        );
        st.frames.push_outer(frame);
        Ok(())
    }

    /* ----- restore ----- */

    /// Install a captured stack and switch `Normal -> Restoring`
    ///
    /// `resume_value` is what the replayed `suspend` will return.
    pub fn begin_restore(
        &self,
        frames: FrameStack,
        references: Vec<Reference>,
        resume_value: Value,
    ) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.mode != Mode::Normal
            || st.live > 0
            || !st.frames.is_empty()
            || st.suspended_value.is_some()
        {
            return Err(ContinuationError::illegal_state(format!(
                "cannot restore on a busy recorder ({:?}, {} live activations)",
                st.mode, st.live
            )));
        }
        if frames.is_empty() {
            return Err(ContinuationError::invalid("cannot restore an empty frame stack"));
        }
        if frames.len() > self.config.max_frames {
            return Err(ContinuationError::invalid(format!(
                "frame stack holds {} frames, limit is {}",
                frames.len(),
                self.config.max_frames
            )));
        }

        st.frames = frames;
        st.references = references;
        st.resume_value = Some(resume_value);
        self.transition(&mut st, Mode::Restoring);
        Ok(())
    }

    /* ----- activations ----- */

    /// Open the activation of an eligible routine
    ///
    /// While restoring this pops the routine's saved frame, which the routine
    /// must then take with [`Activation::restore`].
    pub fn enter(&self, layout: &'static RoutineLayout) -> Result<Activation> {
        let mut st = self.state.borrow_mut();
        let restored = match st.mode {
            Mode::Normal => None,
            Mode::Restoring => {
                let frame = st.frames.pop_outer().ok_or_else(|| {
                    ContinuationError::violation(
                        layout.name(),
                        "entered after every saved frame was replayed",
                    )
                })?;
                if frame.routine.fingerprint != layout.fingerprint()
                    || frame.routine.name != layout.name()
                {
                    return Err(ContinuationError::violation(
                        layout.name(),
                        format!("replayed frame was saved by `{}`", frame.routine),
                    ));
                }
                trace!(
                    recorder = %self.id,
                    routine = layout.name(),
                    call_site = frame.call_site,
                    remaining = st.frames.len(),
                    "popped frame"
                );
                Some(frame)
            }
            Mode::Capturing => {
                return Err(ContinuationError::violation(
                    layout.name(),
                    "entered while a capture is unwinding",
                ))
            }
            Mode::Suspended => {
                return Err(ContinuationError::illegal_state(
                    "recorder already suspended; resume the continuation instead",
                ))
            }
        };
        st.live += 1;

        Ok(Activation {
            recorder: self.clone(),
            layout,
            restored,
        })
    }

    /* ----- interception balance ----- */

    /// Keep a wrapper's reference so the next restore can skip the wrapper
    pub fn push_reference(&self, reference: Reference) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.mode != Mode::Capturing {
            return Err(ContinuationError::illegal_state(format!(
                "references are pushed only while capturing, recorder is {:?}",
                st.mode
            )));
        }
        st.references.push(reference);
        Ok(())
    }

    /// Take the reference a wrapper saved during the capture being replayed
    pub fn pop_reference(&self) -> Result<Reference> {
        let mut st = self.state.borrow_mut();
        if st.mode != Mode::Restoring {
            return Err(ContinuationError::illegal_state(format!(
                "references are popped only while restoring, recorder is {:?}",
                st.mode
            )));
        }
        st.references.pop().ok_or_else(|| {
            ContinuationError::violation(
                "<interceptor>",
                "wrapper expected a saved reference but none is left",
            )
        })
    }

    /* ----- cycle end ----- */

    /// Settle what the entry routine returned
    pub(crate) fn finish<T>(&self, flow: Flow<T>) -> Result<Finish<T>> {
        let mut st = self.state.borrow_mut();
        match (flow, st.mode) {
            (Flow::Return(v), Mode::Normal) => Ok(Finish::Completed(v)),

            (Flow::Unwind, Mode::Capturing) => {
                if st.frames.len() != st.live_at_suspend {
                    return Err(ContinuationError::violation(
                        "<entry>",
                        format!(
                            "{} activations were live at suspend but {} frames were saved",
                            st.live_at_suspend,
                            st.frames.len()
                        ),
                    ));
                }
                self.transition(&mut st, Mode::Suspended);

                let frames = std::mem::take(&mut st.frames);
                if self.config.trace_frames {
                    match frames.to_json() {
                        Ok(json) => debug!(recorder = %self.id, frames = %json, "captured frame stack"),
                        Err(_) => debug!(
                            recorder = %self.id,
                            depth = frames.len(),
                            "captured frame stack holds in-process references"
                        ),
                    }
                }

                Ok(Finish::Suspended {
                    value: st.suspended_value.take().unwrap_or(Value::Null),
                    frames,
                    references: std::mem::take(&mut st.references),
                })
            }

            (Flow::Return(_), Mode::Capturing) => Err(ContinuationError::violation(
                "<entry>",
                "returned normally while a capture was unwinding",
            )),

            (Flow::Return(_), Mode::Restoring) => Err(ContinuationError::violation(
                "<entry>",
                format!(
                    "completed with {} saved frames never replayed",
                    st.frames.len()
                ),
            )),

            (Flow::Return(_), Mode::Suspended) => Err(ContinuationError::illegal_state(
                "cycle finished twice on one recorder",
            )),

            (Flow::Unwind, mode) => Err(ContinuationError::violation(
                "<entry>",
                format!("unwound while recorder is {:?}", mode),
            )),
        }
    }
}

/* ===================== Activation ===================== */

/// One live activation of an eligible routine
///
/// Dropping it marks the activation finished.
#[derive(Debug)]
pub struct Activation {
    recorder: StackRecorder,
    layout: &'static RoutineLayout,
    restored: Option<Frame>,
}

/// Frame contents handed back to a re-entered activation
#[derive(Debug)]
pub struct Restored<P> {
    /// Call site to jump to
    pub point: P,
    pub locals: Slots,
    pub operands: Slots,
}

impl Activation {
    pub fn layout(&self) -> &'static RoutineLayout {
        self.layout
    }

    pub fn recorder(&self) -> &StackRecorder {
        &self.recorder
    }

    /// Whether a frame was popped for this activation and not yet taken
    pub fn is_replaying(&self) -> bool {
        self.restored.is_some()
    }

    /// Take the frame popped on entry, if any
    pub fn restore<P: ResumePoint>(&mut self) -> Result<Option<Restored<P>>> {
        let Some(frame) = self.restored.take() else {
            return Ok(None);
        };
        let name = self.layout.name();

        if frame.call_site >= self.layout.call_sites() {
            return Err(ContinuationError::violation(
                name,
                format!(
                    "replayed call site {} but the routine declares {}",
                    frame.call_site,
                    self.layout.call_sites()
                ),
            ));
        }
        let point = P::from_index(frame.call_site).ok_or_else(|| {
            ContinuationError::violation(
                name,
                format!("call site {} has no resume point", frame.call_site),
            )
        })?;

        Ok(Some(Restored {
            point,
            locals: Slots::new(name, "local", frame.locals),
            operands: Slots::new(name, "operand", frame.operands),
        }))
    }

    /// Check the outcome of a call made at one of this routine's call sites
    ///
    /// `Some(value)` when the callee returned, `None` when it unwound and
    /// this activation must now [`unwind`](Self::unwind) as well.
    pub fn invoke<T>(&self, flow: Result<Flow<T>>) -> Result<Option<T>> {
        let flow = flow?;
        let name = self.layout.name();
        if self.restored.is_some() {
            return Err(ContinuationError::violation(
                name,
                "made a call without restoring the frame popped on entry",
            ));
        }

        let capturing = self.recorder.is_capturing();
        match flow {
            Flow::Return(v) if !capturing => Ok(Some(v)),
            Flow::Unwind if capturing => Ok(None),
            Flow::Return(_) => Err(ContinuationError::violation(
                name,
                "callee returned normally while a capture is unwinding",
            )),
            Flow::Unwind => Err(ContinuationError::violation(
                name,
                "callee unwound but no capture is in progress",
            )),
        }
    }

    /// Save this activation's frame and pass the unwind to the caller
    pub fn unwind<P: ResumePoint, T>(
        self,
        point: P,
        locals: Vec<Value>,
        operands: Vec<Value>,
    ) -> Result<Flow<T>> {
        let name = self.layout.name();
        let index = point.index();

        if index >= self.layout.call_sites() {
            return Err(ContinuationError::violation(
                name,
                format!(
                    "saved call site {} but the routine declares {}",
                    index,
                    self.layout.call_sites()
                ),
            ));
        }

        if self.recorder.config().verify_layouts {
            let kinds = self.layout.locals();
            if locals.len() != kinds.len() {
                return Err(ContinuationError::violation(
                    name,
                    format!("saved {} locals, layout declares {}", locals.len(), kinds.len()),
                ));
            }
            if let Some((slot, (value, kind))) = locals
                .iter()
                .zip(kinds)
                .enumerate()
                .find(|(_, (v, k))| !v.fits(**k))
            {
                return Err(ContinuationError::violation(
                    name,
                    format!("local {} holds {:?}, layout declares {:?}", slot, value, kind),
                ));
            }
        }

        self.recorder.save_frame(Frame {
            routine: self.layout.id(),
            call_site: index,
            locals,
            operands,
        })?;
        Ok(Flow::Unwind)
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        if let Ok(mut st) = self.recorder.state.try_borrow_mut() {
            st.live = st.live.saturating_sub(1);
        }
    }
}

/* ===================== Slots ===================== */

/// Saved values read back in declaration order
#[derive(Debug)]
pub struct Slots {
    routine: &'static str,
    what: &'static str,
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Slots {
    fn new(routine: &'static str, what: &'static str, values: Vec<Value>) -> Self {
        Self {
            routine,
            what,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Slots not read yet
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn next_value(&mut self) -> Result<Value> {
        let value = self.values.next().ok_or_else(|| {
            ContinuationError::violation(
                self.routine,
                format!("{} slot {} was not saved", self.what, self.position),
            )
        })?;
        self.position += 1;
        Ok(value)
    }

    fn mismatch(&self, expected: &str, found: &Value) -> ContinuationError {
        ContinuationError::violation(
            self.routine,
            format!(
                "{} slot {} holds {:?}, expected {}",
                self.what,
                self.position.saturating_sub(1),
                found,
                expected
            ),
        )
    }

    pub fn next_bool(&mut self) -> Result<bool> {
        let v = self.next_value()?;
        v.as_bool().ok_or_else(|| self.mismatch("Bool", &v))
    }

    pub fn next_int(&mut self) -> Result<i64> {
        let v = self.next_value()?;
        v.as_int().ok_or_else(|| self.mismatch("Int", &v))
    }

    pub fn next_float(&mut self) -> Result<f64> {
        let v = self.next_value()?;
        v.as_float().ok_or_else(|| self.mismatch("Float", &v))
    }

    pub fn next_str(&mut self) -> Result<String> {
        match self.next_value()? {
            Value::Str(s) => Ok(s),
            other => Err(self.mismatch("Str", &other)),
        }
    }

    pub fn next_list(&mut self) -> Result<Vec<Value>> {
        match self.next_value()? {
            Value::List(items) => Ok(items),
            other => Err(self.mismatch("List", &other)),
        }
    }

    pub fn next_ref(&mut self) -> Result<Reference> {
        match self.next_value()? {
            Value::Ref(r) => Ok(r),
            other => Err(self.mismatch("Ref", &other)),
        }
    }
}
