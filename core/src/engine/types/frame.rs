//! Saved activation frames
//!
//! A [`FrameStack`] is always ordered outermost caller first. Capture runs
//! innermost-out, so frames are prepended as the unwind climbs; restore
//! re-enters from the top, so frames are popped from the front.

use super::layout::RoutineId;
use super::values::Value;
use crate::engine::catalog::RoutineCatalog;
use crate::errors::{ContinuationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Saved state of one paused activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Routine that saved this frame
    pub routine: RoutineId,
    /// Call site that was active when the unwind passed through
    pub call_site: u32,
    /// Live locals in declaration order
    pub locals: Vec<Value>,
    /// Values computed for the current call-site expression but not yet consumed
    pub operands: Vec<Value>,
}

/// The full paused call chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStack {
    frames: VecDeque<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record the frame of the activation enclosing everything saved so far
    pub(crate) fn push_outer(&mut self, frame: Frame) {
        self.frames.push_front(frame);
    }

    /// Take the outermost frame not yet replayed
    pub(crate) fn pop_outer(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Frames, outermost first
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn outermost(&self) -> Option<&Frame> {
        self.frames.front()
    }

    pub fn innermost(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Check a stack that did not come straight out of a capture
    ///
    /// Every frame must name a routine the catalog knows, with a matching
    /// fingerprint, an existing call site and locals that fit the layout.
    pub fn validate(&self, catalog: &dyn RoutineCatalog, max_frames: usize) -> Result<()> {
        if self.frames.is_empty() {
            return Err(ContinuationError::invalid("frame stack is empty"));
        }
        if self.frames.len() > max_frames {
            return Err(ContinuationError::invalid(format!(
                "frame stack holds {} frames, limit is {}",
                self.frames.len(),
                max_frames
            )));
        }

        for (depth, frame) in self.frames.iter().enumerate() {
            let layout = catalog.layout(&frame.routine.name).ok_or_else(|| {
                ContinuationError::invalid(format!(
                    "frame {} names unknown routine `{}`",
                    depth, frame.routine.name
                ))
            })?;

            if layout.fingerprint() != frame.routine.fingerprint {
                return Err(ContinuationError::invalid(format!(
                    "frame {} was saved by a different layout of `{}`",
                    depth, frame.routine.name
                )));
            }

            if frame.call_site >= layout.call_sites() {
                return Err(ContinuationError::invalid(format!(
                    "frame {} points at call site {} but `{}` has {}",
                    depth,
                    frame.call_site,
                    layout.name(),
                    layout.call_sites()
                )));
            }

            let kinds = layout.locals();
            if frame.locals.len() != kinds.len()
                || !frame.locals.iter().zip(kinds).all(|(v, k)| v.fits(*k))
            {
                return Err(ContinuationError::invalid(format!(
                    "frame {} locals do not match the layout of `{}`",
                    depth,
                    layout.name()
                )));
            }
        }

        Ok(())
    }

    /// Debug dump; fails if a frame holds an in-process reference
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl FromIterator<Frame> for FrameStack {
    /// Collect frames given outermost first
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        FrameStack {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FrameStack {
    type Item = Frame;
    type IntoIter = std::collections::vec_deque::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::LayoutRegistry;
    use crate::engine::types::{RoutineLayout, ValueKind};

    static OUTER: RoutineLayout = RoutineLayout::new("outer", 2, &[ValueKind::Int]);
    static INNER: RoutineLayout = RoutineLayout::new("inner", 1, &[]);

    fn frame(layout: &RoutineLayout, call_site: u32, locals: Vec<Value>) -> Frame {
        Frame {
            routine: layout.id(),
            call_site,
            locals,
            operands: vec![],
        }
    }

    fn registry() -> LayoutRegistry {
        let mut registry = LayoutRegistry::new();
        registry.register(&OUTER);
        registry.register(&INNER);
        registry
    }

    #[test]
    fn test_push_outer_keeps_outermost_first() {
        let mut stack = FrameStack::new();
        // Unwind order: innermost saves first
        stack.push_outer(frame(&INNER, 0, vec![]));
        stack.push_outer(frame(&OUTER, 1, vec![Value::Int(1)]));

        assert_eq!(stack.outermost().unwrap().routine.name, "outer");
        assert_eq!(stack.innermost().unwrap().routine.name, "inner");

        assert_eq!(stack.pop_outer().unwrap().routine.name, "outer");
        assert_eq!(stack.pop_outer().unwrap().routine.name, "inner");
        assert!(stack.pop_outer().is_none());
    }

    #[test]
    fn test_validate_accepts_well_formed_stack() {
        let stack: FrameStack = vec![frame(&OUTER, 1, vec![Value::Int(4)]), frame(&INNER, 0, vec![])]
            .into_iter()
            .collect();
        assert!(stack.validate(&registry(), 16).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = FrameStack::new().validate(&registry(), 16).unwrap_err();
        assert!(matches!(err, ContinuationError::InvalidContinuation(_)));
    }

    #[test]
    fn test_validate_rejects_bad_call_site() {
        let stack: FrameStack = vec![frame(&OUTER, 2, vec![Value::Int(4)])].into_iter().collect();
        let err = stack.validate(&registry(), 16).unwrap_err();
        assert!(matches!(err, ContinuationError::InvalidContinuation(_)));
    }

    #[test]
    fn test_validate_rejects_wrong_locals() {
        let stack: FrameStack = vec![frame(&OUTER, 0, vec![Value::from("x")])].into_iter().collect();
        assert!(stack.validate(&registry(), 16).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_routine_and_stale_fingerprint() {
        let mut stale = frame(&OUTER, 0, vec![Value::Int(1)]);
        stale.routine.fingerprint ^= 1;
        let stack: FrameStack = vec![stale].into_iter().collect();
        assert!(stack.validate(&registry(), 16).is_err());

        let stack: FrameStack = vec![frame(&INNER, 0, vec![])].into_iter().collect();
        assert!(stack.validate(&LayoutRegistry::new(), 16).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_stack() {
        let stack: FrameStack = (0..3).map(|_| frame(&INNER, 0, vec![])).collect();
        assert!(stack.validate(&registry(), 2).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let stack: FrameStack = vec![Frame {
            routine: OUTER.id(),
            call_site: 1,
            locals: vec![Value::Int(9)],
            operands: vec![Value::from("pending")],
        }]
        .into_iter()
        .collect();

        let json = stack.to_json().unwrap();
        let back: FrameStack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
    }
}
