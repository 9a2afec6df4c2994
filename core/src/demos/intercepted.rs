//! An uninstrumented wrapper between two eligible routines
//!
//! The wrapper resolves its target once. On replay it takes the target saved
//! by the interception helpers instead of resolving it again.

use super::Transcript;
use crate::engine::interceptor::{after_execution_on, before_execution_on};
use crate::engine::{Flow, Reference, RoutineLayout, StackRecorder, Value};
use crate::errors::{ContinuationError, Result};

static CALLER: RoutineLayout = RoutineLayout::new("intercepted", 1, &[]);
static GREETER: RoutineLayout = RoutineLayout::new("intercepted::greeter", 1, &[]);

crate::resume_points! {
    enum Site { Call }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Greeter,
}

impl Target {
    fn call(self, rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
        match self {
            Target::Greeter => greeter(rec, out),
        }
    }
}

pub(super) fn run(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&CALLER)?;
    if act.restore::<Site>()?.is_none() {
        out.emit("caller: start");
    }

    let v = match act.invoke(audit(rec, out))? {
        Some(v) => v,
        None => return act.unwind(Site::Call, vec![], vec![]),
    };
    out.emit(format!("caller: got {}", v));
    Ok(Flow::Return(v))
}

fn audit(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let target = match before_execution_on(rec)? {
        Some(saved) => saved.downcast::<Target>().copied().ok_or_else(|| {
            ContinuationError::violation("audit", "saved reference is not a target")
        })?,
        None => {
            out.emit("audit: resolving target");
            Target::Greeter
        }
    };

    let flow = target.call(rec, out)?;
    after_execution_on(rec, Reference::new(target))?;
    Ok(flow)
}

fn greeter(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&GREETER)?;
    if act.restore::<Site>()?.is_none() {
        out.emit("greeter: before suspend");
    }

    let name = match act.invoke(rec.suspend("who?"))? {
        Some(Value::Null) => Value::from("world"),
        Some(v) => v,
        None => return act.unwind(Site::Call, vec![], vec![]),
    };
    out.emit(format!("greeter: hello {}", name));
    Ok(Flow::Return(Value::from(format!("hello {}", name))))
}
