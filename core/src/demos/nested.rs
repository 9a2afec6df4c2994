//! Suspend two activations below the entry routine

use super::Transcript;
use crate::engine::{Flow, RoutineLayout, StackRecorder, Value, ValueKind};
use crate::errors::Result;

static ENTRY: RoutineLayout = RoutineLayout::new("nested", 1, &[]);
static SCALE: RoutineLayout = RoutineLayout::new("nested::scale", 1, &[ValueKind::Int]);
static ASK: RoutineLayout = RoutineLayout::new("nested::ask", 1, &[]);

crate::resume_points! {
    enum Site { Call }
}

pub(super) fn run(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&ENTRY)?;
    if act.restore::<Site>()?.is_none() {
        out.emit("entry: start");
    }

    let v = match act.invoke(scale(rec, out, 2))? {
        Some(v) => v,
        None => return act.unwind(Site::Call, vec![], vec![]),
    };
    out.emit(format!("entry: scale returned {}", v));
    Ok(Flow::Return(v))
}

fn scale(rec: &StackRecorder, out: &Transcript, factor: i64) -> Result<Flow<Value>> {
    let mut act = rec.enter(&SCALE)?;
    let factor = match act.restore::<Site>()? {
        Some(mut r) => r.locals.next_int()?,
        None => {
            out.emit(format!("scale: asking with factor {}", factor));
            factor
        }
    };

    let answer = match act.invoke(ask(rec, out))? {
        Some(v) => v,
        None => return act.unwind(Site::Call, vec![Value::Int(factor)], vec![]),
    };
    let scaled = factor * answer.as_int().unwrap_or(1);
    out.emit(format!("scale: {} x {} = {}", factor, answer, scaled));
    Ok(Flow::Return(Value::Int(scaled)))
}

fn ask(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&ASK)?;
    if act.restore::<Site>()?.is_none() {
        out.emit("ask: before suspend");
    }

    let got = match act.invoke(rec.suspend("ask"))? {
        Some(v) => v,
        None => return act.unwind(Site::Call, vec![], vec![]),
    };
    out.emit(format!("ask: resumed with {}", got));
    Ok(Flow::Return(got))
}
