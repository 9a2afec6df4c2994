//! One suspend per item of a fixed list

use super::Transcript;
use crate::engine::{Flow, RoutineLayout, StackRecorder, Value, ValueKind};
use crate::errors::Result;

const ITEMS: [&str; 3] = ["A", "B", "C"];

static GENERATOR: RoutineLayout = RoutineLayout::new("generator", 1, &[ValueKind::Int]);

crate::resume_points! {
    enum Site { Yield }
}

pub(super) fn run(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&GENERATOR)?;
    let mut index = 0;
    let mut at_call = false;

    if let Some(mut restored) = act.restore::<Site>()? {
        index = restored.locals.next_int()?;
        at_call = matches!(restored.point, Site::Yield);
    }

    while let Some(item) = usize::try_from(index).ok().and_then(|i| ITEMS.get(i)) {
        if !at_call {
            out.emit(format!("Before yield {}", item));
        }
        at_call = false;

        let got = match act.invoke(rec.suspend(format!("yield {}", item)))? {
            Some(v) => v,
            None => return act.unwind(Site::Yield, vec![Value::Int(index)], vec![]),
        };
        out.emit(format!("After yield {} (got {})", item, got));
        index += 1;
    }

    Ok(Flow::Return(Value::Int(index)))
}
