//! `price() + tax()` where `tax` suspends
//!
//! `price`'s result is saved as a pending operand, so pricing runs once.

use super::Transcript;
use crate::engine::{Flow, RoutineLayout, StackRecorder, Value};
use crate::errors::Result;

const DEFAULT_RATE: i64 = 20;

static TOTAL: RoutineLayout = RoutineLayout::new("operands", 1, &[]);
static TAX: RoutineLayout = RoutineLayout::new("operands::tax", 1, &[]);

crate::resume_points! {
    enum Site { Tax }
}

pub(super) fn run(rec: &StackRecorder, out: &Transcript) -> Result<Flow<Value>> {
    let mut act = rec.enter(&TOTAL)?;
    let price = match act.restore::<Site>()? {
        Some(mut r) => r.operands.next_int()?,
        None => price(out),
    };

    let tax = match act.invoke(tax(rec, out, price))? {
        Some(v) => v.as_int().unwrap_or(0),
        None => return act.unwind(Site::Tax, vec![], vec![Value::Int(price)]),
    };
    out.emit(format!("total {} + {} = {}", price, tax, price + tax));
    Ok(Flow::Return(Value::Int(price + tax)))
}

/// Not instrumented: never suspends
fn price(out: &Transcript) -> i64 {
    out.emit("pricing");
    100
}

fn tax(rec: &StackRecorder, out: &Transcript, price: i64) -> Result<Flow<Value>> {
    let mut act = rec.enter(&TAX)?;
    if act.restore::<Site>()?.is_none() {
        out.emit("tax: asking for rate");
    }

    let rate = match act.invoke(rec.suspend("rate?"))? {
        Some(v) => v.as_int().unwrap_or(DEFAULT_RATE),
        None => return act.unwind(Site::Tax, vec![], vec![]),
    };
    out.emit(format!("tax: rate {}%", rate));
    Ok(Flow::Return(Value::Int(price * rate / 100)))
}
