//! Test helpers for engine tests
//!
//! Hand-instrumented routines covering the shapes the engine must replay:
//! a suspend inside a loop, a suspend two activations deep, and a
//! multi-call statement with a pending operand.

use crate::engine::{Continuation, Flow, Outcome, RoutineLayout, StackRecorder, Value, ValueKind};
use crate::errors::Result;
use std::sync::{Arc, Mutex};

/// Shared record of observable side effects
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|l| *l == line).count()
    }
}

/// Drive a chain to the end, resuming with `Null`
///
/// Returns every suspended value and the final result.
pub fn drain(outcome: Outcome) -> (Vec<Value>, Value) {
    let mut values = outcome.into_values();
    let mut seen = Vec::new();
    for v in values.by_ref() {
        seen.push(v.expect("cycle failed"));
    }
    let result = values.result().cloned().expect("chain did not finish");
    (seen, result)
}

/* ===================== loop_suspend ===================== */

pub static LOOP: RoutineLayout = RoutineLayout::new("loop_suspend", 1, &[ValueKind::Int]);

crate::resume_points! {
    pub enum LoopSite { Suspend }
}

/// `for i in 1..=3 { emit(suspend(i)) }; "done"`
pub fn loop_suspend(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&LOOP)?;
    let mut i = 1;

    if let Some(mut restored) = act.restore::<LoopSite>()? {
        i = restored.locals.next_int()?;
        match restored.point {
            LoopSite::Suspend => {}
        }
    }

    while i <= 3 {
        let resumed = match act.invoke(rec.suspend(i))? {
            Some(v) => v,
            None => return act.unwind(LoopSite::Suspend, vec![Value::Int(i)], vec![]),
        };
        journal.record(format!("after {} got {}", i, resumed));
        i += 1;
    }

    Ok(Flow::Return(Value::from("done")))
}

/* ===================== a_then_b ===================== */

pub static A_THEN_B: RoutineLayout = RoutineLayout::new("a_then_b", 2, &[]);
pub static STEP_A: RoutineLayout = RoutineLayout::new("step_a", 1, &[]);

crate::resume_points! {
    pub enum EntrySite { A, B }
}

crate::resume_points! {
    pub enum ASite { Suspend }
}

/// Entry that calls `a()` then `b()`; only `a` suspends
pub fn a_then_b(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&A_THEN_B)?;
    let mut pc = EntrySite::A;

    if let Some(restored) = act.restore::<EntrySite>()? {
        pc = restored.point;
    } else {
        journal.record("entry start");
    }

    loop {
        match pc {
            EntrySite::A => {
                if act.invoke(step_a(rec, journal))?.is_none() {
                    return act.unwind(EntrySite::A, vec![], vec![]);
                }
                pc = EntrySite::B;
            }
            EntrySite::B => {
                let b = match act.invoke(step_b(rec, journal))? {
                    Some(v) => v,
                    None => return act.unwind(EntrySite::B, vec![], vec![]),
                };
                return Ok(Flow::Return(b));
            }
        }
    }
}

fn step_a(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&STEP_A)?;

    if act.restore::<ASite>()?.is_none() {
        journal.record("a before");
    }

    let got = match act.invoke(rec.suspend(1))? {
        Some(v) => v,
        None => return act.unwind(ASite::Suspend, vec![], vec![]),
    };
    journal.record(format!("a after {}", got));
    Ok(Flow::Return(Value::Null))
}

/// Not eligible: never suspends, so it needs no activation
fn step_b(_rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    journal.record("b");
    Ok(Flow::Return(Value::from("b result")))
}

/* ===================== nested ===================== */

pub static OUTER: RoutineLayout = RoutineLayout::new("outer", 1, &[ValueKind::Str]);
pub static MIDDLE: RoutineLayout = RoutineLayout::new("middle", 1, &[ValueKind::Int]);
pub static INNER: RoutineLayout = RoutineLayout::new("inner", 1, &[]);

crate::resume_points! {
    pub enum OneSite { Call }
}

/// outer -> middle -> inner -> suspend("deep")
pub fn outer(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&OUTER)?;
    let label = match act.restore::<OneSite>()? {
        Some(mut r) => r.locals.next_str()?,
        None => {
            journal.record("outer enter");
            "outer".to_string()
        }
    };

    let v = match act.invoke(middle(rec, journal, 10))? {
        Some(v) => v,
        None => return act.unwind(OneSite::Call, vec![Value::from(label)], vec![]),
    };
    journal.record(format!("{} got {}", label, v));
    Ok(Flow::Return(v))
}

fn middle(rec: &StackRecorder, journal: &Journal, base: i64) -> Result<Flow<Value>> {
    let mut act = rec.enter(&MIDDLE)?;
    let base = match act.restore::<OneSite>()? {
        Some(mut r) => r.locals.next_int()?,
        None => {
            journal.record("middle enter");
            base
        }
    };

    let v = match act.invoke(inner(rec, journal))? {
        Some(v) => v,
        None => return act.unwind(OneSite::Call, vec![Value::Int(base)], vec![]),
    };
    let sum = base + v.as_int().unwrap_or(0);
    journal.record(format!("middle sum {}", sum));
    Ok(Flow::Return(Value::Int(sum)))
}

fn inner(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&INNER)?;
    if act.restore::<OneSite>()?.is_none() {
        journal.record("inner enter");
    }

    let v = match act.invoke(rec.suspend("deep"))? {
        Some(v) => v,
        None => return act.unwind(OneSite::Call, vec![], vec![]),
    };
    journal.record("inner resumed");
    Ok(Flow::Return(v))
}

/* ===================== operands ===================== */

pub static COMBINE: RoutineLayout = RoutineLayout::new("combine", 2, &[]);

crate::resume_points! {
    pub enum CombineSite { Left, Right }
}

/// `emit(left() + right())` where `right` suspends
///
/// `left`'s result is a pending operand while `right` is in flight.
pub fn combine(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&COMBINE)?;
    let mut pc = CombineSite::Left;
    let mut left = 0;

    if let Some(mut restored) = act.restore::<CombineSite>()? {
        pc = restored.point;
        if pc == CombineSite::Right {
            left = restored.operands.next_int()?;
        }
    }

    if pc == CombineSite::Left {
        let v = match act.invoke(left_side(rec, journal))? {
            Some(v) => v,
            None => return act.unwind(CombineSite::Left, vec![], vec![]),
        };
        left = v.as_int().unwrap_or(0);
    }

    let right = match act.invoke(right_side(rec, journal))? {
        Some(v) => v,
        None => {
            return act.unwind(CombineSite::Right, vec![], vec![Value::Int(left)]);
        }
    };

    let total = left + right.as_int().unwrap_or(0);
    journal.record(format!("sum {}", total));
    Ok(Flow::Return(Value::Int(total)))
}

fn left_side(_rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    journal.record("left evaluated");
    Ok(Flow::Return(Value::Int(40)))
}

pub static RIGHT: RoutineLayout = RoutineLayout::new("right_side", 1, &[]);

fn right_side(rec: &StackRecorder, journal: &Journal) -> Result<Flow<Value>> {
    let mut act = rec.enter(&RIGHT)?;
    if act.restore::<OneSite>()?.is_none() {
        journal.record("right evaluated");
    }
    match act.invoke(rec.suspend("need right"))? {
        Some(v) => Ok(Flow::Return(v)),
        None => act.unwind(OneSite::Call, vec![], vec![]),
    }
}

/* ===================== starters ===================== */

pub fn start_loop(journal: &Journal) -> Result<Outcome> {
    let j = journal.clone();
    Continuation::start(move |rec: &StackRecorder| loop_suspend(rec, &j))
}

pub fn start_a_then_b(journal: &Journal) -> Result<Outcome> {
    let j = journal.clone();
    Continuation::start(move |rec: &StackRecorder| a_then_b(rec, &j))
}

pub fn start_nested(journal: &Journal) -> Result<Outcome> {
    let j = journal.clone();
    Continuation::start(move |rec: &StackRecorder| outer(rec, &j))
}

pub fn start_combine(journal: &Journal) -> Result<Outcome> {
    let j = journal.clone();
    Continuation::start(move |rec: &StackRecorder| combine(rec, &j))
}
