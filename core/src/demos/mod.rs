//! Bundled sample routines, hand-instrumented
//!
//! Each demo writes what it does to a [`Transcript`]; the runner adds an
//! `Interrupted <value>` line every time the chain suspends.

mod generator;
mod intercepted;
mod nested;
mod operands;

use crate::config::EngineConfig;
use crate::engine::{Continuation, Flow, Outcome, Routine, StackRecorder, Value};
use crate::errors::Result;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Lines a demo has written so far
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    pub fn emit(&self, line: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

type Body = fn(&StackRecorder, &Transcript) -> Result<Flow<Value>>;

/// A named sample routine
pub struct Demo {
    pub name: &'static str,
    pub about: &'static str,
    body: Body,
}

static DEMOS: &[Demo] = &[
    Demo {
        name: "generator",
        about: "suspends once per loop iteration",
        body: generator::run,
    },
    Demo {
        name: "nested",
        about: "suspends two activations below the entry",
        body: nested::run,
    },
    Demo {
        name: "operands",
        about: "suspends while an earlier call's result is still pending",
        body: operands::run,
    },
    Demo {
        name: "intercepted",
        about: "delegates through a wrapper that is not instrumented",
        body: intercepted::run,
    },
];

impl fmt::Debug for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demo").field("name", &self.name).finish()
    }
}

pub fn all() -> &'static [Demo] {
    DEMOS
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|d| d.name == name)
}

struct DemoRoutine {
    demo: &'static Demo,
    out: Transcript,
}

impl Routine for DemoRoutine {
    fn run(&self, recorder: &StackRecorder) -> Result<Flow<Value>> {
        (self.demo.body)(recorder, &self.out)
    }

    fn name(&self) -> &str {
        self.demo.name
    }
}

impl Demo {
    /// Drive the demo to completion
    ///
    /// Every resume passes `resume_with` (or `Null`) back to the suspended
    /// code. Returns the transcript including the runner's own lines.
    pub fn run(&'static self, resume_with: Option<i64>, config: EngineConfig) -> Result<Vec<String>> {
        let out = Transcript::default();
        let entry = DemoRoutine {
            demo: self,
            out: out.clone(),
        };
        let resume_value = resume_with.map(Value::Int).unwrap_or(Value::Null);

        let mut outcome = Continuation::start_with_config(entry, config)?;
        let mut cycles = 1;
        loop {
            match outcome {
                Outcome::Suspended(cont) => {
                    out.emit(format!("Interrupted {}", cont.value()));
                    outcome = cont.resume_with(resume_value.clone())?;
                    cycles += 1;
                }
                Outcome::Finished(result) => {
                    if result != Value::Null {
                        out.emit(format!("Result {}", result));
                    }
                    break;
                }
            }
        }

        info!(demo = self.name, cycles, "demo finished");
        Ok(out.lines())
    }
}
