//! Generator objects
//!
//! A generator stores its whole bytecode frame — locals, value stack,
//! instruction pointer, handler stack — in its body. Suspension moves the
//! frame in; resumption takes it out, pushes the sent value, and continues
//! the dispatch loop.

use marten_vm_gc::GcRef;

use crate::atom::atoms;
use crate::context::Context;
use crate::interpreter::Frame;
use crate::object::JsObject;
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// How a suspended frame is being resumed.
#[derive(Debug)]
pub enum ResumeMode {
    /// `next(value)` / await fulfilled — push the sent value and continue
    Next(Value),
    /// `throw(error)` / await rejected — raise at the suspension point
    Throw(Value),
    /// `return(value)` — complete the generator
    Return(Value),
}

/// Lifecycle of a generator object.
pub enum GeneratorStatus {
    /// Created, body not yet entered
    NotStarted(Box<Frame>),
    /// Suspended at a `yield`
    Suspended(Box<Frame>),
    /// Currently executing (re-entry is a TypeError)
    Running,
    /// Done
    Completed,
}

/// Internal slots of a generator object.
pub struct GeneratorState {
    /// Current lifecycle state
    pub status: GeneratorStatus,
}

impl GeneratorState {
    /// A fresh, not-yet-started generator.
    pub fn new(frame: Frame) -> Self {
        Self {
            status: GeneratorStatus::NotStarted(Box::new(frame)),
        }
    }
}

impl std::fmt::Debug for GeneratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.status {
            GeneratorStatus::NotStarted(_) => "not-started",
            GeneratorStatus::Suspended(_) => "suspended",
            GeneratorStatus::Running => "running",
            GeneratorStatus::Completed => "completed",
        };
        write!(f, "GeneratorState({state})")
    }
}

/// Build an iterator-protocol result object `{ value, done }`.
pub fn create_iter_result(cx: &mut Context, value: Value, done: bool) -> GcRef<JsObject> {
    let obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    obj.insert_property(PropertyKey::Atom(atoms::VALUE), Property::data(value));
    obj.insert_property(
        PropertyKey::Atom(atoms::DONE),
        Property::data(Value::Boolean(done)),
    );
    obj
}
