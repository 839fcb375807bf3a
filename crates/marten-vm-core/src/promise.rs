//! Promise semantics
//!
//! States: pending, fulfilled(value), rejected(reason). `then` records
//! reaction pairs; when the promise settles, every reaction is enqueued onto
//! the owning context's microtask queue in registration order. Resolving
//! with a thenable schedules an assimilation job rather than calling `then`
//! synchronously. A promise settles at most once — the resolving functions
//! share a single-shot flag.

use marten_vm_gc::GcRef;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::interpreter;
use crate::object::{JsObject, ObjectKind};
use crate::property::PropertyKey;
use crate::value::Value;

/// Settlement state.
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not settled
    Pending,
    /// Settled with a value
    Fulfilled(Value),
    /// Settled with a reason
    Rejected(Value),
}

/// What runs when the promise settles.
pub enum ReactionHandler {
    /// JS handlers from `then`/`catch`, settling a derived capability.
    Js {
        /// Handler for fulfillment (pass-through when absent)
        on_fulfilled: Option<Value>,
        /// Handler for rejection (re-throw when absent)
        on_rejected: Option<Value>,
        /// The derived promise to settle with the handler result
        capability: Capability,
    },
    /// Internal continuation (async-function resumption).
    Native(Box<dyn FnOnce(&mut Context, Result<Value, Value>)>),
}

/// A reaction registered before settlement.
pub struct Reaction {
    handler: ReactionHandler,
}

/// A derived promise with its resolving functions.
#[derive(Clone)]
pub struct Capability {
    /// The derived promise object
    pub promise: GcRef<JsObject>,
    /// Its resolve function
    pub resolve: Value,
    /// Its reject function
    pub reject: Value,
}

/// Internal slots of a promise object.
pub struct PromiseData {
    /// Current state
    pub state: PromiseState,
    /// Reactions pending settlement
    pub reactions: Vec<Reaction>,
    /// Whether a rejection handler was ever attached
    pub handled: bool,
}

impl PromiseData {
    /// A fresh pending promise.
    pub fn new() -> Self {
        Self {
            state: PromiseState::Pending,
            reactions: Vec::new(),
            handled: false,
        }
    }

    /// Visit contained values (trace support).
    pub fn trace_contents(&self, f: &mut dyn FnMut(&Value)) {
        match &self.state {
            PromiseState::Fulfilled(v) | PromiseState::Rejected(v) => f(v),
            PromiseState::Pending => {}
        }
        for reaction in &self.reactions {
            if let ReactionHandler::Js {
                on_fulfilled,
                on_rejected,
                capability,
            } = &reaction.handler
            {
                if let Some(v) = on_fulfilled {
                    f(v);
                }
                if let Some(v) = on_rejected {
                    f(v);
                }
                f(&capability.resolve);
                f(&capability.reject);
            }
        }
    }
}

impl Default for PromiseData {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromiseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled(_) => "fulfilled",
            PromiseState::Rejected(_) => "rejected",
        };
        write!(f, "PromiseData({state}, {} reactions)", self.reactions.len())
    }
}

fn data<'a>(promise: &'a GcRef<JsObject>) -> &'a std::cell::RefCell<PromiseData> {
    match promise.kind() {
        ObjectKind::Promise(d) => d,
        _ => unreachable!("promise operation on non-promise"),
    }
}

/// Allocate a fresh pending promise.
pub fn new_promise(cx: &mut Context) -> GcRef<JsObject> {
    JsObject::new(
        ObjectKind::Promise(std::cell::RefCell::new(PromiseData::new())),
        Some(cx.intrinsics().promise_prototype.clone()),
    )
}

/// CreateResolvingFunctions: single-shot `resolve`/`reject` for `promise`.
pub fn create_resolving_functions(cx: &mut Context, promise: &GcRef<JsObject>) -> (Value, Value) {
    let already = Arc::new(AtomicBool::new(false));

    let resolve_promise = promise.clone();
    let resolve_flag = already.clone();
    let resolve: NativeFn = Arc::new(move |cx, _this, args| {
        if resolve_flag.swap(true, Ordering::SeqCst) {
            return Ok(Value::Undefined);
        }
        let value = args.first().cloned().unwrap_or(Value::Undefined);
        resolve_with(cx, &resolve_promise, value)?;
        Ok(Value::Undefined)
    });

    let reject_promise = promise.clone();
    let reject_flag = already;
    let reject: NativeFn = Arc::new(move |cx, _this, args| {
        if reject_flag.swap(true, Ordering::SeqCst) {
            return Ok(Value::Undefined);
        }
        let reason = args.first().cloned().unwrap_or(Value::Undefined);
        reject_promise_with(cx, &reject_promise, reason);
        Ok(Value::Undefined)
    });

    let resolve_fn = function::native_function(cx, "resolve", 1, resolve);
    let reject_fn = function::native_function(cx, "reject", 1, reject);
    (Value::Object(resolve_fn), Value::Object(reject_fn))
}

/// NewPromiseCapability.
pub fn new_capability(cx: &mut Context) -> Capability {
    let promise = new_promise(cx);
    let (resolve, reject) = create_resolving_functions(cx, &promise);
    Capability {
        promise,
        resolve,
        reject,
    }
}

/// ResolvePromise: self-resolution rejects, thenables assimilate via a job,
/// anything else fulfills.
pub fn resolve_with(cx: &mut Context, promise: &GcRef<JsObject>, resolution: Value) -> VmResult<()> {
    if let Value::Object(obj) = &resolution {
        if GcRef::ptr_eq(obj, promise) {
            let error = cx.make_error_value(&VmError::type_error(
                "Chaining cycle detected for promise",
            ));
            reject_promise_with(cx, promise, error);
            return Ok(());
        }
        // A thenable schedules an assimilation job.
        let then = match obj.get(cx, &PropertyKey::Atom(atoms::THEN), &resolution) {
            Ok(v) => v,
            Err(e) => {
                let error = cx.make_error_value(&e);
                reject_promise_with(cx, promise, error);
                return Ok(());
            }
        };
        if then.is_callable() {
            let promise = promise.clone();
            cx.enqueue_microtask(Box::new(move |cx: &mut Context| {
                let (resolve, reject) = create_resolving_functions(cx, &promise);
                if let Err(e) =
                    interpreter::call_value(cx, &then, &resolution, &[resolve, reject.clone()])
                {
                    let error = cx.make_error_value(&e);
                    let _ = interpreter::call_value(cx, &reject, &Value::Undefined, &[error]);
                }
            }));
            return Ok(());
        }
    }
    fulfill_promise(cx, promise, resolution);
    Ok(())
}

/// FulfillPromise: settle and schedule fulfillment reactions.
pub fn fulfill_promise(cx: &mut Context, promise: &GcRef<JsObject>, value: Value) {
    let reactions = {
        let mut d = data(promise).borrow_mut();
        if !matches!(d.state, PromiseState::Pending) {
            return;
        }
        d.state = PromiseState::Fulfilled(value.clone());
        std::mem::take(&mut d.reactions)
    };
    for reaction in reactions {
        schedule_reaction(cx, reaction, Ok(value.clone()));
    }
}

/// RejectPromise: settle, schedule rejection reactions, and queue the
/// unhandled-rejection check behind them.
pub fn reject_promise_with(cx: &mut Context, promise: &GcRef<JsObject>, reason: Value) {
    let reactions = {
        let mut d = data(promise).borrow_mut();
        if !matches!(d.state, PromiseState::Pending) {
            return;
        }
        d.state = PromiseState::Rejected(reason.clone());
        std::mem::take(&mut d.reactions)
    };
    for reaction in reactions {
        schedule_reaction(cx, reaction, Err(reason.clone()));
    }
    let check = promise.clone();
    let check_reason = reason;
    cx.enqueue_microtask(Box::new(move |cx: &mut Context| {
        let handled = data(&check).borrow().handled;
        if !handled {
            cx.report_unhandled_rejection(check_reason);
        }
    }));
}

/// PerformPromiseThen.
pub fn perform_then(
    cx: &mut Context,
    promise: &GcRef<JsObject>,
    on_fulfilled: Option<Value>,
    on_rejected: Option<Value>,
) -> GcRef<JsObject> {
    let capability = new_capability(cx);
    let reaction = Reaction {
        handler: ReactionHandler::Js {
            on_fulfilled,
            on_rejected: on_rejected.clone(),
            capability: capability.clone(),
        },
    };
    register_reaction(cx, promise, reaction, on_rejected.is_some());
    capability.promise
}

/// Attach an internal continuation (async-function resumption).
pub fn attach_native_reaction(
    cx: &mut Context,
    promise: &GcRef<JsObject>,
    continuation: Box<dyn FnOnce(&mut Context, Result<Value, Value>)>,
) {
    let reaction = Reaction {
        handler: ReactionHandler::Native(continuation),
    };
    register_reaction(cx, promise, reaction, true);
}

fn register_reaction(
    cx: &mut Context,
    promise: &GcRef<JsObject>,
    reaction: Reaction,
    handles_rejection: bool,
) {
    let mut d = data(promise).borrow_mut();
    if handles_rejection {
        d.handled = true;
    }
    let state = d.state.clone();
    match state {
        PromiseState::Pending => d.reactions.push(reaction),
        PromiseState::Fulfilled(v) => {
            drop(d);
            schedule_reaction(cx, reaction, Ok(v));
        }
        PromiseState::Rejected(v) => {
            drop(d);
            schedule_reaction(cx, reaction, Err(v));
        }
    }
}

fn schedule_reaction(cx: &mut Context, reaction: Reaction, result: Result<Value, Value>) {
    cx.enqueue_microtask(Box::new(move |cx: &mut Context| match reaction.handler {
        ReactionHandler::Js {
            on_fulfilled,
            on_rejected,
            capability,
        } => {
            let outcome = match &result {
                Ok(value) => match on_fulfilled {
                    Some(handler) => {
                        interpreter::call_value(cx, &handler, &Value::Undefined, &[value.clone()])
                    }
                    None => Ok(value.clone()),
                },
                Err(reason) => match on_rejected {
                    Some(handler) => {
                        interpreter::call_value(cx, &handler, &Value::Undefined, &[reason.clone()])
                    }
                    None => Err(VmError::exception(reason.clone(), Vec::new())),
                },
            };
            match outcome {
                Ok(value) => {
                    let _ = interpreter::call_value(
                        cx,
                        &capability.resolve,
                        &Value::Undefined,
                        &[value],
                    );
                }
                Err(e) => {
                    let error = cx.make_error_value(&e);
                    let _ = interpreter::call_value(
                        cx,
                        &capability.reject,
                        &Value::Undefined,
                        &[error],
                    );
                }
            }
        }
        ReactionHandler::Native(continuation) => continuation(cx, result),
    }));
}

/// `Promise.resolve` semantics: pass promises through, wrap anything else.
pub fn promise_resolve(cx: &mut Context, value: Value) -> VmResult<GcRef<JsObject>> {
    if let Value::Object(obj) = &value {
        if matches!(obj.kind(), ObjectKind::Promise(_)) {
            return Ok(obj.clone());
        }
    }
    let promise = new_promise(cx);
    resolve_with(cx, &promise, value)?;
    Ok(promise)
}

/// Current state snapshot (test and inspection support).
pub fn state_of(promise: &GcRef<JsObject>) -> PromiseState {
    data(promise).borrow().state.clone()
}
