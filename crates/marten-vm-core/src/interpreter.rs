//! The bytecode virtual machine
//!
//! A stack-based interpreter over [`marten_vm_bytecode::Instruction`].
//! Call frames are plain Rust values so a suspended generator can own its
//! whole frame — value stack, locals, instruction pointer, handler stack —
//! and hand it back on resumption. Exceptions travel as `VmError` through
//! the Rust call stack: each frame gets a chance to land on a
//! `TryEnter`-registered handler; frames without one propagate outward,
//! which is exactly the "pop frames until a handler is found" walk.

use marten_vm_bytecode::{CaptureSource, Constant, Instruction, Module};
use marten_vm_gc::GcRef;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::Arc;

use crate::arguments;
use crate::array;
use crate::atom::atoms;
use crate::context::Context;
use crate::convert::{self, PreferredType};
use crate::error::{VmError, VmResult};
use crate::function::{self, ClosureData};
use crate::generator::{GeneratorState, GeneratorStatus, ResumeMode};
use crate::object::{JsObject, ObjectKind};
use crate::promise;
use crate::property::{Property, PropertyKey};
use crate::proxy;
use crate::value::{CaptureCell, Value};

/// A protected region registered by `TryEnter`.
#[derive(Debug, Clone, Copy)]
pub struct TryHandler {
    /// Catch landing pad, `u32::MAX` when absent
    pub catch_pc: u32,
    /// Finally landing pad, `u32::MAX` when absent
    pub finally_pc: u32,
    /// Value-stack height to restore before entering the handler
    pub stack_depth: usize,
}

/// A call frame. Heap-allocatable so generator/async suspension can move it
/// into the suspended object.
pub struct Frame {
    closure: GcRef<JsObject>,
    module: Arc<Module>,
    function_index: u32,
    /// Next instruction to execute
    pub ip: usize,
    stack: Vec<Value>,
    locals: Vec<Value>,
    captures: Vec<CaptureCell>,
    /// Local slots hoisted into cells because a closure (or the arguments
    /// object) aliases them
    open_cells: FxHashMap<u16, CaptureCell>,
    this_value: Value,
    new_target: Value,
    handlers: Vec<TryHandler>,
    /// Set before re-entering a suspended frame
    pub resume: Option<ResumeMode>,
    /// Active `yield*` iterator
    delegating: Option<Value>,
}

/// How a frame finished one run of the dispatch loop.
pub enum FrameResult {
    /// Normal completion
    Return(Value),
    /// Generator suspension with the yielded value
    Yield(Value),
    /// Async suspension on the awaited value
    Await(Value),
}

impl Frame {
    /// Build a frame for a closure call: bind `this`, spread arguments into
    /// locals, materialize the arguments object when the function uses it.
    pub fn prepare(
        cx: &mut Context,
        closure: &GcRef<JsObject>,
        this: Value,
        args: &[Value],
        new_target: Value,
    ) -> VmResult<Frame> {
        let data = closure_data(closure)?;
        let module = data.module.clone();
        let function_index = data.function_index;
        let captures = data.captures.clone();
        let lexical_this = data.lexical_this.clone();
        let func = module
            .function(function_index)
            .ok_or_else(|| VmError::internal("closure references missing function"))?
            .clone();

        let this_value = if func.flags.is_arrow {
            lexical_this.unwrap_or(Value::Undefined)
        } else if func.flags.is_strict {
            this
        } else {
            match this {
                Value::Undefined | Value::Null => Value::Object(cx.global().clone()),
                Value::Object(_) => this,
                primitive => Value::Object(convert::to_object(cx, &primitive)?),
            }
        };

        let mut locals = vec![Value::Undefined; func.local_count as usize];
        let named_params = if func.flags.has_rest {
            func.param_count.saturating_sub(1) as usize
        } else {
            func.param_count as usize
        };
        for i in 0..named_params.min(args.len()) {
            locals[i] = args[i].clone();
        }
        if func.flags.has_rest && func.param_count > 0 {
            let rest: Vec<Value> = args.iter().skip(named_params).cloned().collect();
            locals[func.param_count as usize - 1] = Value::Object(array::new_array(cx, rest));
        }

        let mut frame = Frame {
            closure: closure.clone(),
            module,
            function_index,
            ip: 0,
            stack: Vec::with_capacity(func.max_stack as usize),
            locals,
            captures,
            open_cells: FxHashMap::default(),
            this_value,
            new_target,
            handlers: Vec::new(),
            resume: None,
            delegating: None,
        };

        if func.flags.uses_arguments && !func.flags.is_arrow {
            if let Some(slot) = func.local_names.iter().position(|n| n == "arguments") {
                let args_obj = if func.flags.is_strict {
                    arguments::create_unmapped(cx, args)
                } else {
                    let mut cells = Vec::with_capacity(named_params.min(args.len()));
                    for i in 0..named_params.min(args.len()) {
                        let cell = CaptureCell::new(args[i].clone());
                        frame.open_cells.insert(i as u16, cell.clone());
                        cells.push(Some(cell));
                    }
                    arguments::create_mapped(cx, args, cells, Value::Object(closure.clone()))
                };
                frame.locals[slot] = Value::Object(args_obj);
            }
        }
        Ok(frame)
    }

    fn function(&self) -> &marten_vm_bytecode::Function {
        self.module
            .function(self.function_index)
            .expect("validated at frame creation")
    }

    fn load_local(&self, index: u16) -> Value {
        match self.open_cells.get(&index) {
            Some(cell) => cell.get(),
            None => self.locals[index as usize].clone(),
        }
    }

    fn store_local(&mut self, index: u16, value: Value) {
        if let Some(cell) = self.open_cells.get(&index) {
            cell.set(value.clone());
        }
        self.locals[index as usize] = value;
    }

    fn capture_cell(&mut self, index: u16) -> CaptureCell {
        if let Some(cell) = self.open_cells.get(&index) {
            return cell.clone();
        }
        let cell = CaptureCell::new(self.locals[index as usize].clone());
        self.open_cells.insert(index, cell.clone());
        cell
    }
}

fn closure_data(obj: &GcRef<JsObject>) -> VmResult<&ClosureData> {
    match obj.kind() {
        ObjectKind::BytecodeFunction(data) => Ok(data),
        _ => Err(VmError::internal("expected bytecode function")),
    }
}

fn callee_name(obj: &GcRef<JsObject>) -> String {
    match obj.store().get(&PropertyKey::Atom(atoms::NAME)) {
        Some(Property::Data {
            value: Value::String(s),
            ..
        }) => s.as_str().to_string(),
        _ => "<anonymous>".to_string(),
    }
}

// ====================================================================
// Calls
// ====================================================================

/// Call `callee` with `this` and `args` — the single entry point for every
/// invocation: VM `Call`, accessors, proxy traps, promise reactions.
pub fn call_value(cx: &mut Context, callee: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
    if cx.is_interrupted() {
        return Err(VmError::Interrupted);
    }
    let Value::Object(obj) = callee else {
        return Err(VmError::type_error(format!(
            "{} is not a function",
            callee.type_of()
        )));
    };
    match obj.kind() {
        ObjectKind::NativeFunction(data) => {
            if data.requires_new && cx.new_target().is_none() {
                let name = callee_name(obj);
                return Err(VmError::type_error(format!(
                    "Constructor {name} requires 'new'"
                )));
            }
            let func = data.func.clone();
            let name = callee_name(obj);
            cx.push_frame_info(&name, "<native>", 0)?;
            let result = func(cx, this, args);
            cx.pop_frame_info();
            result
        }
        ObjectKind::BoundFunction(bound) => {
            let mut combined = bound.args.clone();
            combined.extend_from_slice(args);
            let target = bound.target.clone();
            let bound_this = bound.this.clone();
            call_value(cx, &target, &bound_this, &combined)
        }
        ObjectKind::Proxy(_) => proxy::proxy_call(cx, obj, this, args),
        ObjectKind::BytecodeFunction(data) => {
            let func = data.function();
            if func.flags.is_generator {
                return make_generator(cx, obj, this, args);
            }
            if func.flags.is_async {
                return call_async(cx, obj, this, args);
            }
            let name = func.display_name().to_string();
            let filename = data.module.filename.clone();
            let mut frame = Frame::prepare(cx, obj, this.clone(), args, Value::Undefined)?;
            cx.push_frame_info(&name, &filename, 0)?;
            let result = execute_frame(cx, &mut frame);
            cx.pop_frame_info();
            match result? {
                FrameResult::Return(v) => Ok(v),
                _ => Err(VmError::internal("suspension outside generator/async frame")),
            }
        }
        _ => Err(VmError::type_error(format!(
            "{} is not a function",
            convert::display_value(cx, callee)
        ))),
    }
}

/// `new callee(...args)` with an explicit `new.target`.
pub fn construct_value(
    cx: &mut Context,
    callee: &Value,
    args: &[Value],
    new_target: &Value,
) -> VmResult<Value> {
    if cx.is_interrupted() {
        return Err(VmError::Interrupted);
    }
    let Value::Object(obj) = callee else {
        return Err(VmError::type_error(format!(
            "{} is not a constructor",
            callee.type_of()
        )));
    };
    match obj.kind() {
        ObjectKind::NativeFunction(data) => {
            if !data.is_constructor {
                let name = callee_name(obj);
                return Err(VmError::type_error(format!("{name} is not a constructor")));
            }
            let func = data.func.clone();
            let name = callee_name(obj);
            cx.push_frame_info(&name, "<native>", 0)?;
            cx.push_new_target(new_target.clone());
            let result = func(cx, &Value::Undefined, args);
            cx.pop_new_target();
            cx.pop_frame_info();
            result
        }
        ObjectKind::BoundFunction(bound) => {
            let mut combined = bound.args.clone();
            combined.extend_from_slice(args);
            // `new.target` forwards unless it was the bound function itself.
            let forwarded = if matches!(new_target, Value::Object(nt) if GcRef::ptr_eq(nt, obj)) {
                bound.target.clone()
            } else {
                new_target.clone()
            };
            let target = bound.target.clone();
            construct_value(cx, &target, &combined, &forwarded)
        }
        ObjectKind::Proxy(_) => proxy::proxy_construct(cx, obj, args, new_target),
        ObjectKind::BytecodeFunction(data) => {
            if !data.is_constructor() {
                let func = data.function();
                return Err(VmError::type_error(format!(
                    "{} is not a constructor",
                    func.display_name()
                )));
            }
            let func = data.function();
            let name = func.display_name().to_string();
            let filename = data.module.filename.clone();

            let proto = prototype_for_new_target(cx, new_target)?;
            let this_obj = JsObject::ordinary(Some(proto));
            let mut frame = Frame::prepare(
                cx,
                obj,
                Value::Object(this_obj.clone()),
                args,
                new_target.clone(),
            )?;
            cx.push_frame_info(&name, &filename, 0)?;
            let result = execute_frame(cx, &mut frame);
            cx.pop_frame_info();
            match result? {
                FrameResult::Return(Value::Object(returned)) => Ok(Value::Object(returned)),
                FrameResult::Return(_) => Ok(Value::Object(this_obj)),
                _ => Err(VmError::internal("suspension outside generator/async frame")),
            }
        }
        _ => Err(VmError::type_error(format!(
            "{} is not a constructor",
            convert::display_value(cx, callee)
        ))),
    }
}

fn prototype_for_new_target(cx: &mut Context, new_target: &Value) -> VmResult<GcRef<JsObject>> {
    if let Value::Object(nt) = new_target {
        let proto = nt.get(cx, &PropertyKey::Atom(atoms::PROTOTYPE), new_target)?;
        if let Value::Object(p) = proto {
            return Ok(p);
        }
    }
    Ok(cx.intrinsics().object_prototype.clone())
}

// ====================================================================
// Generators
// ====================================================================

fn make_generator(
    cx: &mut Context,
    closure: &GcRef<JsObject>,
    this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let frame = Frame::prepare(cx, closure, this.clone(), args, Value::Undefined)?;
    let proto = cx.intrinsics().generator_prototype.clone();
    Ok(Value::Object(JsObject::new(
        ObjectKind::Generator(RefCell::new(GeneratorState::new(frame))),
        Some(proto),
    )))
}

/// Resume a generator with `next`/`throw`/`return` semantics. Returns
/// `(value, done)`.
pub fn generator_resume(
    cx: &mut Context,
    generator: &GcRef<JsObject>,
    mode: ResumeMode,
) -> VmResult<(Value, bool)> {
    let ObjectKind::Generator(state) = generator.kind() else {
        return Err(VmError::type_error(
            "Generator method called on incompatible receiver",
        ));
    };

    let status = std::mem::replace(&mut state.borrow_mut().status, GeneratorStatus::Running);
    let mut frame = match status {
        GeneratorStatus::Running => {
            return Err(VmError::type_error("Generator is already running"));
        }
        GeneratorStatus::Completed => {
            state.borrow_mut().status = GeneratorStatus::Completed;
            return match mode {
                ResumeMode::Next(_) => Ok((Value::Undefined, true)),
                ResumeMode::Return(v) => Ok((v, true)),
                ResumeMode::Throw(v) => Err(VmError::exception(v, cx.capture_stack())),
            };
        }
        GeneratorStatus::NotStarted(frame) => {
            let mut frame = frame;
            match mode {
                ResumeMode::Next(_) => {}
                other => frame.resume = Some(other),
            }
            frame
        }
        GeneratorStatus::Suspended(mut frame) => {
            frame.resume = Some(mode);
            frame
        }
    };

    let result = execute_frame(cx, &mut frame);
    let mut state_mut = state.borrow_mut();
    match result {
        Ok(FrameResult::Return(v)) => {
            state_mut.status = GeneratorStatus::Completed;
            Ok((v, true))
        }
        Ok(FrameResult::Yield(v)) => {
            state_mut.status = GeneratorStatus::Suspended(frame);
            Ok((v, false))
        }
        Ok(FrameResult::Await(_)) => {
            state_mut.status = GeneratorStatus::Completed;
            Err(VmError::internal("await in a non-async generator frame"))
        }
        Err(e) => {
            state_mut.status = GeneratorStatus::Completed;
            Err(e)
        }
    }
}

// ====================================================================
// Async functions
// ====================================================================

fn call_async(
    cx: &mut Context,
    closure: &GcRef<JsObject>,
    this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let promise = promise::new_promise(cx);
    match Frame::prepare(cx, closure, this.clone(), args, Value::Undefined) {
        Ok(frame) => step_async(cx, frame, promise.clone()),
        Err(e) => {
            let reason = cx.make_error_value(&e);
            promise::reject_promise_with(cx, &promise, reason);
        }
    }
    Ok(Value::Object(promise))
}

/// Run an async frame until it returns, throws, or suspends on an `await`.
/// `await` schedules the continuation as a microtask on the current context.
fn step_async(cx: &mut Context, mut frame: Frame, result_promise: GcRef<JsObject>) {
    match execute_frame(cx, &mut frame) {
        Ok(FrameResult::Return(value)) => {
            let _ = promise::resolve_with(cx, &result_promise, value);
        }
        Ok(FrameResult::Await(awaited)) => {
            let inner = match promise::promise_resolve(cx, awaited) {
                Ok(p) => p,
                Err(e) => {
                    let reason = cx.make_error_value(&e);
                    promise::reject_promise_with(cx, &result_promise, reason);
                    return;
                }
            };
            promise::attach_native_reaction(
                cx,
                &inner,
                Box::new(move |cx, settled| {
                    let mut frame = frame;
                    frame.resume = Some(match settled {
                        Ok(v) => ResumeMode::Next(v),
                        Err(v) => ResumeMode::Throw(v),
                    });
                    step_async(cx, frame, result_promise);
                }),
            );
        }
        Ok(FrameResult::Yield(_)) => {
            let reason = cx.make_error_value(&VmError::internal("yield in async function frame"));
            promise::reject_promise_with(cx, &result_promise, reason);
        }
        Err(e) => {
            let reason = cx.make_error_value(&e);
            promise::reject_promise_with(cx, &result_promise, reason);
        }
    }
}

// ====================================================================
// Iteration protocol
// ====================================================================

/// GetIterator via `@@iterator`.
pub fn get_iterator(cx: &mut Context, value: &Value) -> VmResult<Value> {
    let key = PropertyKey::Symbol(cx.well_known().iterator.clone());
    let method = convert::get_property_of_value(cx, value, &key)?;
    if !method.is_callable() {
        return Err(VmError::type_error(format!(
            "{} is not iterable",
            convert::display_value(cx, value)
        )));
    }
    let iterator = call_value(cx, &method, value, &[])?;
    if !iterator.is_object() {
        return Err(VmError::type_error("iterator result is not an object"));
    }
    Ok(iterator)
}

/// IteratorNext: `(value, done)`.
pub fn iterator_next(cx: &mut Context, iterator: &Value, arg: Value) -> VmResult<(Value, bool)> {
    let next = convert::get_property_of_value(cx, iterator, &PropertyKey::Atom(atoms::NEXT))?;
    let result = call_value(cx, &next, iterator, &[arg])?;
    let Value::Object(result_obj) = &result else {
        return Err(VmError::type_error("iterator result is not an object"));
    };
    let done = result_obj
        .get(cx, &PropertyKey::Atom(atoms::DONE), &result)?
        .is_truthy();
    let value = result_obj.get(cx, &PropertyKey::Atom(atoms::VALUE), &result)?;
    Ok((value, done))
}

/// Collect an iterable into a vector.
pub fn iterate_to_vec(cx: &mut Context, value: &Value) -> VmResult<Vec<Value>> {
    let iterator = get_iterator(cx, value)?;
    let mut out = Vec::new();
    loop {
        let (v, done) = iterator_next(cx, &iterator, Value::Undefined)?;
        if done {
            return Ok(out);
        }
        out.push(v);
    }
}

// ====================================================================
// The dispatch loop
// ====================================================================

/// Execute a frame to its next completion: return, yield, or await.
pub fn execute_frame(cx: &mut Context, frame: &mut Frame) -> VmResult<FrameResult> {
    if let Some(mode) = frame.resume.take() {
        match mode {
            ResumeMode::Next(v) => frame.stack.push(v),
            ResumeMode::Throw(v) => {
                raise(cx, frame, VmError::exception(v, cx.capture_stack()))?;
            }
            ResumeMode::Return(v) => return Ok(FrameResult::Return(v)),
        }
    }

    loop {
        let step_result = step(cx, frame);
        match step_result {
            Ok(None) => continue,
            Ok(Some(result)) => return Ok(result),
            Err(e) => raise(cx, frame, e)?,
        }
    }
}

/// Land the error on the innermost handler of this frame, or propagate.
/// On propagation the error is normalized to a thrown value carrying the
/// stack snapshot, and the pending-exception slot is set.
fn raise(cx: &mut Context, frame: &mut Frame, error: VmError) -> VmResult<()> {
    let value = cx.make_error_value(&error);
    match frame.handlers.pop() {
        Some(handler) => {
            frame.stack.truncate(handler.stack_depth);
            frame.stack.push(value);
            frame.ip = if handler.catch_pc != u32::MAX {
                cx.set_in_catch_handler(true);
                handler.catch_pc as usize
            } else {
                handler.finally_pc as usize
            };
            Ok(())
        }
        None => {
            cx.set_pending_exception(value.clone());
            match error {
                VmError::Exception(thrown) => Err(VmError::Exception(thrown)),
                _ => Err(VmError::exception(value, cx.capture_stack())),
            }
        }
    }
}

fn step(cx: &mut Context, frame: &mut Frame) -> VmResult<Option<FrameResult>> {
    let func = frame.function();
    let Some(&instruction) = func.instructions.get(frame.ip) else {
        // Fell off the end: implicit `return undefined`.
        return Ok(Some(FrameResult::Return(Value::Undefined)));
    };
    let is_strict = func.flags.is_strict;
    frame.ip += 1;

    match instruction {
        // ---- Constants & stack ----
        Instruction::Const(idx) => {
            let constant = frame
                .module
                .constants
                .get(idx)
                .ok_or(VmError::Bytecode(
                    marten_vm_bytecode::BytecodeError::BadConstant(idx),
                ))?
                .clone();
            let value = match constant {
                Constant::Number(n) => Value::number(n),
                Constant::String(s) => Value::string(s),
                Constant::BigInt(digits) => convert::parse_bigint_literal(&digits)
                    .map(Value::bigint)
                    .ok_or_else(|| VmError::internal("malformed BigInt constant"))?,
            };
            frame.stack.push(value);
        }
        Instruction::PushUndefined => frame.stack.push(Value::Undefined),
        Instruction::PushNull => frame.stack.push(Value::Null),
        Instruction::PushTrue => frame.stack.push(Value::Boolean(true)),
        Instruction::PushFalse => frame.stack.push(Value::Boolean(false)),
        Instruction::PushInt(i) => frame.stack.push(Value::int32(i)),
        Instruction::PushThis => frame.stack.push(frame.this_value.clone()),
        Instruction::PushNewTarget => frame.stack.push(frame.new_target.clone()),
        Instruction::Dup => {
            let top = peek(frame)?.clone();
            frame.stack.push(top);
        }
        Instruction::Swap => {
            let len = frame.stack.len();
            if len < 2 {
                return Err(stack_underflow());
            }
            frame.stack.swap(len - 1, len - 2);
        }
        Instruction::Pop => {
            pop(frame)?;
        }

        // ---- Locals, captures, globals ----
        Instruction::LoadLocal(i) => {
            let v = frame.load_local(i);
            frame.stack.push(v);
        }
        Instruction::StoreLocal(i) => {
            let v = pop(frame)?;
            frame.store_local(i, v);
        }
        Instruction::LoadCapture(i) => {
            let cell = frame
                .captures
                .get(i as usize)
                .ok_or_else(|| VmError::internal("capture index out of bounds"))?;
            frame.stack.push(cell.get());
        }
        Instruction::StoreCapture(i) => {
            let v = pop(frame)?;
            let cell = frame
                .captures
                .get(i as usize)
                .ok_or_else(|| VmError::internal("capture index out of bounds"))?;
            cell.set(v);
        }
        Instruction::LoadGlobal(name_idx) => {
            let name = constant_string(&frame.module, name_idx)?;
            let key = cx.key(&name);
            let global = cx.global().clone();
            if !global.has(cx, &key)? {
                return Err(VmError::reference_error(format!("{name} is not defined")));
            }
            let receiver = Value::Object(global.clone());
            let value = global.get(cx, &key, &receiver)?;
            frame.stack.push(value);
        }
        Instruction::StoreGlobal(name_idx) => {
            let name = constant_string(&frame.module, name_idx)?;
            let key = cx.key(&name);
            let value = pop(frame)?;
            let global = cx.global().clone();
            let receiver = Value::Object(global.clone());
            let ok = global.set(cx, &key, value, &receiver)?;
            if !ok && is_strict {
                return Err(VmError::type_error(format!(
                    "Cannot assign to read only property '{name}'"
                )));
            }
        }

        // ---- Arithmetic ----
        Instruction::Add => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            frame.stack.push(add_values(cx, &a, &b)?);
        }
        Instruction::Sub => binary_numeric(cx, frame, |x, y| x - y, |x, y| Ok(x - y))?,
        Instruction::Mul => binary_numeric(cx, frame, |x, y| x * y, |x, y| Ok(x * y))?,
        Instruction::Div => binary_numeric(
            cx,
            frame,
            |x, y| x / y,
            |x, y| {
                if y.is_zero() {
                    Err(VmError::range_error("Division by zero"))
                } else {
                    Ok(x / y)
                }
            },
        )?,
        Instruction::Rem => binary_numeric(
            cx,
            frame,
            |x, y| x % y,
            |x, y| {
                if y.is_zero() {
                    Err(VmError::range_error("Division by zero"))
                } else {
                    Ok(x % y)
                }
            },
        )?,
        Instruction::Pow => binary_numeric(
            cx,
            frame,
            |x, y| x.powf(y),
            |x, y| {
                let exp = y
                    .to_u32()
                    .ok_or_else(|| VmError::range_error("Exponent must be non-negative"))?;
                Ok(x.pow(exp))
            },
        )?,
        Instruction::Neg => {
            let v = pop(frame)?;
            let n = convert::to_numeric(cx, &v)?;
            frame.stack.push(match n {
                Value::BigInt(b) => Value::bigint(-(*b).clone()),
                Value::Number(x) => Value::number(-x),
                _ => unreachable!(),
            });
        }
        Instruction::ToNumber => {
            let v = pop(frame)?;
            let n = convert::to_numeric(cx, &v)?;
            if n.is_bigint() {
                return Err(VmError::type_error("Cannot convert a BigInt to a number"));
            }
            frame.stack.push(n);
        }
        Instruction::Not => {
            let v = pop(frame)?;
            frame.stack.push(Value::Boolean(!v.is_truthy()));
        }
        Instruction::BitAnd => binary_int(cx, frame, |x, y| x & y, |x, y| x & y)?,
        Instruction::BitOr => binary_int(cx, frame, |x, y| x | y, |x, y| x | y)?,
        Instruction::BitXor => binary_int(cx, frame, |x, y| x ^ y, |x, y| x ^ y)?,
        Instruction::BitNot => {
            let v = pop(frame)?;
            let n = convert::to_numeric(cx, &v)?;
            frame.stack.push(match n {
                Value::BigInt(b) => Value::bigint(!(*b).clone()),
                Value::Number(x) => Value::int32(!convert::to_int32(x)),
                _ => unreachable!(),
            });
        }
        Instruction::Shl => shift_op(cx, frame, ShiftKind::Left)?,
        Instruction::Shr => shift_op(cx, frame, ShiftKind::Right)?,
        Instruction::UShr => shift_op(cx, frame, ShiftKind::UnsignedRight)?,

        // ---- Comparison ----
        Instruction::Eq => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let eq = convert::abstract_equals(cx, &a, &b)?;
            frame.stack.push(Value::Boolean(eq));
        }
        Instruction::Ne => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let eq = convert::abstract_equals(cx, &a, &b)?;
            frame.stack.push(Value::Boolean(!eq));
        }
        Instruction::StrictEq => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            frame.stack.push(Value::Boolean(a.strict_equals(&b)));
        }
        Instruction::StrictNe => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            frame.stack.push(Value::Boolean(!a.strict_equals(&b)));
        }
        Instruction::Lt => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let r = convert::abstract_less_than(cx, &a, &b, true)?.unwrap_or(false);
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::Gt => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let r = convert::abstract_less_than(cx, &b, &a, false)?.unwrap_or(false);
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::Le => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let r = match convert::abstract_less_than(cx, &b, &a, false)? {
                Some(true) | None => false,
                Some(false) => true,
            };
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::Ge => {
            let b = pop(frame)?;
            let a = pop(frame)?;
            let r = match convert::abstract_less_than(cx, &a, &b, true)? {
                Some(true) | None => false,
                Some(false) => true,
            };
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::In => {
            let object = pop(frame)?;
            let key_value = pop(frame)?;
            let Value::Object(obj) = &object else {
                return Err(VmError::type_error(
                    "Cannot use 'in' operator to search in a non-object",
                ));
            };
            let key = convert::to_property_key(cx, &key_value)?;
            let found = obj.has(cx, &key)?;
            frame.stack.push(Value::Boolean(found));
        }
        Instruction::InstanceOf => {
            let target = pop(frame)?;
            let value = pop(frame)?;
            let r = instance_of(cx, &value, &target)?;
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::TypeOf => {
            let v = pop(frame)?;
            frame.stack.push(Value::string(v.type_of()));
        }

        // ---- Property access ----
        Instruction::GetByName(name_idx) => {
            let name = constant_string(&frame.module, name_idx)?;
            let base = pop(frame)?;
            let key = cx.key(&name);
            let value = convert::get_property_of_value(cx, &base, &key)?;
            frame.stack.push(value);
        }
        Instruction::SetByName(name_idx) => {
            let name = constant_string(&frame.module, name_idx)?;
            let value = pop(frame)?;
            let base = pop(frame)?;
            let key = cx.key(&name);
            set_property(cx, &base, &key, value, is_strict)?;
        }
        Instruction::GetByValue => {
            let key_value = pop(frame)?;
            let base = pop(frame)?;
            let key = convert::to_property_key(cx, &key_value)?;
            let value = convert::get_property_of_value(cx, &base, &key)?;
            frame.stack.push(value);
        }
        Instruction::SetByValue => {
            let value = pop(frame)?;
            let key_value = pop(frame)?;
            let base = pop(frame)?;
            let key = convert::to_property_key(cx, &key_value)?;
            set_property(cx, &base, &key, value, is_strict)?;
        }
        Instruction::DeleteByName(name_idx) => {
            let name = constant_string(&frame.module, name_idx)?;
            let base = pop(frame)?;
            let key = cx.key(&name);
            let r = delete_property(cx, &base, &key, is_strict)?;
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::DeleteByValue => {
            let key_value = pop(frame)?;
            let base = pop(frame)?;
            let key = convert::to_property_key(cx, &key_value)?;
            let r = delete_property(cx, &base, &key, is_strict)?;
            frame.stack.push(Value::Boolean(r));
        }
        Instruction::DefineDataProperty => {
            let value = pop(frame)?;
            let key_value = pop(frame)?;
            let object = peek(frame)?.clone();
            let Value::Object(obj) = &object else {
                return Err(VmError::internal("DefineDataProperty on non-object"));
            };
            let key = convert::to_property_key(cx, &key_value)?;
            obj.create_data_property(cx, key, value)?;
        }

        // ---- Literals ----
        Instruction::NewObject => {
            let proto = cx.intrinsics().object_prototype.clone();
            frame.stack.push(Value::Object(JsObject::ordinary(Some(proto))));
        }
        Instruction::NewArray(n) => {
            let elements = pop_n(frame, n as usize)?;
            let arr = array::new_array(cx, elements);
            frame.stack.push(Value::Object(arr));
        }

        // ---- Control flow ----
        Instruction::Jump(target) => {
            jump(cx, frame, target)?;
        }
        Instruction::JumpIfFalse(target) => {
            let v = pop(frame)?;
            if !v.is_truthy() {
                jump(cx, frame, target)?;
            }
        }
        Instruction::JumpIfTrue(target) => {
            let v = pop(frame)?;
            if v.is_truthy() {
                jump(cx, frame, target)?;
            }
        }
        Instruction::TryEnter {
            catch_pc,
            finally_pc,
        } => {
            frame.handlers.push(TryHandler {
                catch_pc,
                finally_pc,
                stack_depth: frame.stack.len(),
            });
        }
        Instruction::TryLeave => {
            frame.handlers.pop();
            cx.set_in_catch_handler(false);
        }
        Instruction::Throw => {
            let v = pop(frame)?;
            return Err(VmError::exception(v, cx.capture_stack()));
        }

        // ---- Calls ----
        Instruction::Call(argc) => {
            let args = pop_n(frame, argc as usize)?;
            let this = pop(frame)?;
            let callee = pop(frame)?;
            let result = call_value(cx, &callee, &this, &args)?;
            frame.stack.push(result);
        }
        Instruction::TailCall(argc) => {
            let args = pop_n(frame, argc as usize)?;
            let this = pop(frame)?;
            let callee = pop(frame)?;
            let result = call_value(cx, &callee, &this, &args)?;
            return Ok(Some(FrameResult::Return(result)));
        }
        Instruction::New(argc) => {
            let args = pop_n(frame, argc as usize)?;
            let callee = pop(frame)?;
            let result = construct_value(cx, &callee, &args, &callee)?;
            frame.stack.push(result);
        }
        Instruction::Return => {
            let v = pop(frame).unwrap_or(Value::Undefined);
            return Ok(Some(FrameResult::Return(v)));
        }

        // ---- Closures ----
        Instruction::MakeClosure(function_index) => {
            let module = frame.module.clone();
            let target = module.function(function_index).ok_or(VmError::Bytecode(
                marten_vm_bytecode::BytecodeError::BadFunction(function_index),
            ))?;
            let mut cells = Vec::with_capacity(target.captures.len());
            for capture in &target.captures {
                cells.push(match capture {
                    CaptureSource::Local(i) => frame.capture_cell(*i),
                    CaptureSource::Capture(i) => frame
                        .captures
                        .get(*i as usize)
                        .cloned()
                        .ok_or_else(|| VmError::internal("transitive capture out of bounds"))?,
                });
            }
            let lexical_this = if target.flags.is_arrow {
                Some(frame.this_value.clone())
            } else {
                None
            };
            let closure = function::make_closure(
                cx,
                frame.module.clone(),
                function_index,
                cells,
                lexical_this,
            );
            frame.stack.push(Value::Object(closure));
        }

        // ---- Generators & async ----
        Instruction::Yield => {
            let v = pop(frame)?;
            return Ok(Some(FrameResult::Yield(v)));
        }
        Instruction::YieldDelegate => {
            let sent = if frame.delegating.is_some() {
                pop(frame)?
            } else {
                let iterable = pop(frame)?;
                let iterator = get_iterator(cx, &iterable)?;
                frame.delegating = Some(iterator);
                Value::Undefined
            };
            let iterator = frame.delegating.clone().expect("set above");
            let (value, done) = iterator_next(cx, &iterator, sent)?;
            if done {
                frame.delegating = None;
                frame.stack.push(value);
            } else {
                // Stay on this instruction; the resumed value feeds the next
                // inner `next` call.
                frame.ip -= 1;
                return Ok(Some(FrameResult::Yield(value)));
            }
        }
        Instruction::Await => {
            let v = pop(frame)?;
            return Ok(Some(FrameResult::Await(v)));
        }
    }
    Ok(None)
}

// ====================================================================
// Operation helpers
// ====================================================================

fn peek<'a>(frame: &'a Frame) -> VmResult<&'a Value> {
    frame.stack.last().ok_or_else(stack_underflow)
}

fn pop(frame: &mut Frame) -> VmResult<Value> {
    frame.stack.pop().ok_or_else(stack_underflow)
}

fn pop_n(frame: &mut Frame, n: usize) -> VmResult<Vec<Value>> {
    if frame.stack.len() < n {
        return Err(stack_underflow());
    }
    Ok(frame.stack.split_off(frame.stack.len() - n))
}

fn stack_underflow() -> VmError {
    VmError::internal("value stack underflow")
}

fn jump(cx: &mut Context, frame: &mut Frame, target: u32) -> VmResult<()> {
    // Back-edges are the interrupt check points.
    if (target as usize) < frame.ip && cx.is_interrupted() {
        return Err(VmError::Interrupted);
    }
    frame.ip = target as usize;
    Ok(())
}

fn constant_string(module: &Module, idx: u32) -> VmResult<String> {
    module
        .constants
        .get_string(idx)
        .map(str::to_string)
        .ok_or(VmError::Bytecode(
            marten_vm_bytecode::BytecodeError::BadConstant(idx),
        ))
}

fn set_property(
    cx: &mut Context,
    base: &Value,
    key: &PropertyKey,
    value: Value,
    is_strict: bool,
) -> VmResult<()> {
    match base {
        Value::Object(obj) => {
            let ok = obj.set(cx, key, value, base)?;
            if !ok && is_strict {
                return Err(VmError::type_error(format!(
                    "Cannot assign to read only property '{}'",
                    key_display(cx, key)
                )));
            }
            Ok(())
        }
        Value::Undefined | Value::Null => Err(VmError::type_error(format!(
            "Cannot set properties of {}",
            if base.is_undefined() { "undefined" } else { "null" }
        ))),
        // Property writes on primitives are dropped (strict mode throws).
        _ if is_strict => Err(VmError::type_error(format!(
            "Cannot create property '{}' on {}",
            key_display(cx, key),
            base.type_of()
        ))),
        _ => Ok(()),
    }
}

fn delete_property(
    cx: &mut Context,
    base: &Value,
    key: &PropertyKey,
    is_strict: bool,
) -> VmResult<bool> {
    match base {
        Value::Object(obj) => {
            let ok = obj.delete(cx, key)?;
            if !ok && is_strict {
                return Err(VmError::type_error(format!(
                    "Cannot delete property '{}'",
                    key_display(cx, key)
                )));
            }
            Ok(ok)
        }
        Value::Undefined | Value::Null => Err(VmError::type_error(
            "Cannot convert undefined or null to object",
        )),
        _ => Ok(true),
    }
}

fn key_display(cx: &mut Context, key: &PropertyKey) -> String {
    match key {
        PropertyKey::Index(i) => i.to_string(),
        PropertyKey::Atom(a) => cx.atom_name(*a).as_str().to_string(),
        PropertyKey::Symbol(s) => s.to_display_string(),
    }
}

/// ES addition: string concatenation wins, BigInts stay together.
pub fn add_values(cx: &mut Context, a: &Value, b: &Value) -> VmResult<Value> {
    let pa = convert::to_primitive(cx, a, PreferredType::Default)?;
    let pb = convert::to_primitive(cx, b, PreferredType::Default)?;
    if pa.is_string() || pb.is_string() {
        let sa = convert::to_string_value(cx, &pa)?;
        let sb = convert::to_string_value(cx, &pb)?;
        return Ok(Value::from_js_string(sa.concat(&sb)));
    }
    let na = convert::to_numeric(cx, &pa)?;
    let nb = convert::to_numeric(cx, &pb)?;
    match (na, nb) {
        (Value::BigInt(x), Value::BigInt(y)) => Ok(Value::bigint((*x).clone() + (*y).clone())),
        (Value::Number(x), Value::Number(y)) => Ok(Value::number(x + y)),
        _ => Err(VmError::type_error(
            "Cannot mix BigInt and other types, use explicit conversions",
        )),
    }
}

fn binary_numeric(
    cx: &mut Context,
    frame: &mut Frame,
    num_op: impl Fn(f64, f64) -> f64,
    big_op: impl Fn(&BigInt, &BigInt) -> VmResult<BigInt>,
) -> VmResult<()> {
    let b = pop(frame)?;
    let a = pop(frame)?;
    let na = convert::to_numeric(cx, &a)?;
    let nb = convert::to_numeric(cx, &b)?;
    let result = match (na, nb) {
        (Value::BigInt(x), Value::BigInt(y)) => Value::bigint(big_op(&x, &y)?),
        (Value::Number(x), Value::Number(y)) => Value::number(num_op(x, y)),
        _ => {
            return Err(VmError::type_error(
                "Cannot mix BigInt and other types, use explicit conversions",
            ));
        }
    };
    frame.stack.push(result);
    Ok(())
}

fn binary_int(
    cx: &mut Context,
    frame: &mut Frame,
    int_op: impl Fn(i32, i32) -> i32,
    big_op: impl Fn(&BigInt, &BigInt) -> BigInt,
) -> VmResult<()> {
    let b = pop(frame)?;
    let a = pop(frame)?;
    let na = convert::to_numeric(cx, &a)?;
    let nb = convert::to_numeric(cx, &b)?;
    let result = match (na, nb) {
        (Value::BigInt(x), Value::BigInt(y)) => Value::bigint(big_op(&x, &y)),
        (Value::Number(x), Value::Number(y)) => {
            Value::int32(int_op(convert::to_int32(x), convert::to_int32(y)))
        }
        _ => {
            return Err(VmError::type_error(
                "Cannot mix BigInt and other types, use explicit conversions",
            ));
        }
    };
    frame.stack.push(result);
    Ok(())
}

enum ShiftKind {
    Left,
    Right,
    UnsignedRight,
}

fn shift_op(cx: &mut Context, frame: &mut Frame, kind: ShiftKind) -> VmResult<()> {
    let b = pop(frame)?;
    let a = pop(frame)?;
    let na = convert::to_numeric(cx, &a)?;
    let nb = convert::to_numeric(cx, &b)?;
    let result = match (na, nb) {
        (Value::BigInt(x), Value::BigInt(y)) => {
            let shift = y
                .to_i64()
                .ok_or_else(|| VmError::range_error("BigInt shift amount too large"))?;
            match kind {
                ShiftKind::Left => {
                    if shift >= 0 {
                        Value::bigint((*x).clone() << shift as usize)
                    } else {
                        Value::bigint((*x).clone() >> (-shift) as usize)
                    }
                }
                ShiftKind::Right => {
                    if shift >= 0 {
                        Value::bigint((*x).clone() >> shift as usize)
                    } else {
                        Value::bigint((*x).clone() << (-shift) as usize)
                    }
                }
                ShiftKind::UnsignedRight => {
                    return Err(VmError::type_error(
                        "BigInts have no unsigned right shift, use >> instead",
                    ));
                }
            }
        }
        (Value::Number(x), Value::Number(y)) => {
            let shift = (convert::to_uint32(y) & 31) as u32;
            match kind {
                ShiftKind::Left => Value::int32(convert::to_int32(x).wrapping_shl(shift)),
                ShiftKind::Right => Value::int32(convert::to_int32(x).wrapping_shr(shift)),
                ShiftKind::UnsignedRight => {
                    Value::number((convert::to_uint32(x) >> shift) as f64)
                }
            }
        }
        _ => {
            return Err(VmError::type_error(
                "Cannot mix BigInt and other types, use explicit conversions",
            ));
        }
    };
    frame.stack.push(result);
    Ok(())
}

/// `instanceof`, consulting `@@hasInstance`.
pub fn instance_of(cx: &mut Context, value: &Value, target: &Value) -> VmResult<bool> {
    let Value::Object(target_obj) = target else {
        return Err(VmError::type_error(
            "Right-hand side of 'instanceof' is not an object",
        ));
    };
    let has_instance_key = PropertyKey::Symbol(cx.well_known().has_instance.clone());
    let method = target_obj.get(cx, &has_instance_key, target)?;
    if method.is_callable() {
        let r = call_value(cx, &method, target, &[value.clone()])?;
        return Ok(r.is_truthy());
    }
    if !target_obj.is_callable() {
        return Err(VmError::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    }
    ordinary_has_instance(cx, value, target)
}

/// OrdinaryHasInstance: walk the prototype chain against `target.prototype`.
pub fn ordinary_has_instance(cx: &mut Context, value: &Value, target: &Value) -> VmResult<bool> {
    let Value::Object(target_obj) = target else {
        return Ok(false);
    };
    if let ObjectKind::BoundFunction(bound) = target_obj.kind() {
        let inner = bound.target.clone();
        return ordinary_has_instance(cx, value, &inner);
    }
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    let proto_value = target_obj.get(cx, &PropertyKey::Atom(atoms::PROTOTYPE), target)?;
    let Value::Object(target_proto) = proto_value else {
        return Err(VmError::type_error(
            "Function has non-object prototype in instanceof check",
        ));
    };
    let mut cursor = obj.proto();
    let mut depth = 0usize;
    while let Some(p) = cursor {
        if GcRef::ptr_eq(&p, &target_proto) {
            return Ok(true);
        }
        depth += 1;
        if depth > crate::object::PROXY_DEPTH_LIMIT {
            return Err(VmError::type_error("too much recursion"));
        }
        cursor = p.proto();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_handler_shape() {
        let h = TryHandler {
            catch_pc: 5,
            finally_pc: u32::MAX,
            stack_depth: 2,
        };
        assert_eq!(h.catch_pc, 5);
        assert_eq!(h.finally_pc, u32::MAX);
    }
}
