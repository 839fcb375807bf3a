//! Context eval: declaration instantiation, exception surfacing, frame
//! isolation, and VM execution through a stub compiler collaborator.

use std::sync::Arc;

use marten_vm_bytecode::{Declarations, Function, Instruction, Module};
use marten_vm_core::compiler::{CompiledScript, Compiler, CompilerError, SourceKind};
use marten_vm_core::generator::ResumeMode;
use marten_vm_core::{Context, Runtime, Value, VmError};

/// Compiles the handful of programs the suite drives, as a real front end
/// would — source in, module + declarations out.
struct StubCompiler;

impl Compiler for StubCompiler {
    fn compile(
        &self,
        source: &str,
        filename: &str,
        _kind: SourceKind,
    ) -> Result<CompiledScript, CompilerError> {
        let module = match source {
            "let x = 1;" => {
                let mut b = Module::builder(filename);
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(1)
                        .instruction(Instruction::PushInt(1))
                        .instruction(Instruction::Return)
                        .build(),
                );
                b.declarations(Declarations::new().lex_name("x")).build()
            }
            "var x = 2;" => {
                let mut b = Module::builder(filename);
                let x = b.constants_mut().add_string("x");
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(2)
                        .instruction(Instruction::PushInt(2))
                        .instruction(Instruction::Dup)
                        .instruction(Instruction::StoreGlobal(x))
                        .instruction(Instruction::Return)
                        .build(),
                );
                b.declarations(Declarations::new().var_name("x")).build()
            }
            "6 * 7" => {
                let mut b = Module::builder(filename);
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(2)
                        .instruction(Instruction::PushInt(6))
                        .instruction(Instruction::PushInt(7))
                        .instruction(Instruction::Mul)
                        .instruction(Instruction::Return)
                        .build(),
                );
                b.build()
            }
            "throw 'boom'" => {
                let mut b = Module::builder(filename);
                let boom = b.constants_mut().add_string("boom");
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(1)
                        .instruction(Instruction::Const(boom))
                        .instruction(Instruction::Throw)
                        .build(),
                );
                b.build()
            }
            "try { throw 'boom' } catch (e) { e }" => {
                let mut b = Module::builder(filename);
                let boom = b.constants_mut().add_string("boom");
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(2)
                        .instruction(Instruction::TryEnter {
                            catch_pc: 4,
                            finally_pc: u32::MAX,
                        })
                        .instruction(Instruction::Const(boom))
                        .instruction(Instruction::Throw)
                        .instruction(Instruction::PushUndefined)
                        // catch pad: the thrown value is on the stack
                        .instruction(Instruction::Return)
                        .build(),
                );
                b.build()
            }
            "this" => {
                let mut b = Module::builder(filename);
                b.add_function(
                    Function::builder()
                        .name("<eval>")
                        .max_stack(1)
                        .instruction(Instruction::PushThis)
                        .instruction(Instruction::Return)
                        .build(),
                );
                b.build()
            }
            "counter()" => counter_module(filename),
            "generator()" => generator_module(filename),
            "asyncFn()" => async_module(filename),
            "oops(" => {
                return Err(CompilerError {
                    message: "Unexpected end of input".to_string(),
                    line: 1,
                    column: 6,
                });
            }
            other => {
                return Err(CompilerError {
                    message: format!("stub compiler has no program for {other:?}"),
                    line: 1,
                    column: 1,
                });
            }
        };
        Ok(CompiledScript::new(module))
    }
}

/// `function make() { let c = 0; return () => ++c; }` driven twice.
fn counter_module(filename: &str) -> Module {
    let mut b = Module::builder(filename);
    // fn 0: entry — build the factory, call it, call the counter twice.
    b.add_function(
        Function::builder()
            .name("<eval>")
            .max_stack(4)
            .instruction(Instruction::MakeClosure(1))
            .instruction(Instruction::PushUndefined)
            .instruction(Instruction::Call(0)) // -> counter closure
            .instruction(Instruction::Dup)
            .instruction(Instruction::PushUndefined)
            .instruction(Instruction::Call(0)) // -> 1
            .instruction(Instruction::Pop)
            .instruction(Instruction::PushUndefined)
            .instruction(Instruction::Call(0)) // -> 2
            .instruction(Instruction::Return)
            .build(),
    );
    // fn 1: the factory — hoists `c` into a cell via the closure capture.
    b.add_function(
        Function::builder()
            .name("make")
            .local_count(1)
            .max_stack(2)
            .instruction(Instruction::PushInt(0))
            .instruction(Instruction::StoreLocal(0))
            .instruction(Instruction::MakeClosure(2))
            .instruction(Instruction::Return)
            .build(),
    );
    // fn 2: `() => ++c`
    b.add_function(
        Function::builder()
            .name("bump")
            .max_stack(3)
            .capture(marten_vm_bytecode::CaptureSource::Local(0))
            .instruction(Instruction::LoadCapture(0))
            .instruction(Instruction::PushInt(1))
            .instruction(Instruction::Add)
            .instruction(Instruction::Dup)
            .instruction(Instruction::StoreCapture(0))
            .instruction(Instruction::Return)
            .build(),
    );
    b.build()
}

/// `function* g() { yield 1; yield 2; return 3; }` — entry returns the
/// generator object.
fn generator_module(filename: &str) -> Module {
    let mut b = Module::builder(filename);
    b.add_function(
        Function::builder()
            .name("<eval>")
            .max_stack(2)
            .instruction(Instruction::MakeClosure(1))
            .instruction(Instruction::PushUndefined)
            .instruction(Instruction::Call(0))
            .instruction(Instruction::Return)
            .build(),
    );
    b.add_function(
        Function::builder()
            .name("g")
            .is_generator(true)
            .max_stack(2)
            .instruction(Instruction::PushInt(1))
            .instruction(Instruction::Yield)
            .instruction(Instruction::Pop) // sent value, unused
            .instruction(Instruction::PushInt(2))
            .instruction(Instruction::Yield)
            .instruction(Instruction::Pop)
            .instruction(Instruction::PushInt(3))
            .instruction(Instruction::Return)
            .build(),
    );
    b.build()
}

/// `async function a(p) { return (await p) + 1; }` — entry returns the
/// closure itself.
fn async_module(filename: &str) -> Module {
    let mut b = Module::builder(filename);
    b.add_function(
        Function::builder()
            .name("<eval>")
            .max_stack(1)
            .instruction(Instruction::MakeClosure(1))
            .instruction(Instruction::Return)
            .build(),
    );
    b.add_function(
        Function::builder()
            .name("a")
            .param_count(1)
            .local_count(1)
            .is_async(true)
            .max_stack(2)
            .instruction(Instruction::LoadLocal(0))
            .instruction(Instruction::Await)
            .instruction(Instruction::PushInt(1))
            .instruction(Instruction::Add)
            .instruction(Instruction::Return)
            .build(),
    );
    b.build()
}

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let mut cx = runtime.create_context();
    cx.set_compiler(Arc::new(StubCompiler));
    (runtime, cx)
}

fn assert_clean(cx: &Context) {
    assert_eq!(cx.stack_depth(), 0);
    assert!(cx.pending_exception().is_none());
    assert!(!cx.in_catch_handler());
    let this_is_global = match cx.current_this() {
        Value::Object(o) => marten_vm_core::GcRef::ptr_eq(o, cx.global()),
        _ => false,
    };
    assert!(this_is_global);
}

#[test]
fn empty_source_evaluates_to_undefined() {
    let (_rt, mut cx) = new_context();
    let v = cx.eval("", "empty.js", false).unwrap();
    assert!(v.is_undefined());
    assert_clean(&cx);
}

#[test]
fn arithmetic_completion_value() {
    let (_rt, mut cx) = new_context();
    let v = cx.eval("6 * 7", "math.js", false).unwrap();
    assert!(v.strict_equals(&Value::int32(42)));
    assert_clean(&cx);
}

#[test]
fn cross_script_lexical_clash_is_a_syntax_error() {
    // eval "let x = 1;" then "var x = 2;" — the second must fail with
    // SyntaxError and leave the context clean.
    let (_rt, mut cx) = new_context();
    cx.eval("let x = 1;", "a.js", false).unwrap();

    let err = cx.eval("var x = 2;", "b.js", false).unwrap_err();
    let VmError::Exception(thrown) = &err else {
        panic!("expected surfaced exception, got {err:?}");
    };
    assert!(
        thrown
            .message
            .contains("Identifier 'x' has already been declared"),
        "message was {}",
        thrown.message
    );
    assert_clean(&cx);

    // The context still works afterwards.
    let v = cx.eval("6 * 7", "c.js", false).unwrap();
    assert!(v.strict_equals(&Value::int32(42)));
}

#[test]
fn var_then_let_also_clashes() {
    let (_rt, mut cx) = new_context();
    cx.eval("var x = 2;", "a.js", false).unwrap();
    let err = cx.eval("let x = 1;", "b.js", false).unwrap_err();
    assert!(err.to_string().contains("already been declared"));
    assert_clean(&cx);
}

#[test]
fn var_binding_is_installed_before_execution() {
    let (_rt, mut cx) = new_context();
    cx.eval("var x = 2;", "a.js", false).unwrap();
    let key = cx.key("x");
    let global = cx.global().clone();
    let receiver = Value::Object(global.clone());
    let v = global.get(&mut cx, &key, &receiver).unwrap();
    assert!(v.strict_equals(&Value::int32(2)));
    // Global var bindings are non-configurable.
    let prop = global.get_own_property(&mut cx, &key).unwrap().unwrap();
    assert!(!prop.is_configurable());
}

#[test]
fn compiler_errors_surface_as_syntax_errors() {
    let (_rt, mut cx) = new_context();
    let err = cx.eval("oops(", "bad.js", false).unwrap_err();
    let VmError::Exception(thrown) = &err else {
        panic!("expected surfaced exception, got {err:?}");
    };
    assert!(thrown.message.contains("Unexpected end of input"));
    assert_clean(&cx);
}

#[test]
fn thrown_values_surface_and_reset_state() {
    let (_rt, mut cx) = new_context();
    let err = cx.eval("throw 'boom'", "t.js", false).unwrap_err();
    let VmError::Exception(thrown) = &err else {
        panic!("expected surfaced exception, got {err:?}");
    };
    assert!(thrown.value.strict_equals(&Value::string("boom")));
    assert_clean(&cx);
}

#[test]
fn try_catch_lands_on_the_handler() {
    let (_rt, mut cx) = new_context();
    let v = cx
        .eval("try { throw 'boom' } catch (e) { e }", "tc.js", false)
        .unwrap();
    assert!(v.strict_equals(&Value::string("boom")));
    assert_clean(&cx);
}

#[test]
fn direct_eval_runs_with_the_callers_this() {
    let (_rt, mut cx) = new_context();
    let receiver = Value::string("caller-this");
    let v = cx.eval_direct("this", "de.js", receiver.clone()).unwrap();
    assert!(v.strict_equals(&receiver));
    assert_clean(&cx);
}

#[test]
fn closures_share_capture_cells() {
    let (_rt, mut cx) = new_context();
    let v = cx.eval("counter()", "counter.js", false).unwrap();
    assert!(v.strict_equals(&Value::int32(2)));
}

#[test]
fn generator_suspends_and_resumes() {
    let (_rt, mut cx) = new_context();
    let v = cx.eval("generator()", "gen.js", false).unwrap();
    let Value::Object(generator) = v else {
        panic!("expected generator object");
    };

    let (v1, done1) =
        marten_vm_core::interpreter::generator_resume(&mut cx, &generator, ResumeMode::Next(Value::Undefined))
            .unwrap();
    assert!(v1.strict_equals(&Value::int32(1)));
    assert!(!done1);

    let (v2, done2) =
        marten_vm_core::interpreter::generator_resume(&mut cx, &generator, ResumeMode::Next(Value::Undefined))
            .unwrap();
    assert!(v2.strict_equals(&Value::int32(2)));
    assert!(!done2);

    let (v3, done3) =
        marten_vm_core::interpreter::generator_resume(&mut cx, &generator, ResumeMode::Next(Value::Undefined))
            .unwrap();
    assert!(v3.strict_equals(&Value::int32(3)));
    assert!(done3);

    // Exhausted generators answer (undefined, true).
    let (v4, done4) =
        marten_vm_core::interpreter::generator_resume(&mut cx, &generator, ResumeMode::Next(Value::Undefined))
            .unwrap();
    assert!(v4.is_undefined());
    assert!(done4);
}

#[test]
fn await_resumes_through_the_microtask_queue() {
    let (_rt, mut cx) = new_context();
    let closure = cx.eval("asyncFn()", "async.js", false).unwrap();

    let input = marten_vm_core::promise::new_promise(&mut cx);
    marten_vm_core::promise::resolve_with(&mut cx, &input, Value::int32(41)).unwrap();

    let result = marten_vm_core::interpreter::call_value(
        &mut cx,
        &closure,
        &Value::Undefined,
        &[Value::Object(input)],
    )
    .unwrap();
    let Value::Object(result_promise) = result else {
        panic!("async call must answer a promise");
    };

    // Still pending until the queue drains.
    assert!(matches!(
        marten_vm_core::promise::state_of(&result_promise),
        marten_vm_core::promise::PromiseState::Pending
    ));
    cx.process_microtasks();
    match marten_vm_core::promise::state_of(&result_promise) {
        marten_vm_core::promise::PromiseState::Fulfilled(v) => {
            assert!(v.strict_equals(&Value::int32(42)));
        }
        other => panic!("expected fulfillment, got {other:?}"),
    }
}

#[test]
fn stack_overflow_is_a_range_error() {
    let (_rt, mut cx) = new_context();
    cx.set_max_stack_depth(8);
    // Each eval frame occupies a slot; nested closures do the rest. Easiest
    // probe: push frames via eval itself.
    for _ in 0..7 {
        cx.push_frame_info("probe", "probe.js", 0).unwrap();
    }
    let err = cx.eval("6 * 7", "deep.js", false).unwrap_err();
    let VmError::Exception(thrown) = &err else {
        panic!("expected surfaced exception, got {err:?}");
    };
    assert!(thrown.message.contains("Maximum call stack size exceeded"));
    for _ in 0..7 {
        cx.pop_frame_info();
    }
}
