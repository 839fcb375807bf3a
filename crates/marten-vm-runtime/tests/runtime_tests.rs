//! Event loop ordering, builder wiring, and the module cache contract.

use parking_lot::Mutex;
use std::sync::Arc;

use marten_vm_bytecode::{Function, Instruction, Module};
use marten_vm_core::compiler::{CompiledScript, Compiler, CompilerError, SourceKind};
use marten_vm_core::intrinsics::{BufferSink, ConsoleLevel};
use marten_vm_core::{Context, Value};
use marten_vm_runtime::{EventLoop, ModuleLoader, RuntimeBuilder, StaticResolver};

/// Every program compiles to `return 42` — enough to exercise the plumbing.
struct ConstCompiler {
    compiled: Mutex<Vec<String>>,
}

impl ConstCompiler {
    fn new() -> Self {
        Self {
            compiled: Mutex::new(Vec::new()),
        }
    }
}

impl Compiler for ConstCompiler {
    fn compile(
        &self,
        _source: &str,
        filename: &str,
        _kind: SourceKind,
    ) -> Result<CompiledScript, CompilerError> {
        self.compiled.lock().push(filename.to_string());
        let mut b = Module::builder(filename);
        b.add_function(
            Function::builder()
                .name("<eval>")
                .max_stack(1)
                .instruction(Instruction::PushInt(42))
                .instruction(Instruction::Return)
                .build(),
        );
        Ok(CompiledScript::new(b.build()))
    }
}

#[test]
fn builder_wires_compiler_and_console_sink() {
    let sink = Arc::new(BufferSink::new());
    let (_rt, mut cx) = RuntimeBuilder::new()
        .compiler(Arc::new(ConstCompiler::new()))
        .console_sink(sink.clone())
        .max_stack_depth(64)
        .build();

    let v = cx.eval("anything", "main.js", false).unwrap();
    assert!(v.strict_equals(&Value::int32(42)));

    // console.log routes into the configured sink.
    let global = cx.global().clone();
    let console_key = cx.key("console");
    let console = global
        .get(&mut cx, &console_key, &Value::Object(global.clone()))
        .unwrap();
    let Value::Object(console_obj) = &console else {
        panic!("console missing");
    };
    let log_key = cx.key("log");
    let log = console_obj.get(&mut cx, &log_key, &console).unwrap();
    marten_vm_core::interpreter::call_value(
        &mut cx,
        &log,
        &console,
        &[Value::string("hello"), Value::int32(7)],
    )
    .unwrap();

    let lines = sink.drain();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, ConsoleLevel::Info);
    assert_eq!(lines[0].1, "hello 7");
}

#[test]
fn event_loop_drains_microtasks_between_macrotasks() {
    let (_rt, mut cx) = RuntimeBuilder::new()
        .compiler(Arc::new(ConstCompiler::new()))
        .build();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut event_loop = EventLoop::new();
    let first = log.clone();
    event_loop.post(move |cx: &mut Context| {
        first.lock().push("macro-1");
        let micro = first.clone();
        cx.enqueue_microtask(Box::new(move |_cx: &mut Context| {
            micro.lock().push("micro-1");
        }));
    });
    let second = log.clone();
    event_loop.post(move |_cx: &mut Context| {
        second.lock().push("macro-2");
    });

    event_loop.run_until_idle(&mut cx);
    assert_eq!(*log.lock(), vec!["macro-1", "micro-1", "macro-2"]);
    assert!(event_loop.is_empty());
}

#[test]
fn module_loader_compiles_once_and_caches() {
    let compiler = Arc::new(ConstCompiler::new());
    let (_rt, mut cx) = RuntimeBuilder::new().compiler(compiler.clone()).build();

    let resolver = StaticResolver::new().add("app", "whatever");
    let loader = ModuleLoader::new(Arc::new(resolver));

    let v = loader.load(&mut cx, "app").unwrap();
    assert!(v.strict_equals(&Value::int32(42)));
    assert_eq!(compiler.compiled.lock().len(), 1);

    // A second load is served from the cache without recompiling.
    loader.load(&mut cx, "app").unwrap();
    assert_eq!(compiler.compiled.lock().len(), 1);

    // The record is marked evaluated.
    let record = cx.load_module("app").unwrap();
    assert!(record.evaluated);

    // Unresolvable specifiers fail.
    assert!(loader.load(&mut cx, "missing").is_err());
}
