//! Execution context
//!
//! A `Context` is an isolated execution environment inside a [`Runtime`]. It
//! owns the global object, the module cache, the call-stack metadata, the
//! pending-exception slot, and the per-context microtask queue. No object
//! reference may cross contexts; the atom table and job hooks on the runtime
//! are the only shared state.

use indexmap::IndexMap;
use marten_vm_bytecode::{Declarations, Module};
use marten_vm_gc::{GcRef, WeakGc};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::atom::Atom;
use crate::compiler::{Compiler, SourceKind};
use crate::convert;
use crate::error::{JsErrorKind, StackFrame, VmError, VmResult};
use crate::function;
use crate::interpreter;
use crate::intrinsics::{self, ConsoleSink, Intrinsics, TracingSink};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::runtime::Runtime;
use crate::string::JsString;
use crate::symbol::WellKnownSymbols;
use crate::value::Value;

/// Default call-stack limit.
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1000;

/// How a piece of source enters the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Top-level script
    Script,
    /// ES module source (cache contract only; no linking)
    Module,
    /// Direct `eval` — runs with the caller's `this`
    DirectEval,
}

/// A deferred job on the per-context microtask queue.
pub type Job = Box<dyn FnOnce(&mut Context)>;

/// A cached module record.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// The specifier the module was registered under
    pub specifier: String,
    /// The compiled module
    pub module: Arc<Module>,
    /// Whether top-level evaluation has run
    pub evaluated: bool,
}

/// An isolated execution environment.
pub struct Context {
    runtime: Arc<Runtime>,
    id: u64,
    global: GcRef<JsObject>,
    intrinsics: Intrinsics,
    module_cache: IndexMap<String, ModuleRecord>,

    // Call stack metadata (the value stacks live in interpreter frames).
    frames: Vec<StackFrame>,
    max_stack_depth: usize,

    // Exception state.
    pending_exception: Option<Value>,
    in_catch_handler: bool,
    current_this: Value,

    // Microtasks.
    microtasks: VecDeque<Job>,
    promise_reject_callback: Option<Arc<dyn Fn(&mut Context, Value)>>,

    // Cross-script declaration registries (GlobalDeclarationInstantiation).
    global_var_names: FxHashSet<Atom>,
    global_lex_names: FxHashSet<Atom>,

    // `new.target` for the active native constructor call.
    new_target_stack: Vec<Value>,

    // Finalization: registries created here, plus the sweep hint the
    // runtime's monitor thread raises when a watched target dies.
    registries: Vec<WeakGc<JsObject>>,
    finalization_hint: Arc<AtomicBool>,

    interrupt: Arc<AtomicBool>,
    compiler: Option<Arc<dyn Compiler>>,
    console_sink: Arc<dyn ConsoleSink>,
}

impl Context {
    /// Create a context inside `runtime`, with the global surface installed
    /// in the fixed dependency order.
    pub(crate) fn new(runtime: Arc<Runtime>, id: u64) -> Self {
        let intrinsics = Intrinsics::bootstrap();
        let global = JsObject::ordinary(Some(intrinsics.object_prototype.clone()));
        let interrupt = runtime.interrupt_flag();
        let mut cx = Self {
            runtime,
            id,
            global: global.clone(),
            intrinsics,
            module_cache: IndexMap::new(),
            frames: Vec::new(),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            pending_exception: None,
            in_catch_handler: false,
            current_this: Value::Object(global),
            microtasks: VecDeque::new(),
            promise_reject_callback: None,
            global_var_names: FxHashSet::default(),
            global_lex_names: FxHashSet::default(),
            new_target_stack: Vec::new(),
            registries: Vec::new(),
            finalization_hint: Arc::new(AtomicBool::new(false)),
            interrupt,
            compiler: None,
            console_sink: Arc::new(TracingSink),
        };
        intrinsics::install_globals(&mut cx);
        cx
    }

    /// The owning runtime.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Context id within the runtime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The global object.
    pub fn global(&self) -> &GcRef<JsObject> {
        &self.global
    }

    /// The intrinsic registry.
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Intern a string in the runtime's atom table.
    pub fn atom(&self, s: &str) -> Atom {
        self.runtime.atoms().intern(s)
    }

    /// Resolve an atom back to its string.
    pub fn atom_name(&self, atom: Atom) -> Arc<JsString> {
        self.runtime.atoms().name(atom)
    }

    /// Property key for a name, recognizing canonical indices.
    pub fn key(&mut self, s: &str) -> PropertyKey {
        match PropertyKey::index_from_str(s) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::Atom(self.atom(s)),
        }
    }

    /// The runtime's well-known symbols.
    pub fn well_known(&self) -> &WellKnownSymbols {
        self.runtime.well_known()
    }

    /// Current `this` binding for top-level code.
    pub fn current_this(&self) -> &Value {
        &self.current_this
    }

    // ================================================================
    // Configuration
    // ================================================================

    /// Install the compiler collaborator.
    pub fn set_compiler(&mut self, compiler: Arc<dyn Compiler>) {
        self.compiler = Some(compiler);
    }

    /// Replace the console sink.
    pub fn set_console_sink(&mut self, sink: Arc<dyn ConsoleSink>) {
        self.console_sink = sink;
    }

    /// The console sink.
    pub fn console_sink(&self) -> Arc<dyn ConsoleSink> {
        self.console_sink.clone()
    }

    /// Change the call-stack limit.
    pub fn set_max_stack_depth(&mut self, depth: usize) {
        self.max_stack_depth = depth;
    }

    /// Install the promise-rejection callback.
    pub fn set_promise_reject_callback(&mut self, cb: Arc<dyn Fn(&mut Context, Value)>) {
        self.promise_reject_callback = Some(cb);
    }

    // ================================================================
    // Call-stack metadata
    // ================================================================

    /// Push a frame record; exceeding the limit is a `RangeError`.
    pub fn push_frame_info(&mut self, function_name: &str, file: &str, line: u32) -> VmResult<()> {
        if self.frames.len() >= self.max_stack_depth {
            return Err(VmError::StackOverflow);
        }
        self.frames.push(StackFrame {
            function_name: function_name.to_string(),
            file: file.to_string(),
            line,
            column: 0,
        });
        Ok(())
    }

    /// Pop the top frame record.
    pub fn pop_frame_info(&mut self) {
        self.frames.pop();
    }

    /// Current stack depth.
    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    /// Snapshot the stack, innermost frame first.
    pub fn capture_stack(&self) -> Vec<StackFrame> {
        self.frames.iter().rev().cloned().collect()
    }

    // ================================================================
    // Exception state
    // ================================================================

    /// The pending exception, if one is set.
    pub fn pending_exception(&self) -> Option<&Value> {
        self.pending_exception.as_ref()
    }

    /// Set the pending exception. While a catch handler is running the
    /// existing exception is not overwritten.
    pub fn set_pending_exception(&mut self, value: Value) {
        if self.in_catch_handler && self.pending_exception.is_some() {
            return;
        }
        self.pending_exception = Some(value);
    }

    /// Take and clear the pending exception.
    pub fn take_pending_exception(&mut self) -> Option<Value> {
        self.pending_exception.take()
    }

    /// Whether a catch handler is currently executing.
    pub fn in_catch_handler(&self) -> bool {
        self.in_catch_handler
    }

    /// Mark catch-handler entry/exit.
    pub fn set_in_catch_handler(&mut self, value: bool) {
        self.in_catch_handler = value;
    }

    /// Materialize a `VmError` as a JS error value with a captured stack.
    pub fn make_error_value(&mut self, error: &VmError) -> Value {
        if let VmError::Exception(thrown) = error {
            return thrown.value.clone();
        }
        let stack = self.capture_stack();
        Value::Object(intrinsics::error::create_error_object(
            self,
            error.kind(),
            &error.message(),
            &stack,
        ))
    }

    /// Build an error object of `kind` directly.
    pub fn create_error(&mut self, kind: JsErrorKind, message: &str) -> Value {
        let stack = self.capture_stack();
        Value::Object(intrinsics::error::create_error_object(
            self, kind, message, &stack,
        ))
    }

    // ================================================================
    // Microtasks
    // ================================================================

    /// Enqueue a job on this context's microtask queue (FIFO).
    pub fn enqueue_microtask(&mut self, job: Job) {
        self.microtasks.push_back(job);
    }

    /// Drain the microtask queue. Jobs enqueued while draining run in the
    /// same drain, after the jobs already queued.
    pub fn process_microtasks(&mut self) {
        loop {
            if self.finalization_hint.swap(false, Ordering::SeqCst) {
                self.run_finalization_sweep();
            }
            let Some(job) = self.microtasks.pop_front() else {
                break;
            };
            tracing::trace!(context = self.id, "running microtask");
            job(self);
        }
    }

    /// Number of queued microtasks.
    pub fn microtask_count(&self) -> usize {
        self.microtasks.len()
    }

    /// Report an unhandled promise rejection through the callback, or log it.
    pub fn report_unhandled_rejection(&mut self, reason: Value) {
        if let Some(cb) = self.promise_reject_callback.clone() {
            cb(self, reason);
        } else {
            let rendered = convert::display_value(self, &reason);
            tracing::warn!(context = self.id, "unhandled promise rejection: {rendered}");
        }
    }

    // ================================================================
    // `new.target` plumbing for native constructor calls
    // ================================================================

    /// Push the active `new.target` before invoking a native constructor.
    pub(crate) fn push_new_target(&mut self, target: Value) {
        self.new_target_stack.push(target);
    }

    /// Pop after the native constructor returns.
    pub(crate) fn pop_new_target(&mut self) {
        self.new_target_stack.pop();
    }

    /// The `new.target` of the running native call, if constructing.
    pub fn new_target(&self) -> Option<&Value> {
        self.new_target_stack.last()
    }

    // ================================================================
    // Finalization
    // ================================================================

    /// Record a registry created in this context and watch `target` on the
    /// runtime's monitor.
    pub fn watch_finalization_target(
        &mut self,
        registry: &GcRef<JsObject>,
        target: &GcRef<JsObject>,
    ) {
        if !self
            .registries
            .iter()
            .any(|r| r.upgrade().map(|r| GcRef::ptr_eq(&r, registry)) == Some(true))
        {
            self.registries.push(registry.downgrade());
        }
        self.runtime
            .watch_finalization(target.downgrade(), self.finalization_hint.clone());
    }

    /// Consult the reachability oracle: move held values of dead targets to
    /// cleanup jobs on this context's microtask queue. The cleanup callback
    /// itself runs later, on this context's thread, never synchronously with
    /// the sweep.
    pub fn run_finalization_sweep(&mut self) {
        let registries: Vec<GcRef<JsObject>> =
            self.registries.iter().filter_map(WeakGc::upgrade).collect();
        self.registries.retain(WeakGc::is_alive);

        for registry in registries {
            let (callback, pending) = {
                let ObjectKind::FinalizationRegistry(state) = registry.kind() else {
                    continue;
                };
                let mut state = state.borrow_mut();
                state.data.sweep_dead_targets();
                (state.callback.clone(), state.data.drain_pending())
            };
            for held in pending {
                let callback = callback.clone();
                self.enqueue_microtask(Box::new(move |cx: &mut Context| {
                    if let Err(e) =
                        interpreter::call_value(cx, &callback, &Value::Undefined, &[held])
                    {
                        let error = cx.make_error_value(&e);
                        cx.report_unhandled_rejection(error);
                    }
                }));
            }
        }
    }

    /// Whether the runtime's interrupt flag is raised.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    // ================================================================
    // Module cache (cache contract only; resolution is the embedder's)
    // ================================================================

    /// Register a compiled module under `specifier`.
    pub fn insert_module(&mut self, specifier: &str, module: Arc<Module>) {
        self.module_cache.insert(
            specifier.to_string(),
            ModuleRecord {
                specifier: specifier.to_string(),
                module,
                evaluated: false,
            },
        );
    }

    /// Look up a cached module record.
    pub fn load_module(&mut self, specifier: &str) -> VmResult<ModuleRecord> {
        self.module_cache.get(specifier).cloned().ok_or_else(|| {
            VmError::type_error(format!("Module '{specifier}' is not in the module cache"))
        })
    }

    /// Mark a cached module as evaluated.
    pub fn mark_module_evaluated(&mut self, specifier: &str) {
        if let Some(record) = self.module_cache.get_mut(specifier) {
            record.evaluated = true;
        }
    }

    // ================================================================
    // Eval
    // ================================================================

    /// Compile and execute `source`. Top-level var/let declarations go
    /// through the cross-script redeclaration checks; microtasks are drained
    /// after completion; the context's transient state is reset either way.
    pub fn eval(&mut self, source: &str, filename: &str, is_module: bool) -> VmResult<Value> {
        let mode = if is_module {
            EvalMode::Module
        } else {
            EvalMode::Script
        };
        self.eval_inner(source, filename, mode, None)
    }

    /// Direct `eval` — runs with the caller's `this` binding.
    pub fn eval_direct(&mut self, source: &str, filename: &str, this: Value) -> VmResult<Value> {
        self.eval_inner(source, filename, EvalMode::DirectEval, Some(this))
    }

    fn eval_inner(
        &mut self,
        source: &str,
        filename: &str,
        mode: EvalMode,
        this_override: Option<Value>,
    ) -> VmResult<Value> {
        if source.is_empty() {
            return Ok(Value::Undefined);
        }
        tracing::debug!(context = self.id, filename, ?mode, "eval");

        let result = match self.push_frame_info("<eval>", filename, 0) {
            Ok(()) => {
                let r = self.eval_body(source, filename, mode, this_override);
                self.pop_frame_info();
                r
            }
            Err(e) => Err(e),
        };

        // Reset transient state whatever happened.
        self.current_this = Value::Object(self.global.clone());
        self.in_catch_handler = false;

        match result {
            Ok(value) => {
                self.pending_exception = None;
                self.process_microtasks();
                Ok(value)
            }
            Err(e) => {
                let value = self.make_error_value(&e);
                let message = convert::display_value(self, &value);
                let stack = self.capture_stack();
                self.pending_exception = None;
                Err(VmError::Exception(Box::new(crate::error::ThrownValue {
                    value,
                    message,
                    stack,
                })))
            }
        }
    }

    fn eval_body(
        &mut self,
        source: &str,
        filename: &str,
        mode: EvalMode,
        this_override: Option<Value>,
    ) -> VmResult<Value> {
        let compiler = self
            .compiler
            .clone()
            .ok_or_else(|| VmError::syntax_error("no compiler installed"))?;
        let kind = match mode {
            EvalMode::Script => SourceKind::Script,
            EvalMode::Module => SourceKind::Module,
            EvalMode::DirectEval => SourceKind::Eval { direct: true },
        };
        let compiled = compiler
            .compile(source, filename, kind)
            .map_err(VmError::from)?;
        let module = compiled.module.clone();

        match mode {
            EvalMode::Script => {
                self.global_declaration_instantiation(&module.declarations)?;
            }
            EvalMode::DirectEval => {
                self.check_direct_eval_declarations(&module.declarations)?;
            }
            EvalMode::Module => {
                self.insert_module(filename, module.clone());
            }
        }

        let closure =
            function::make_closure(self, module.clone(), module.entry_point, Vec::new(), None);
        let this = this_override.unwrap_or_else(|| Value::Object(self.global.clone()));
        self.current_this = this.clone();

        let completion = interpreter::call_value(self, &Value::Object(closure), &this, &[])?;
        if let EvalMode::Module = mode {
            self.mark_module_evaluated(filename);
        }
        Ok(completion)
    }

    /// ES `GlobalDeclarationInstantiation` — cross-script redeclaration
    /// checks, then eager `var` binding installation.
    fn global_declaration_instantiation(&mut self, decls: &Declarations) -> VmResult<()> {
        let lex_atoms: Vec<Atom> = decls.lex_names.iter().map(|n| self.atom(n)).collect();
        let var_atoms: Vec<Atom> = decls.var_names.iter().map(|n| self.atom(n)).collect();

        for (atom, name) in lex_atoms.iter().zip(&decls.lex_names) {
            if self.global_lex_names.contains(atom) || self.global_var_names.contains(atom) {
                return Err(VmError::syntax_error(format!(
                    "Identifier '{name}' has already been declared"
                )));
            }
            // HasRestrictedGlobalProperty.
            if let Some(prop) = self.global.store().get(&PropertyKey::Atom(*atom)) {
                if !prop.is_configurable() {
                    return Err(VmError::syntax_error(format!(
                        "Identifier '{name}' has already been declared"
                    )));
                }
            }
        }
        for (atom, name) in var_atoms.iter().zip(&decls.var_names) {
            if self.global_lex_names.contains(atom) {
                return Err(VmError::syntax_error(format!(
                    "Identifier '{name}' has already been declared"
                )));
            }
        }
        for name in &decls.function_names {
            self.can_declare_global_function(name)?;
        }

        // Checks passed: install `var` bindings as non-configurable data
        // properties initialized to undefined, before execution begins.
        for (atom, name) in var_atoms.iter().zip(&decls.var_names) {
            let key = PropertyKey::Atom(*atom);
            let exists = self.global.store().contains(&key);
            if !exists {
                if !self.global.extensible() {
                    return Err(VmError::type_error(format!(
                        "Cannot declare global variable '{name}'"
                    )));
                }
                self.global.insert_property(
                    key,
                    Property::data_with(Value::Undefined, true, true, false),
                );
            }
            self.global_var_names.insert(*atom);
        }
        for atom in lex_atoms {
            self.global_lex_names.insert(atom);
        }
        Ok(())
    }

    /// `CanDeclareGlobalFunction` checks for each function declaration, run
    /// before a direct eval executes.
    fn check_direct_eval_declarations(&mut self, decls: &Declarations) -> VmResult<()> {
        for name in &decls.function_names {
            self.can_declare_global_function(name)?;
        }
        Ok(())
    }

    fn can_declare_global_function(&mut self, name: &str) -> VmResult<()> {
        let atom = self.atom(name);
        let existing = self.global.store().get(&PropertyKey::Atom(atom)).cloned();
        match existing {
            None => {
                if !self.global.extensible() {
                    return Err(VmError::type_error(format!(
                        "Cannot declare global function '{name}'"
                    )));
                }
                Ok(())
            }
            Some(prop) => {
                if prop.is_configurable() {
                    return Ok(());
                }
                match prop {
                    Property::Data {
                        writable: true,
                        enumerable: true,
                        ..
                    } => Ok(()),
                    _ => Err(VmError::type_error(format!(
                        "Cannot declare global function '{name}'"
                    ))),
                }
            }
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.runtime.context_dropped(self.id);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("stack_depth", &self.frames.len())
            .field("microtasks", &self.microtasks.len())
            .field("has_exception", &self.pending_exception.is_some())
            .finish()
    }
}
