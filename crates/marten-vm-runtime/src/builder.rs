//! Runtime/context configuration

use std::sync::Arc;

use marten_vm_core::intrinsics::ConsoleSink;
use marten_vm_core::{Compiler, Context, Runtime, Value};

/// Builder wiring the collaborators into a runtime and its first context.
pub struct RuntimeBuilder {
    compiler: Option<Arc<dyn Compiler>>,
    console_sink: Option<Arc<dyn ConsoleSink>>,
    promise_reject_callback: Option<Arc<dyn Fn(&mut Context, Value)>>,
    max_stack_depth: Option<usize>,
}

impl RuntimeBuilder {
    /// Start with defaults.
    pub fn new() -> Self {
        Self {
            compiler: None,
            console_sink: None,
            promise_reject_callback: None,
            max_stack_depth: None,
        }
    }

    /// Install the compiler collaborator.
    pub fn compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Install a console sink.
    pub fn console_sink(mut self, sink: Arc<dyn ConsoleSink>) -> Self {
        self.console_sink = Some(sink);
        self
    }

    /// Install the promise-rejection callback.
    pub fn promise_reject_callback(mut self, cb: Arc<dyn Fn(&mut Context, Value)>) -> Self {
        self.promise_reject_callback = Some(cb);
        self
    }

    /// Change the call-stack limit.
    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = Some(depth);
        self
    }

    /// Build the runtime and its first configured context.
    pub fn build(self) -> (Arc<Runtime>, Context) {
        let runtime = Runtime::new();
        let mut cx = runtime.create_context();
        if let Some(compiler) = self.compiler {
            cx.set_compiler(compiler);
        }
        if let Some(sink) = self.console_sink {
            cx.set_console_sink(sink);
        }
        if let Some(cb) = self.promise_reject_callback {
            cx.set_promise_reject_callback(cb);
        }
        if let Some(depth) = self.max_stack_depth {
            cx.set_max_stack_depth(depth);
        }
        (runtime, cx)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
