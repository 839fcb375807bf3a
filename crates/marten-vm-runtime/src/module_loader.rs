//! Module loading — the cache contract plus an embedder-supplied resolver
//!
//! The core fixes only the cache: `specifier → module record`. Resolution
//! (specifier → source text) belongs to the embedder; linking is out of
//! scope.

use std::sync::Arc;

use marten_vm_core::{Context, Value, VmError, VmResult};

/// Resolves a specifier to source text.
pub trait ModuleResolver: Send + Sync {
    /// Return the source for `specifier`, or `None` when unresolvable.
    /// `referrer` is the requesting module's specifier, when known.
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> Option<String>;
}

/// Resolver over an in-memory specifier → source map (tests, embedded
/// bundles).
pub struct StaticResolver {
    sources: indexmap::IndexMap<String, String>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self {
            sources: indexmap::IndexMap::new(),
        }
    }

    /// Register a module source.
    pub fn add(mut self, specifier: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(specifier.into(), source.into());
        self
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver for StaticResolver {
    fn resolve(&self, specifier: &str, _referrer: Option<&str>) -> Option<String> {
        self.sources.get(specifier).cloned()
    }
}

/// Loads modules through the context's cache, compiling on miss.
pub struct ModuleLoader {
    resolver: Arc<dyn ModuleResolver>,
}

impl ModuleLoader {
    /// Create a loader over `resolver`.
    pub fn new(resolver: Arc<dyn ModuleResolver>) -> Self {
        Self { resolver }
    }

    /// Load and evaluate `specifier`: cache hit returns the cached record's
    /// completion; a miss resolves, compiles, caches, and evaluates.
    pub fn load(&self, cx: &mut Context, specifier: &str) -> VmResult<Value> {
        if let Ok(record) = cx.load_module(specifier) {
            if record.evaluated {
                return Ok(Value::Undefined);
            }
        } else {
            let source = self
                .resolver
                .resolve(specifier, None)
                .ok_or_else(|| {
                    VmError::type_error(format!("Cannot resolve module '{specifier}'"))
                })?;
            return cx.eval(&source, specifier, true);
        }
        // Cached but not evaluated: evaluate the cached bytecode now.
        let record = cx.load_module(specifier)?;
        let module = record.module.clone();
        let closure = marten_vm_core::function::make_closure(
            cx,
            module.clone(),
            module.entry_point,
            Vec::new(),
            None,
        );
        let global_this = Value::Object(cx.global().clone());
        let result =
            marten_vm_core::interpreter::call_value(cx, &Value::Object(closure), &global_this, &[]);
        cx.mark_module_evaluated(specifier);
        cx.process_microtasks();
        result
    }
}
