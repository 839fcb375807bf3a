//! Compiler collaborator contract
//!
//! The lexer/parser/code generator is external to the core. The core hands
//! it `(source, filename, kind)` and receives a compiled [`Module`] whose
//! entry function is ready to execute, plus the declarations summary the
//! context needs for `GlobalDeclarationInstantiation`. Compiler failures
//! always surface to JS as `SyntaxError`.

use marten_vm_bytecode::Module;
use std::sync::Arc;

use crate::error::VmError;

/// What kind of source is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A top-level script
    Script,
    /// An ES module
    Module,
    /// `eval` source; direct eval sees the caller's scope rules
    Eval {
        /// Whether this is a direct `eval()` call
        direct: bool,
    },
}

/// A compilation failure.
#[derive(Debug, Clone)]
pub struct CompilerError {
    /// Human-readable message
    pub message: String,
    /// 1-based line of the offending token
    pub line: u32,
    /// 1-based column of the offending token
    pub column: u32,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl From<CompilerError> for VmError {
    fn from(e: CompilerError) -> Self {
        VmError::syntax_error(e.message)
    }
}

/// A successful compilation: the module plus its entry point.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// The compiled module; `module.declarations` carries the summary and
    /// `module.entry_point` the top-level function.
    pub module: Arc<Module>,
}

impl CompiledScript {
    /// Wrap a built module.
    pub fn new(module: Module) -> Self {
        Self {
            module: Arc::new(module),
        }
    }
}

/// The compiler collaborator.
pub trait Compiler: Send + Sync {
    /// Compile `source` from `filename`.
    fn compile(
        &self,
        source: &str,
        filename: &str,
        kind: SourceKind,
    ) -> Result<CompiledScript, CompilerError>;
}
