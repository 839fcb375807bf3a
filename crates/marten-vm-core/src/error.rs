//! VM error types
//!
//! Inside the VM, failures travel as `VmError` through `?`. When a failure
//! becomes observable to JavaScript (a handler catches it, or it crosses the
//! embedder boundary) the context materializes it into a JS error object
//! with the matching prototype and a captured `stack` string.

use thiserror::Error;

use crate::value::Value;

/// The JS-visible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsErrorKind {
    /// `Error`
    Error,
    /// `AggregateError`
    AggregateError,
    /// `EvalError`
    EvalError,
    /// `RangeError`
    RangeError,
    /// `ReferenceError`
    ReferenceError,
    /// `SyntaxError`
    SyntaxError,
    /// `TypeError`
    TypeError,
    /// `URIError`
    URIError,
    /// `SuppressedError`
    SuppressedError,
}

impl JsErrorKind {
    /// Constructor name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            JsErrorKind::Error => "Error",
            JsErrorKind::AggregateError => "AggregateError",
            JsErrorKind::EvalError => "EvalError",
            JsErrorKind::RangeError => "RangeError",
            JsErrorKind::ReferenceError => "ReferenceError",
            JsErrorKind::SyntaxError => "SyntaxError",
            JsErrorKind::TypeError => "TypeError",
            JsErrorKind::URIError => "URIError",
            JsErrorKind::SuppressedError => "SuppressedError",
        }
    }

    /// Every kind, in installation order.
    pub fn all() -> [JsErrorKind; 9] {
        [
            JsErrorKind::Error,
            JsErrorKind::AggregateError,
            JsErrorKind::EvalError,
            JsErrorKind::RangeError,
            JsErrorKind::ReferenceError,
            JsErrorKind::SyntaxError,
            JsErrorKind::TypeError,
            JsErrorKind::URIError,
            JsErrorKind::SuppressedError,
        ]
    }
}

/// One frame of a captured stack trace.
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Function name (`<eval>`, `<anonymous>`, ...)
    pub function_name: String,
    /// Source file
    pub file: String,
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
}

impl StackFrame {
    /// Render the frame the way the `stack` property does.
    pub fn render(&self) -> String {
        format!(
            "    at {} ({}:{})",
            self.function_name, self.file, self.line
        )
    }
}

/// A thrown JavaScript value with its stack snapshot.
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// Display message (for host-side reporting)
    pub message: String,
    /// Stack snapshot taken when the exception was set
    pub stack: Vec<StackFrame>,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// VM execution errors.
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g. calling a non-function)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reference error (unresolvable name)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Range error (invalid length, recursion aborts)
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Syntax error (compiler collaborator failures)
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Eval error
    #[error("EvalError: {0}")]
    EvalError(String),

    /// URI error (malformed URI component)
    #[error("URIError: {0}")]
    URIError(String),

    /// Internal invariant failure (unexpected opcode, bad stack shape);
    /// surfaces as a plain `Error`
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Call stack exceeded the context limit
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// The runtime interrupt flag was observed on a back-edge
    #[error("RangeError: execution interrupted")]
    Interrupted,

    /// A thrown JS value
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),

    /// Malformed bytecode
    #[error("bytecode error: {0}")]
    Bytecode(#[from] marten_vm_bytecode::BytecodeError),
}

impl VmError {
    /// Create a type error.
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a reference error.
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    /// Create a range error.
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create a syntax error.
    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    /// Create a URI error.
    pub fn uri_error(msg: impl Into<String>) -> Self {
        Self::URIError(msg.into())
    }

    /// Create an internal invariant error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap a thrown JS value.
    pub fn exception(value: Value, stack: Vec<StackFrame>) -> Self {
        let message = match &value {
            Value::String(s) => s.as_str().to_string(),
            other => format!("{other:?}"),
        };
        Self::Exception(Box::new(ThrownValue {
            value,
            message,
            stack,
        }))
    }

    /// The JS error kind this error materializes as.
    pub fn kind(&self) -> JsErrorKind {
        match self {
            VmError::TypeError(_) => JsErrorKind::TypeError,
            VmError::ReferenceError(_) => JsErrorKind::ReferenceError,
            VmError::RangeError(_) | VmError::StackOverflow | VmError::Interrupted => {
                JsErrorKind::RangeError
            }
            VmError::SyntaxError(_) | VmError::Bytecode(_) => JsErrorKind::SyntaxError,
            VmError::EvalError(_) => JsErrorKind::EvalError,
            VmError::URIError(_) => JsErrorKind::URIError,
            VmError::InternalError(_) => JsErrorKind::Error,
            VmError::Exception(_) => JsErrorKind::Error,
        }
    }

    /// The message the materialized error object carries.
    pub fn message(&self) -> String {
        match self {
            VmError::TypeError(m)
            | VmError::ReferenceError(m)
            | VmError::RangeError(m)
            | VmError::SyntaxError(m)
            | VmError::EvalError(m)
            | VmError::URIError(m)
            | VmError::InternalError(m) => m.clone(),
            VmError::StackOverflow => "Maximum call stack size exceeded".to_string(),
            VmError::Interrupted => "execution interrupted".to_string(),
            VmError::Exception(t) => t.message.clone(),
            VmError::Bytecode(e) => e.to_string(),
        }
    }
}

/// Result type for VM operations.
pub type VmResult<T> = Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(VmError::type_error("x").kind(), JsErrorKind::TypeError);
        assert_eq!(VmError::StackOverflow.kind(), JsErrorKind::RangeError);
        assert_eq!(VmError::Interrupted.kind(), JsErrorKind::RangeError);
        assert_eq!(VmError::internal("bad opcode").kind(), JsErrorKind::Error);
    }

    #[test]
    fn test_stack_frame_render() {
        let frame = StackFrame {
            function_name: "doWork".to_string(),
            file: "main.js".to_string(),
            line: 12,
            column: 3,
        };
        assert_eq!(frame.render(), "    at doWork (main.js:12)");
    }

    #[test]
    fn test_exception_message_from_string() {
        let err = VmError::exception(Value::string("boom"), vec![]);
        assert_eq!(err.message(), "boom");
    }
}
