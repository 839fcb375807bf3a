//! Bytecode format errors

use thiserror::Error;

/// Errors produced while encoding or decoding bytecode modules.
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// The serialized module does not start with the expected magic bytes.
    #[error("invalid bytecode magic")]
    InvalidMagic,

    /// The serialized module uses an unsupported format version.
    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u32),

    /// The byte stream ended before a complete module was read.
    #[error("unexpected end of bytecode stream")]
    UnexpectedEnd,

    /// A constant-pool index is out of range for the module.
    #[error("constant index {0} out of range")]
    BadConstant(u32),

    /// A function index is out of range for the module.
    #[error("function index {0} out of range")]
    BadFunction(u32),

    /// Underlying I/O failure.
    #[error("bytecode io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for bytecode operations.
pub type Result<T> = std::result::Result<T, BytecodeError>;
