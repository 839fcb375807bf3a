//! # Marten VM Bytecode
//!
//! The bytecode format executed by the Marten virtual machine: a stack
//! machine over a per-module constant pool. A compiled script is a
//! [`Module`] holding a table of [`Function`]s; the VM executes the entry
//! function and materializes closures for the rest on demand.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod constant;
pub mod declarations;
pub mod error;
pub mod function;
pub mod instruction;
pub mod module;

pub use constant::{ConstIndex, Constant, ConstantPool};
pub use declarations::Declarations;
pub use error::BytecodeError;
pub use function::{Function, FunctionBuilder, FunctionFlags, HandlerEntry, LineMap};
pub use instruction::{CaptureSource, Instruction};
pub use module::{Module, ModuleBuilder};

/// Magic bytes identifying a serialized bytecode module.
pub const BYTECODE_MAGIC: [u8; 8] = *b"MARTENBC";

/// Version of the bytecode format.
pub const BYTECODE_VERSION: u32 = 1;
