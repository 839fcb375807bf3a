//! Bytecode module format

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::constant::ConstantPool;
use crate::declarations::Declarations;
use crate::error::{BytecodeError, Result};
use crate::function::Function;
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// A compiled bytecode module: constant pool, function table, entry point.
///
/// Immutable after compilation; the VM shares it behind `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Source file name or URL
    pub filename: String,

    /// Constant pool (shared across all functions)
    pub constants: ConstantPool,

    /// Functions defined in this module; inner functions are referenced by
    /// `MakeClosure` index
    pub functions: Vec<Function>,

    /// Entry point function index
    pub entry_point: u32,

    /// Top-level declarations summary
    pub declarations: Declarations,

    /// Was this compiled as an ES module
    pub is_module: bool,
}

impl Module {
    /// Create a new module builder.
    pub fn builder(filename: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(filename)
    }

    /// Get the entry point function.
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.get(self.entry_point as usize)
    }

    /// Get a function by index.
    pub fn function(&self, index: u32) -> Option<&Function> {
        self.functions.get(index as usize)
    }

    /// Serialize the module: magic, version, length-prefixed JSON body.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&BYTECODE_MAGIC);
        bytes.extend_from_slice(&BYTECODE_VERSION.to_le_bytes());

        let body = serde_json::to_vec(self).map_err(|e| {
            BytecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            ))
        })?;
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Deserialize a module produced by [`Module::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 {
            return Err(BytecodeError::UnexpectedEnd);
        }
        if bytes[0..8] != BYTECODE_MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }
        let version = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        if version != BYTECODE_VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }
        let body_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        if bytes.len() < 16 + body_len {
            return Err(BytecodeError::UnexpectedEnd);
        }
        serde_json::from_slice(&bytes[16..16 + body_len]).map_err(|e| {
            BytecodeError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            ))
        })
    }

    /// Write the module to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Read a module from a reader.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}

/// Builder for bytecode modules.
#[derive(Debug)]
pub struct ModuleBuilder {
    filename: String,
    constants: ConstantPool,
    functions: Vec<Function>,
    entry_point: u32,
    declarations: Declarations,
    is_module: bool,
}

impl ModuleBuilder {
    /// Create a builder for the given source file name.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            constants: ConstantPool::new(),
            functions: Vec::new(),
            entry_point: 0,
            declarations: Declarations::new(),
            is_module: false,
        }
    }

    /// Mutable access to the constant pool.
    pub fn constants_mut(&mut self) -> &mut ConstantPool {
        &mut self.constants
    }

    /// Add a function, returning its index.
    pub fn add_function(&mut self, function: Function) -> u32 {
        let idx = self.functions.len() as u32;
        self.functions.push(function);
        idx
    }

    /// Set the entry point function index.
    pub fn entry_point(mut self, index: u32) -> Self {
        self.entry_point = index;
        self
    }

    /// Set the declarations summary.
    pub fn declarations(mut self, declarations: Declarations) -> Self {
        self.declarations = declarations;
        self
    }

    /// Mark as an ES module.
    pub fn is_module(mut self, value: bool) -> Self {
        self.is_module = value;
        self
    }

    /// Build the module.
    pub fn build(self) -> Module {
        Module {
            filename: self.filename,
            constants: self.constants,
            functions: self.functions,
            entry_point: self.entry_point,
            declarations: self.declarations,
            is_module: self.is_module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    #[test]
    fn test_module_roundtrip() {
        let mut builder = Module::builder("test.js");
        let hello = builder.constants_mut().add_string("hello");

        let func = Function::builder()
            .name("main")
            .instruction(Instruction::Const(hello))
            .instruction(Instruction::Return)
            .build();
        builder.add_function(func);

        let module = builder.build();
        let bytes = module.to_bytes().unwrap();
        let restored = Module::from_bytes(&bytes).unwrap();

        assert_eq!(restored.filename, "test.js");
        assert_eq!(restored.constants.len(), 1);
        assert_eq!(restored.functions.len(), 1);
        assert_eq!(restored.entry_point, 0);
    }

    #[test]
    fn test_invalid_magic() {
        let bytes = b"NOTMARTN........";
        assert!(matches!(
            Module::from_bytes(bytes),
            Err(BytecodeError::InvalidMagic)
        ));
    }
}
