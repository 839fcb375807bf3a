//! Function bytecode representation

use serde::{Deserialize, Serialize};

use crate::instruction::{CaptureSource, Instruction};

/// Function flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFlags {
    /// Is this an async function
    pub is_async: bool,
    /// Is this a generator function
    pub is_generator: bool,
    /// Is this an arrow function (no own `this`/`arguments`)
    pub is_arrow: bool,
    /// Is strict mode
    pub is_strict: bool,
    /// May this function be invoked with `new`
    pub is_constructor: bool,
    /// Does this function need an arguments object
    pub uses_arguments: bool,
    /// Has rest parameter (...args)
    pub has_rest: bool,
}

/// A static exception-handler table entry.
///
/// Entries cover the half-open instruction range `[start_pc, end_pc)` and are
/// kept sorted by `start_pc`. `u32::MAX` marks an absent catch or finally
/// target. The table mirrors the dynamic `TryEnter`/`TryLeave` regions and is
/// what survives in suspended generator frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEntry {
    /// First covered instruction index.
    pub start_pc: u32,
    /// One past the last covered instruction index.
    pub end_pc: u32,
    /// Catch target, or `u32::MAX`.
    pub catch_pc: u32,
    /// Finally target, or `u32::MAX`.
    pub finally_pc: u32,
}

/// Instruction-index → source-line map, sorted by instruction index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineMap {
    entries: Vec<(u32, u32, u32)>, // (instruction index, line, column)
}

impl LineMap {
    /// Create an empty line map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that instructions from `instruction_index` onward map to
    /// `line:column` until the next entry.
    pub fn add(&mut self, instruction_index: u32, line: u32, column: u32) {
        self.entries.push((instruction_index, line, column));
    }

    /// Find the source position for an instruction index.
    pub fn find(&self, instruction_index: u32) -> Option<(u32, u32)> {
        match self
            .entries
            .binary_search_by_key(&instruction_index, |e| e.0)
        {
            Ok(i) => Some((self.entries[i].1, self.entries[i].2)),
            Err(i) if i > 0 => Some((self.entries[i - 1].1, self.entries[i - 1].2)),
            _ => None,
        }
    }
}

/// A compiled bytecode function.
///
/// Immutable after compilation. Closures pair one of these (by index into the
/// owning module) with captured environment cells at call-site construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name (`None` for anonymous)
    pub name: Option<String>,

    /// Number of declared parameters
    pub param_count: u16,

    /// Number of local slots (parameters occupy the first `param_count`)
    pub local_count: u16,

    /// Upper bound on value-stack depth, for preallocation
    pub max_stack: u16,

    /// Function flags
    pub flags: FunctionFlags,

    /// Capture descriptors consumed by `MakeClosure`
    pub captures: Vec<CaptureSource>,

    /// Bytecode
    pub instructions: Vec<Instruction>,

    /// Static exception-handler table, sorted by `start_pc`
    pub handlers: Vec<HandlerEntry>,

    /// Debug line map
    pub line_map: LineMap,

    /// Local slot names (debugging / arguments-object mapping)
    pub local_names: Vec<String>,
}

impl Function {
    /// Create a new function builder.
    pub fn builder() -> FunctionBuilder {
        FunctionBuilder::new()
    }

    /// Function name or `<anonymous>`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Whether the function is async.
    #[inline]
    pub fn is_async(&self) -> bool {
        self.flags.is_async
    }

    /// Whether the function is a generator.
    #[inline]
    pub fn is_generator(&self) -> bool {
        self.flags.is_generator
    }

    /// Whether the function body is strict.
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.flags.is_strict
    }

    /// Find the innermost static handler covering `pc`.
    pub fn handler_for(&self, pc: u32) -> Option<&HandlerEntry> {
        self.handlers
            .iter()
            .filter(|h| h.start_pc <= pc && pc < h.end_pc)
            .last()
    }
}

/// Builder for bytecode functions.
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    name: Option<String>,
    param_count: u16,
    local_count: u16,
    max_stack: u16,
    flags: FunctionFlags,
    captures: Vec<CaptureSource>,
    instructions: Vec<Instruction>,
    handlers: Vec<HandlerEntry>,
    line_map: LineMap,
    local_names: Vec<String>,
}

impl FunctionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parameter count.
    pub fn param_count(mut self, count: u16) -> Self {
        self.param_count = count;
        self
    }

    /// Set the local-slot count (must include parameters).
    pub fn local_count(mut self, count: u16) -> Self {
        self.local_count = count;
        self
    }

    /// Set the value-stack bound.
    pub fn max_stack(mut self, max: u16) -> Self {
        self.max_stack = max;
        self
    }

    /// Replace all flags.
    pub fn flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark as strict mode.
    pub fn is_strict(mut self, value: bool) -> Self {
        self.flags.is_strict = value;
        self
    }

    /// Mark as async.
    pub fn is_async(mut self, value: bool) -> Self {
        self.flags.is_async = value;
        self
    }

    /// Mark as generator.
    pub fn is_generator(mut self, value: bool) -> Self {
        self.flags.is_generator = value;
        self
    }

    /// Mark as constructable.
    pub fn is_constructor(mut self, value: bool) -> Self {
        self.flags.is_constructor = value;
        self
    }

    /// Add a capture descriptor.
    pub fn capture(mut self, source: CaptureSource) -> Self {
        self.captures.push(source);
        self
    }

    /// Append a single instruction.
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Replace the instruction list.
    pub fn instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Add a static handler-table entry.
    pub fn handler(mut self, entry: HandlerEntry) -> Self {
        self.handlers.push(entry);
        self
    }

    /// Set the line map.
    pub fn line_map(mut self, line_map: LineMap) -> Self {
        self.line_map = line_map;
        self
    }

    /// Add a local slot name.
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_names.push(name.into());
        self
    }

    /// Build the function. The handler table is sorted by `start_pc`.
    pub fn build(mut self) -> Function {
        self.handlers.sort_by_key(|h| h.start_pc);
        Function {
            name: self.name,
            param_count: self.param_count,
            local_count: self.local_count.max(self.param_count),
            max_stack: self.max_stack,
            flags: self.flags,
            captures: self.captures,
            instructions: self.instructions,
            handlers: self.handlers,
            line_map: self.line_map,
            local_names: self.local_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_builder() {
        let func = Function::builder()
            .name("add")
            .param_count(2)
            .local_count(2)
            .is_strict(true)
            .instruction(Instruction::LoadLocal(0))
            .instruction(Instruction::LoadLocal(1))
            .instruction(Instruction::Add)
            .instruction(Instruction::Return)
            .build();

        assert_eq!(func.display_name(), "add");
        assert_eq!(func.param_count, 2);
        assert_eq!(func.instructions.len(), 4);
        assert!(func.is_strict());
    }

    #[test]
    fn test_handler_lookup_innermost() {
        let func = Function::builder()
            .handler(HandlerEntry {
                start_pc: 0,
                end_pc: 10,
                catch_pc: 20,
                finally_pc: u32::MAX,
            })
            .handler(HandlerEntry {
                start_pc: 2,
                end_pc: 6,
                catch_pc: 30,
                finally_pc: u32::MAX,
            })
            .build();

        assert_eq!(func.handler_for(1).unwrap().catch_pc, 20);
        assert_eq!(func.handler_for(3).unwrap().catch_pc, 30);
        assert_eq!(func.handler_for(8).unwrap().catch_pc, 20);
        assert!(func.handler_for(10).is_none());
    }

    #[test]
    fn test_line_map() {
        let mut map = LineMap::new();
        map.add(0, 1, 1);
        map.add(5, 2, 3);
        map.add(9, 4, 1);

        assert_eq!(map.find(0), Some((1, 1)));
        assert_eq!(map.find(7), Some((2, 3)));
        assert_eq!(map.find(9), Some((4, 1)));
    }
}
