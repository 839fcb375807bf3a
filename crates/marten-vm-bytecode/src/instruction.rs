//! Stack-machine instruction set
//!
//! Every instruction operates on the current frame's value stack. Call-shaped
//! instructions expect `callee, this, arg0 .. argN-1` on the stack (callee
//! deepest); property instructions expect the receiver below key/value
//! operands. Jump offsets are absolute instruction indices within the
//! function, resolved by the compiler.

use serde::{Deserialize, Serialize};

use crate::constant::ConstIndex;

/// Where a closure capture comes from when the closure is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSource {
    /// Capture a local slot of the enclosing frame.
    Local(u16),
    /// Re-capture one of the enclosing closure's own captures.
    Capture(u16),
}

/// A single VM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    // ---- Constants & stack shuffling ----
    /// Push a constant-pool entry.
    Const(ConstIndex),
    /// Push `undefined`.
    PushUndefined,
    /// Push `null`.
    PushNull,
    /// Push `true`.
    PushTrue,
    /// Push `false`.
    PushFalse,
    /// Push a small integer as a Number.
    PushInt(i32),
    /// Push the frame's `this` binding.
    PushThis,
    /// Push the frame's `new.target` (or `undefined`).
    PushNewTarget,
    /// Duplicate the top of stack.
    Dup,
    /// Swap the top two stack values.
    Swap,
    /// Discard the top of stack.
    Pop,

    // ---- Locals, captures, globals ----
    /// Push local slot `0`'s value.
    LoadLocal(u16),
    /// Pop into local slot.
    StoreLocal(u16),
    /// Push the value held by a captured cell.
    LoadCapture(u16),
    /// Pop into a captured cell.
    StoreCapture(u16),
    /// Push the value of a global binding (name is a string constant).
    /// Throws `ReferenceError` for unresolvable names.
    LoadGlobal(ConstIndex),
    /// Pop and write a global binding (name is a string constant).
    StoreGlobal(ConstIndex),

    // ---- Arithmetic / bitwise ----
    /// `lhs + rhs` with ES addition semantics (string/BigInt aware).
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs / rhs`
    Div,
    /// `lhs % rhs`
    Rem,
    /// `lhs ** rhs`
    Pow,
    /// Unary minus.
    Neg,
    /// Unary plus (ToNumber).
    ToNumber,
    /// Logical not.
    Not,
    /// `lhs & rhs`
    BitAnd,
    /// `lhs | rhs`
    BitOr,
    /// `lhs ^ rhs`
    BitXor,
    /// `~v`
    BitNot,
    /// `lhs << rhs`
    Shl,
    /// `lhs >> rhs`
    Shr,
    /// `lhs >>> rhs`
    UShr,

    // ---- Comparison ----
    /// Abstract equality `==`.
    Eq,
    /// Abstract inequality `!=`.
    Ne,
    /// Strict equality `===`.
    StrictEq,
    /// Strict inequality `!==`.
    StrictNe,
    /// `lhs < rhs`
    Lt,
    /// `lhs <= rhs`
    Le,
    /// `lhs > rhs`
    Gt,
    /// `lhs >= rhs`
    Ge,
    /// `key in object` (walks the prototype chain).
    In,
    /// `value instanceof ctor` (consults `@@hasInstance`).
    InstanceOf,
    /// `typeof v` pushed as a string.
    TypeOf,

    // ---- Property access ----
    /// `obj.name` — receiver on stack, name is a string constant.
    GetByName(ConstIndex),
    /// `obj.name = v` — stack holds `obj, v`.
    SetByName(ConstIndex),
    /// `obj[key]` — stack holds `obj, key`.
    GetByValue,
    /// `obj[key] = v` — stack holds `obj, key, v`.
    SetByValue,
    /// `delete obj.name` — pushes the boolean result.
    DeleteByName(ConstIndex),
    /// `delete obj[key]` — stack holds `obj, key`.
    DeleteByValue,
    /// Define an own data property on an object literal under construction;
    /// stack holds `obj, key, value` and leaves `obj`.
    DefineDataProperty,

    // ---- Object / array literals ----
    /// Push a fresh ordinary object inheriting `Object.prototype`.
    NewObject,
    /// Pop `n` elements and push an array of them (deepest first).
    NewArray(u16),

    // ---- Control flow ----
    /// Unconditional jump to an instruction index.
    Jump(u32),
    /// Pop; jump when falsy.
    JumpIfFalse(u32),
    /// Pop; jump when truthy.
    JumpIfTrue(u32),
    /// Enter a protected region; `catch_pc`/`finally_pc` of `u32::MAX` mean
    /// absent.
    TryEnter {
        /// Instruction index of the catch block, or `u32::MAX`.
        catch_pc: u32,
        /// Instruction index of the finally block, or `u32::MAX`.
        finally_pc: u32,
    },
    /// Leave the innermost protected region.
    TryLeave,
    /// Pop and throw the value.
    Throw,

    // ---- Calls ----
    /// Call with `argc` arguments; stack holds `callee, this, args..`.
    Call(u16),
    /// Construct with `argc` arguments; stack holds `callee, args..`.
    New(u16),
    /// Tail call with `argc` arguments; same layout as `Call`.
    TailCall(u16),
    /// Pop the completion value and return it.
    Return,

    // ---- Closures ----
    /// Materialize a closure over module function `index`, capturing from the
    /// current frame per the function's capture descriptors.
    MakeClosure(u32),

    // ---- Generators & async ----
    /// Suspend a generator frame, yielding the popped value.
    Yield,
    /// `yield*` — delegate to the popped iterable.
    YieldDelegate,
    /// Suspend an async frame until the popped awaited value settles.
    Await,
}

impl Instruction {
    /// Whether this instruction is a loop back-edge candidate (the VM checks
    /// the interrupt flag here).
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_) | Instruction::JumpIfFalse(_) | Instruction::JumpIfTrue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_jump() {
        assert!(Instruction::Jump(0).is_jump());
        assert!(Instruction::JumpIfFalse(3).is_jump());
        assert!(!Instruction::Add.is_jump());
        assert!(!Instruction::Call(2).is_jump());
    }

    #[test]
    fn test_serde_roundtrip() {
        let ins = vec![
            Instruction::Const(0),
            Instruction::TryEnter {
                catch_pc: 5,
                finally_pc: u32::MAX,
            },
            Instruction::Call(2),
        ];
        let json = serde_json::to_string(&ins).unwrap();
        let back: Vec<Instruction> = serde_json::from_str(&json).unwrap();
        assert_eq!(ins, back);
    }
}
