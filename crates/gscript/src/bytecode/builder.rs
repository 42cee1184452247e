//! Builder for emitting instructions during compilation.
//!
//! Handles forward jumps that need patching once their target is known
//! and tracks per-function instruction ranges so the final stashless
//! rewrite pass (see `compiler::Compiler::close_function`) can limit
//! itself to the instructions a single function actually emitted.

use crate::bytecode::op::Opcode;
use crate::value::Value;

/// A forward jump emitted with a placeholder target, to be resolved
/// once the jump's destination is known.
#[derive(Debug, Clone, Copy)]
pub struct JumpPatch(usize);

#[derive(Debug, Default)]
pub struct CodeBuilder {
    instructions: Vec<Opcode>,
    consts: Vec<Value>,
    names: Vec<String>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn here(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn emit(&mut self, op: Opcode) -> u32 {
        let at = self.here();
        self.instructions.push(op);
        at
    }

    /// Emits a jump with a placeholder target of 0 and returns a patch
    /// handle to fix it up once the real target is known.
    pub fn emit_jump(&mut self, make_op: impl Fn(u32) -> Opcode) -> JumpPatch {
        let at = self.here();
        self.instructions.push(make_op(0));
        JumpPatch(at as usize)
    }

    /// Patches a previously emitted jump to land on the instruction that
    /// will be emitted next.
    pub fn patch_jump_here(&mut self, patch: JumpPatch) {
        let target = self.here();
        self.patch_jump_to(patch, target);
    }

    pub fn patch_jump_to(&mut self, patch: JumpPatch, target: u32) {
        let op = &mut self.instructions[patch.0];
        *op = match *op {
            Opcode::Jump(_) => Opcode::Jump(target),
            Opcode::JumpIfFalse(_) => Opcode::JumpIfFalse(target),
            Opcode::JumpIfTrue(_) => Opcode::JumpIfTrue(target),
            other => panic!("patch_jump called on non-jump opcode {other:?}"),
        };
    }

    /// Interns a constant, reusing an existing slot when an identical
    /// (by strict identity, `Value::same_as`) constant was already
    /// pooled, so e.g. the literal `0` appearing twice shares one slot.
    pub fn intern_const(&mut self, value: Value) -> u32 {
        if let Some(idx) = self.consts.iter().position(|c| c.same_as(&value)) {
            return idx as u32;
        }
        self.consts.push(value);
        (self.consts.len() - 1) as u32
    }

    pub fn intern_name(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            return idx as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    /// Reserves a fresh constant-pool slot without the usual
    /// `same_as`-identity de-duplication, for callers (function-literal
    /// compilation) that need a slot index up front and will fill it in
    /// later with `set_const`. Using `intern_const(Value::Null)` here
    /// instead would risk the placeholder being de-duplicated against
    /// an unrelated `null` literal already in the pool, and then
    /// overwritten out from under it.
    pub fn reserve_const(&mut self) -> u32 {
        self.consts.push(Value::Null);
        (self.consts.len() - 1) as u32
    }

    pub fn set_const(&mut self, idx: u32, value: Value) {
        self.consts[idx as usize] = value;
    }

    pub fn instructions_mut(&mut self) -> &mut [Opcode] {
        &mut self.instructions
    }

    pub fn into_parts(self) -> (Vec<Opcode>, Vec<Value>, Vec<String>) {
        (self.instructions, self.consts, self.names)
    }
}
