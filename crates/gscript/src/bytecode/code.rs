//! The compiled program: a flat instruction stream shared by the
//! top-level script and every function literal compiled from it.

use crate::bytecode::op::Opcode;
use crate::value::Value;

/// A single-pass compiler emits one flat `Program` per `compile` call.
/// Top-level code starts at instruction 0; each function literal's body
/// is compiled into the same stream at a later offset and invoked by
/// jumping to its `entry`, so recursive and mutually-recursive
/// functions need no separate linking step.
#[derive(Debug)]
pub struct Program {
    pub instructions: Vec<Opcode>,
    pub consts: Vec<Value>,
    /// Names referenced via `LoadGlobal`/`GetAttr`/`SetAttr`, indexed by
    /// the `u32` operand those opcodes carry.
    pub names: Vec<String>,
    /// Number of stack slots the top-level frame needs.
    pub frame_size: usize,
}

impl Program {
    pub fn name(&self, idx: u32) -> &str {
        &self.names[idx as usize]
    }
}
