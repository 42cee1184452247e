//! The VM's instruction set.
//!
//! Every instruction is a fixed-size enum variant rather than a packed
//! byte encoding: the language's programs are small (this is an
//! embeddable expression engine, not a bytecode interchange format) so
//! there is no format to version or disassemble from bytes, and a plain
//! `Vec<Opcode>` is both simpler and faster to dispatch than decoding a
//! byte stream at each step.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Pushes `program.consts[idx]` onto the operand stack.
    LoadConst(u32),
    Pop,
    Dup,

    /// Loads/stores a slot on the current frame's operand stack,
    /// relative to its base pointer. Used for locals that are never
    /// captured by a nested closure (the "stashless" fast path).
    LoadStack(u32),
    StoreStack(u32),

    /// Loads/stores a slot in a captured lexical stash, `level` frames
    /// outward from the current function's own stash (0 = its own).
    LoadStash(u32, u32),
    StoreStash(u32, u32),

    /// Looks up a host-exposed name in the runtime's global table.
    LoadGlobal(u32),

    Jump(u32),
    JumpIfFalse(u32),
    JumpIfTrue(u32),

    Neg,
    Not,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Xor,
    Shl,
    Shr,

    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,

    NewArray,
    ArrayPush,
    /// Pops an iterable value and appends each of its elements (spread).
    ArrayExtend,

    NewMap,
    /// Pops value, then key; inserts into the map left on the stack.
    MapInsert,
    /// Pops an iterable-of-pairs value and merges its entries (spread).
    MapExtend,

    GetIndex,
    SetIndex,
    GetAttr(u32),
    SetAttr(u32),

    /// Builds a closure value from a compiled-function template in the
    /// constant pool, capturing the current stash if the template needs
    /// one (`stashless` templates ignore it).
    MakeFunction(u32),

    Call(u32),
    Return,

    Halt,
}
