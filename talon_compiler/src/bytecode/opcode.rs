//! Opcode definitions.
//!
//! Opcode byte values are stable identifiers shared with the interpreter;
//! the writer and the dispatch loop must agree on them exactly. Each opcode
//! carries a declarative operand descriptor so that decoders (the
//! disassembler, tests) can walk an instruction stream without a second
//! table.

use super::buffer::{Word, WORD_BYTES};

/// Single-byte instruction tag.
///
/// The machine is accumulator-based: `Load*` opcodes set the accumulator,
/// `Store*` opcodes write it somewhere, `Push`/`Pop` move it to and from the
/// value stack, and `Send` dispatches on the pushed receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Do nothing.
    Noop = 0,
    /// Load the implicit receiver into the accumulator.
    LoadSelf = 1,
    /// Load a constant-pool entry. Operand: pool index.
    LoadConst = 2,
    /// Pop `n` stacked elements into a fresh array. Operand: element count.
    LoadArray = 3,
    /// Pop `n` stacked elements into a fresh mapping. Operand: entry count.
    LoadMapping = 4,
    /// Build a function reference bound to self. Operand: pool index of the name.
    LoadFuncref = 5,
    /// Load a local slot. Operand: slot index.
    LoadLocal = 6,
    /// Load a member slot of self. Operand: slot index.
    LoadMember = 7,
    /// Store the accumulator into a local slot. Operand: slot index.
    StoreLocal = 8,
    /// Store the accumulator into a member slot of self. Operand: slot index.
    StoreMember = 9,
    /// Push the implicit receiver onto the stack.
    PushSelf = 10,
    /// Push the accumulator onto the stack.
    PushAccu = 11,
    /// Pop the stack into the accumulator.
    PopAccu = 12,
    /// Run a secondary operator. Operand: an [`Op`] code word.
    Op = 13,
    /// Dispatch a message on the stacked receiver. Operands: pool index of
    /// the message name, then the argument count.
    Send = 14,
    /// Dispatch on the parent blueprint of the current function's holder.
    /// Operands: as [`Opcode::Send`].
    SuperSend = 15,
    /// Unconditional branch. Operand: absolute byte offset.
    Jump = 16,
    /// Branch when the accumulator is true. Operand: absolute byte offset.
    JumpIf = 17,
    /// Branch when the accumulator is false. Operand: absolute byte offset.
    JumpIfNot = 18,
    /// Return from the current frame.
    Return = 19,
}

/// Operand shape following an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    /// No operands.
    None,
    /// One immediate word (count or slot index).
    Word,
    /// One constant-pool index word.
    Pool,
    /// One absolute code-offset word.
    Target,
    /// A constant-pool index word followed by an immediate word.
    PoolWord,
}

impl Operands {
    /// Total operand width in bytes.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::Word | Operands::Pool | Operands::Target => WORD_BYTES,
            Operands::PoolWord => 2 * WORD_BYTES,
        }
    }
}

impl Opcode {
    /// Decode an opcode from its byte value.
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        Some(match byte {
            0 => Opcode::Noop,
            1 => Opcode::LoadSelf,
            2 => Opcode::LoadConst,
            3 => Opcode::LoadArray,
            4 => Opcode::LoadMapping,
            5 => Opcode::LoadFuncref,
            6 => Opcode::LoadLocal,
            7 => Opcode::LoadMember,
            8 => Opcode::StoreLocal,
            9 => Opcode::StoreMember,
            10 => Opcode::PushSelf,
            11 => Opcode::PushAccu,
            12 => Opcode::PopAccu,
            13 => Opcode::Op,
            14 => Opcode::Send,
            15 => Opcode::SuperSend,
            16 => Opcode::Jump,
            17 => Opcode::JumpIf,
            18 => Opcode::JumpIfNot,
            19 => Opcode::Return,
            _ => return None,
        })
    }

    /// The operand shape following this opcode.
    pub const fn operands(self) -> Operands {
        match self {
            Opcode::Noop
            | Opcode::LoadSelf
            | Opcode::PushSelf
            | Opcode::PushAccu
            | Opcode::PopAccu
            | Opcode::Return => Operands::None,
            Opcode::LoadArray
            | Opcode::LoadMapping
            | Opcode::LoadLocal
            | Opcode::LoadMember
            | Opcode::StoreLocal
            | Opcode::StoreMember
            | Opcode::Op => Operands::Word,
            Opcode::LoadConst | Opcode::LoadFuncref => Operands::Pool,
            Opcode::Jump | Opcode::JumpIf | Opcode::JumpIfNot => Operands::Target,
            Opcode::Send | Opcode::SuperSend => Operands::PoolWord,
        }
    }

    /// Mnemonic used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Noop => "noop",
            Opcode::LoadSelf => "load_self",
            Opcode::LoadConst => "load_const",
            Opcode::LoadArray => "load_array",
            Opcode::LoadMapping => "load_mapping",
            Opcode::LoadFuncref => "load_funcref",
            Opcode::LoadLocal => "load_local",
            Opcode::LoadMember => "load_member",
            Opcode::StoreLocal => "store_local",
            Opcode::StoreMember => "store_member",
            Opcode::PushSelf => "push_self",
            Opcode::PushAccu => "push",
            Opcode::PopAccu => "pop",
            Opcode::Op => "op",
            Opcode::Send => "send",
            Opcode::SuperSend => "super_send",
            Opcode::Jump => "jump",
            Opcode::JumpIf => "jump_if",
            Opcode::JumpIfNot => "jump_if_not",
            Opcode::Return => "return",
        }
    }
}

/// Secondary operator codes carried by [`Opcode::Op`].
///
/// These run directly on the accumulator and the value stack; the dispatch
/// loop maps each one to its runtime operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Op {
    /// Equality test.
    Eq = 0,
    /// Inequality test.
    Ineq = 1,
    /// Addition (also string concatenation).
    Add = 2,
    /// Subtraction.
    Sub = 3,
    /// Multiplication.
    Mul = 4,
    /// Division.
    Div = 5,
    /// Remainder.
    Mod = 6,
    /// Less-than comparison.
    Less = 7,
    /// Less-or-equal comparison.
    Leq = 8,
    /// Greater-than comparison.
    Greater = 9,
    /// Greater-or-equal comparison.
    Geq = 10,
    /// Arithmetic negation.
    Negate = 11,
    /// Container indexing.
    Index = 12,
    /// Container index assignment.
    IndexAssign = 13,
    /// Function-reference dereference.
    Deref = 14,
    /// Element or character count.
    Sizeof = 15,
    /// Logical negation.
    Not = 16,
    /// Object instantiation from a blueprint path.
    New = 17,
}

impl Op {
    /// Decode a secondary operator from its code word.
    pub fn from_word(word: Word) -> Option<Op> {
        Some(match word {
            0 => Op::Eq,
            1 => Op::Ineq,
            2 => Op::Add,
            3 => Op::Sub,
            4 => Op::Mul,
            5 => Op::Div,
            6 => Op::Mod,
            7 => Op::Less,
            8 => Op::Leq,
            9 => Op::Greater,
            10 => Op::Geq,
            11 => Op::Negate,
            12 => Op::Index,
            13 => Op::IndexAssign,
            14 => Op::Deref,
            15 => Op::Sizeof,
            16 => Op::Not,
            17 => Op::New,
            _ => return None,
        })
    }

    /// Mnemonic used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ineq => "ineq",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Less => "less",
            Op::Leq => "leq",
            Op::Greater => "greater",
            Op::Geq => "geq",
            Op::Negate => "negate",
            Op::Index => "index",
            Op::IndexAssign => "index_assign",
            Op::Deref => "deref",
            Op::Sizeof => "sizeof",
            Op::Not => "not",
            Op::New => "new",
        }
    }
}
