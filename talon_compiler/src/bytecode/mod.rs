//! Stack-based bytecode system.
//!
//! This module provides the bytecode representation for Talon's stack-based
//! interpreter. Key components:
//!
//! - [`Opcode`] - single-byte instruction tags and their operand shapes
//! - [`Op`] - the secondary operator set carried by [`Opcode::Op`]
//! - [`ByteBuffer`] - the growable instruction byte stream
//! - [`ConstantPool`] - the bounded per-function constant table
//! - [`CodeWriter`] - the emission facade with label resolution
//! - [`Function`] - the finished immutable artifact

mod buffer;
mod function;
mod opcode;
mod pool;
mod writer;

pub use buffer::{AllocError, ByteBuffer, Word, WORD_BYTES};
pub use function::{disassemble, Function};
pub use opcode::{Op, Opcode, Operands};
pub use pool::{ConstantPool, MAX_CONSTANTS};
pub use writer::{CodeWriter, EmitError, Label, MAX_LABELS};
