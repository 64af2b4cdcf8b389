//! The finished function artifact.
//!
//! A `Function` is the immutable bundle handed from the code writer to the
//! interpreter: the raw instruction bytes, the constant pool, the local
//! count and the varargs flag. Nothing else crosses that boundary - debug
//! information and source mapping are deliberately absent.

use super::buffer::{Word, WORD_BYTES};
use super::opcode::{Op, Opcode, Operands};
use std::fmt::Write;
use talon_core::Value;

/// A compiled function body.
///
/// Immutable once created; the writer's buffer and pool are moved in, never
/// copied. The interpreter walks `code` byte-wise and reads `constants` by
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Local slot count, including slot 0 for the implicit receiver.
    num_locals: u32,
    /// Whether surplus arguments are collected instead of rejected.
    varargs: bool,
    /// Raw instruction bytes.
    code: Box<[u8]>,
    /// Constant pool, read by index from the instruction stream.
    constants: Box<[Value]>,
}

impl Function {
    pub(crate) fn new(
        num_locals: u32,
        varargs: bool,
        code: Box<[u8]>,
        constants: Box<[Value]>,
    ) -> Self {
        Function {
            num_locals,
            varargs,
            code,
            constants,
        }
    }

    /// Local slot count, including the implicit receiver.
    #[inline]
    pub fn num_locals(&self) -> u32 {
        self.num_locals
    }

    /// Whether the function accepts surplus arguments.
    #[inline]
    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// The raw instruction bytes.
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Instruction byte count.
    #[inline]
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// The opcode byte at `offset`.
    #[inline]
    pub fn bc_at(&self, offset: usize) -> u8 {
        self.code[offset]
    }

    /// The operand word at `offset`, read little-endian at byte granularity.
    #[inline]
    pub fn wc_at(&self, offset: usize) -> Word {
        let mut raw = [0u8; WORD_BYTES];
        raw.copy_from_slice(&self.code[offset..offset + WORD_BYTES]);
        Word::from_le_bytes(raw)
    }

    /// The constant-pool entry at `index`.
    #[inline]
    pub fn const_at(&self, index: usize) -> &Value {
        &self.constants[index]
    }

    /// The constant pool.
    #[inline]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Constant-pool entry count.
    #[inline]
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Check whether `offset` is past the end of the code.
    #[inline]
    pub fn oob(&self, offset: usize) -> bool {
        offset >= self.code.len()
    }
}

/// Disassemble a function to a string.
pub fn disassemble(function: &Function) -> String {
    let mut output = String::new();

    writeln!(output, "Function:").unwrap();
    writeln!(output, "  Locals: {}", function.num_locals()).unwrap();
    writeln!(output, "  Varargs: {}", function.is_varargs()).unwrap();
    writeln!(output, "  Code bytes: {}", function.code_len()).unwrap();

    if function.constant_count() > 0 {
        writeln!(output, "\nConstants:").unwrap();
        for (index, constant) in function.constants().iter().enumerate() {
            writeln!(output, "  {:4}: {}", index, constant).unwrap();
        }
    }

    writeln!(output, "\nDisassembly:").unwrap();
    let mut pc = 0;
    while pc < function.code_len() {
        let byte = function.bc_at(pc);
        let Some(opcode) = Opcode::from_u8(byte) else {
            writeln!(output, "  {:4}: .byte {:#04x}", pc, byte).unwrap();
            pc += 1;
            continue;
        };
        let operands = opcode.operands();
        if pc + 1 + operands.width() > function.code_len() {
            writeln!(output, "  {:4}: {} <truncated>", pc, opcode.mnemonic()).unwrap();
            break;
        }
        match operands {
            Operands::None => {
                writeln!(output, "  {:4}: {}", pc, opcode.mnemonic()).unwrap();
            }
            Operands::Word => {
                let word = function.wc_at(pc + 1);
                if opcode == Opcode::Op {
                    match Op::from_word(word) {
                        Some(op) => {
                            writeln!(output, "  {:4}: {} {}", pc, opcode.mnemonic(), op.mnemonic())
                                .unwrap()
                        }
                        None => writeln!(output, "  {:4}: {} {:#06x}", pc, opcode.mnemonic(), word)
                            .unwrap(),
                    }
                } else {
                    writeln!(output, "  {:4}: {} {}", pc, opcode.mnemonic(), word).unwrap();
                }
            }
            Operands::Pool => {
                let index = function.wc_at(pc + 1);
                match function.constants().get(index as usize) {
                    Some(constant) => writeln!(
                        output,
                        "  {:4}: {} [{}] {}",
                        pc,
                        opcode.mnemonic(),
                        index,
                        constant
                    )
                    .unwrap(),
                    None => writeln!(
                        output,
                        "  {:4}: {} [{}] <bad pool index>",
                        pc,
                        opcode.mnemonic(),
                        index
                    )
                    .unwrap(),
                }
            }
            Operands::Target => {
                writeln!(
                    output,
                    "  {:4}: {} -> {}",
                    pc,
                    opcode.mnemonic(),
                    function.wc_at(pc + 1)
                )
                .unwrap();
            }
            Operands::PoolWord => {
                let index = function.wc_at(pc + 1);
                let args = function.wc_at(pc + 1 + WORD_BYTES);
                let name = function
                    .constants()
                    .get(index as usize)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "<bad pool index>".into());
                writeln!(
                    output,
                    "  {:4}: {} {} args={}",
                    pc,
                    opcode.mnemonic(),
                    name,
                    args
                )
                .unwrap();
            }
        }
        pc += 1 + operands.width();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CodeWriter;
    use talon_core::Symbol;

    #[test]
    fn test_word_reads_are_little_endian() {
        let function = Function::new(1, false, vec![0x06, 0x34, 0x12].into_boxed_slice(), Box::new([]));
        assert_eq!(function.wc_at(1), 0x1234);
    }

    #[test]
    fn test_oob() {
        let function = Function::new(1, false, vec![19].into_boxed_slice(), Box::new([]));
        assert!(!function.oob(0));
        assert!(function.oob(1));
        assert!(function.oob(100));
    }

    #[test]
    fn test_disassemble_load_and_send() {
        let mut writer = CodeWriter::new();
        writer.load_const(talon_core::Value::Int(7));
        writer.push();
        writer.send(Symbol::new("foo"), 0);
        writer.return_();
        let function = writer.finish().unwrap();

        let listing = disassemble(&function);
        assert!(listing.contains("load_const [0] 7"));
        assert!(listing.contains("send #foo args=0"));
        assert!(listing.contains("push"));
        assert!(listing.contains("return"));
    }

    #[test]
    fn test_disassemble_branches_and_ops() {
        let mut writer = CodeWriter::new();
        let label = writer.open_label();
        writer.jump_if_not(label);
        writer.op(crate::bytecode::Op::Add);
        writer.place_label(label);
        writer.return_();
        writer.close_label(label);
        let function = writer.finish().unwrap();

        let listing = disassemble(&function);
        assert!(listing.contains("jump_if_not -> 6"));
        assert!(listing.contains("op add"));
    }

    #[test]
    fn test_disassemble_flags_unknown_bytes() {
        let function = Function::new(1, false, vec![0xFF].into_boxed_slice(), Box::new([]));
        assert!(disassemble(&function).contains(".byte 0xff"));
    }
}
