//! The code writer.
//!
//! `CodeWriter` is the emission facade driven by the compiler front-end. It
//! translates semantic emission calls (load, store, op, send, jump, ...)
//! into concrete opcode and operand sequences on a byte buffer, interns
//! values into the constant pool, resolves forward branches through a label
//! table, and finalizes into an immutable [`Function`].
//!
//! A writer is created fresh for each function body, driven by a single
//! compilation activity, and consumed by [`CodeWriter::finish`]. It is not
//! shared and never synchronizes.

use super::buffer::{ByteBuffer, Word, WORD_BYTES};
use super::function::Function;
use super::opcode::{Op, Opcode};
use super::pool::ConstantPool;
use smallvec::SmallVec;
use std::fmt;
use talon_core::{Symbol, Value};

/// Hard cap on simultaneously open labels per function.
pub const MAX_LABELS: usize = 64;

/// Operand emitted when bookkeeping is exhausted. The interpreter rejects
/// functions containing it; a finished writer never produces one.
const SENTINEL: Word = Word::MAX;

/// Identifier handed out when the label table is full.
const INVALID_LABEL: u32 = u32::MAX;

/// A deferred branch target.
///
/// Labels are an arena-style resource private to one writer: identifiers
/// are small integers, single-use, and meaningless to any other writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// One slot of the label table.
#[derive(Debug)]
enum Slot {
    /// Unused.
    Free,
    /// Handed out; the location it will name is not yet known. `pending`
    /// holds the byte offsets of placeholder operands awaiting the target.
    Open { pending: SmallVec<[u32; 4]> },
    /// The instruction offset this label denotes.
    Placed { target: Word },
}

/// Sticky emission failure surfaced by [`CodeWriter::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    /// The instruction buffer could not grow; the failing append and every
    /// emission after it are void.
    OutOfMemory,
    /// No free label slot for a new label.
    LabelTableFull,
    /// The constant pool is full.
    PoolFull,
    /// Code grew past the operand-word range, so branch targets can no
    /// longer be represented.
    CodeTooLarge,
    /// Branches were emitted against labels that were never placed.
    UnresolvedLabels(usize),
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::OutOfMemory => write!(f, "instruction buffer allocation failed"),
            EmitError::LabelTableFull => write!(f, "label table exhausted ({} slots)", MAX_LABELS),
            EmitError::PoolFull => write!(f, "constant pool exhausted"),
            EmitError::CodeTooLarge => {
                write!(f, "code exceeds the addressable range of branch operands")
            }
            EmitError::UnresolvedLabels(count) => {
                write!(f, "{} branch operand(s) reference unplaced labels", count)
            }
        }
    }
}

impl std::error::Error for EmitError {}

/// Bytecode emitter for one function body.
pub struct CodeWriter {
    /// Instruction byte stream.
    buffer: ByteBuffer,
    /// Embedded constant pool.
    pool: ConstantPool,
    /// Label slots; pending references live inside their label's slot.
    slots: Vec<Slot>,
    /// High-water mark of reported local counts.
    max_locals: u16,
    /// Whether the function accepts surplus arguments.
    varargs: bool,
    /// First emission failure; later emissions are best-effort no-ops.
    poison: Option<EmitError>,
    /// References left dangling by closing an unplaced label.
    leaked_refs: usize,
}

impl CodeWriter {
    /// Create a writer for a fresh function body.
    pub fn new() -> Self {
        CodeWriter {
            buffer: ByteBuffer::new(),
            pool: ConstantPool::new(),
            slots: Vec::new(),
            max_locals: 0,
            varargs: false,
            poison: None,
            leaked_refs: 0,
        }
    }

    // =========================================================================
    // Locals and flags
    // =========================================================================

    /// Raise the local-count high-water mark. Idempotent; the mark never
    /// decreases.
    pub fn report_locals(&mut self, locals: u16) {
        if locals > self.max_locals {
            self.max_locals = locals;
        }
    }

    /// Mark the function as accepting surplus arguments. Idempotent.
    pub fn enable_varargs(&mut self) {
        self.varargs = true;
    }

    /// Byte offset the next emission will land on.
    #[inline]
    pub fn current_offset(&self) -> usize {
        self.buffer.len()
    }

    // =========================================================================
    // Low-level appends
    // =========================================================================

    fn poison(&mut self, error: EmitError) {
        if self.poison.is_none() {
            self.poison = Some(error);
        }
    }

    fn write_opcode(&mut self, opcode: Opcode) {
        if self.buffer.append_byte(opcode as u8).is_err() {
            self.poison(EmitError::OutOfMemory);
        }
    }

    fn write_word(&mut self, word: Word) {
        if self.buffer.append_word(word).is_err() {
            self.poison(EmitError::OutOfMemory);
        }
    }

    /// Intern `value` and append its pool index as the next operand.
    fn write_constant(&mut self, value: Value) {
        match self.pool.append(value) {
            Some(index) => self.write_word(index),
            None => {
                self.write_word(SENTINEL);
                self.poison(EmitError::PoolFull);
            }
        }
    }

    /// Append a branch operand referencing `label`.
    ///
    /// A placed label resolves immediately (backward jump). An open label
    /// gets a placeholder word whose offset is recorded in the label's
    /// pending list for patching at placement.
    fn write_label_ref(&mut self, label: Label) {
        if label.0 == INVALID_LABEL {
            // open_label already poisoned the writer
            self.write_word(SENTINEL);
            return;
        }
        let resolved = match self.slots.get(label.0 as usize) {
            Some(Slot::Placed { target }) => Some(*target),
            Some(Slot::Open { .. }) => None,
            _ => {
                debug_assert!(false, "branch references a closed label");
                self.leaked_refs += 1;
                self.write_word(SENTINEL);
                return;
            }
        };
        match resolved {
            Some(target) => self.write_word(target),
            None => {
                let site = self.buffer.len();
                self.write_word(0);
                // only record the site if the placeholder actually landed
                if self.buffer.len() == site + WORD_BYTES {
                    if let Some(Slot::Open { pending }) = self.slots.get_mut(label.0 as usize) {
                        pending.push(site as u32);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Emission primitives
    // =========================================================================

    /// Emit a no-op.
    pub fn noop(&mut self) {
        self.write_opcode(Opcode::Noop);
    }

    /// Load the implicit receiver into the accumulator.
    pub fn load_self(&mut self) {
        self.write_opcode(Opcode::LoadSelf);
    }

    /// Load a constant, interning it into the pool.
    pub fn load_const(&mut self, value: Value) {
        self.write_opcode(Opcode::LoadConst);
        self.write_constant(value);
    }

    /// Collect the top `size` stacked values into an array.
    pub fn load_array(&mut self, size: Word) {
        self.write_opcode(Opcode::LoadArray);
        self.write_word(size);
    }

    /// Collect the top `size` stacked values into a mapping.
    pub fn load_mapping(&mut self, size: Word) {
        self.write_opcode(Opcode::LoadMapping);
        self.write_word(size);
    }

    /// Build a function reference to `name`, bound to self.
    pub fn load_funcref(&mut self, name: Symbol) {
        self.write_opcode(Opcode::LoadFuncref);
        self.write_constant(Value::Symbol(name));
    }

    /// Load a local slot.
    pub fn load_local(&mut self, index: Word) {
        self.write_opcode(Opcode::LoadLocal);
        self.write_word(index);
    }

    /// Load a member slot of self.
    pub fn load_member(&mut self, index: Word) {
        self.write_opcode(Opcode::LoadMember);
        self.write_word(index);
    }

    /// Store the accumulator into a local slot.
    pub fn store_local(&mut self, index: Word) {
        self.write_opcode(Opcode::StoreLocal);
        self.write_word(index);
    }

    /// Store the accumulator into a member slot of self.
    pub fn store_member(&mut self, index: Word) {
        self.write_opcode(Opcode::StoreMember);
        self.write_word(index);
    }

    /// Push the implicit receiver onto the stack.
    pub fn push_self(&mut self) {
        self.write_opcode(Opcode::PushSelf);
    }

    /// Push the accumulator onto the stack.
    pub fn push(&mut self) {
        self.write_opcode(Opcode::PushAccu);
    }

    /// Pop the stack into the accumulator.
    pub fn pop(&mut self) {
        self.write_opcode(Opcode::PopAccu);
    }

    /// Run a secondary operator.
    pub fn op(&mut self, op: Op) {
        self.write_opcode(Opcode::Op);
        self.write_word(op as Word);
    }

    /// Dispatch `message` on the stacked receiver with `args` arguments.
    pub fn send(&mut self, message: Symbol, args: Word) {
        self.write_opcode(Opcode::Send);
        self.write_constant(Value::Symbol(message));
        self.write_word(args);
    }

    /// Dispatch `message` on the parent blueprint.
    pub fn super_send(&mut self, message: Symbol, args: Word) {
        self.write_opcode(Opcode::SuperSend);
        self.write_constant(Value::Symbol(message));
        self.write_word(args);
    }

    /// Unconditional branch to `label`.
    pub fn jump(&mut self, label: Label) {
        self.write_opcode(Opcode::Jump);
        self.write_label_ref(label);
    }

    /// Branch to `label` when the accumulator is true.
    pub fn jump_if(&mut self, label: Label) {
        self.write_opcode(Opcode::JumpIf);
        self.write_label_ref(label);
    }

    /// Branch to `label` when the accumulator is false.
    pub fn jump_if_not(&mut self, label: Label) {
        self.write_opcode(Opcode::JumpIfNot);
        self.write_label_ref(label);
    }

    /// Return from the current frame.
    pub fn return_(&mut self) {
        self.write_opcode(Opcode::Return);
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Hand out a fresh label.
    ///
    /// Scans the whole table for a free slot, extending it up to
    /// [`MAX_LABELS`]. Exhaustion poisons the writer and returns a label
    /// whose references all become sentinels.
    pub fn open_label(&mut self) -> Label {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Free) {
                *slot = Slot::Open {
                    pending: SmallVec::new(),
                };
                return Label(index as u32);
            }
        }
        if self.slots.len() < MAX_LABELS {
            self.slots.push(Slot::Open {
                pending: SmallVec::new(),
            });
            return Label((self.slots.len() - 1) as u32);
        }
        self.poison(EmitError::LabelTableFull);
        Label(INVALID_LABEL)
    }

    /// Record the current offset as `label`'s target and patch every
    /// pending reference to it. Placing the same label twice is not
    /// supported.
    pub fn place_label(&mut self, label: Label) {
        let index = label.0 as usize;
        if index >= self.slots.len() {
            return;
        }
        if self.buffer.len() > Word::MAX as usize {
            self.poison(EmitError::CodeTooLarge);
            return;
        }
        let target = self.buffer.len() as Word;
        match std::mem::replace(&mut self.slots[index], Slot::Placed { target }) {
            Slot::Open { pending } => {
                for site in pending {
                    self.buffer.patch_word_at(site as usize, target);
                }
            }
            Slot::Placed { .. } => debug_assert!(false, "label placed twice"),
            Slot::Free => debug_assert!(false, "placing a closed label"),
        }
    }

    /// Release `label`'s slot without patching.
    ///
    /// Closing a placed label is the normal release path. Closing an open
    /// label that already has references leaves those operands as
    /// placeholders; [`CodeWriter::finish`] reports them.
    pub fn close_label(&mut self, label: Label) {
        let index = label.0 as usize;
        if index >= self.slots.len() {
            return;
        }
        if let Slot::Open { pending } = std::mem::replace(&mut self.slots[index], Slot::Free) {
            self.leaked_refs += pending.len();
        }
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Consume the writer into an immutable function artifact.
    ///
    /// The artifact reserves one extra local slot for the implicit
    /// receiver. Refuses when any emission failed or when branch operands
    /// still reference unplaced labels.
    pub fn finish(self) -> Result<Function, EmitError> {
        if let Some(error) = self.poison {
            return Err(error);
        }
        let mut unresolved = self.leaked_refs;
        for slot in &self.slots {
            if let Slot::Open { pending } = slot {
                unresolved += pending.len();
            }
        }
        if unresolved > 0 {
            return Err(EmitError::UnresolvedLabels(unresolved));
        }
        Ok(Function::new(
            u32::from(self.max_locals) + 1,
            self.varargs,
            self.buffer.into_boxed_slice(),
            self.pool.into_boxed_slice(),
        ))
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        CodeWriter::new()
    }
}
