//! Parser-facing compilation facade.
//!
//! The `Compiler` sits between the parser and the [`CodeWriter`]. It adds
//! what the raw writer does not know about:
//!
//! - lexical blocks and argument/variable declarations
//! - symbolic `load_var` / `store_var`, lowered to local or member slots
//! - break/continue labels tied to the innermost enclosing loop
//!
//! Everything else passes straight through to the writer. The parser keeps
//! deciding *what* to emit; this layer only resolves names and loop
//! targets.

use crate::bytecode::{CodeWriter, EmitError, Function, Label, Op, Word};
use crate::scope::ScopeChain;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use talon_core::{Symbol, Value};

/// Where a resolved variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarLocation {
    /// A local slot of the current frame.
    Local(Word),
    /// A member slot of the receiver's blueprint.
    Member(Word),
}

/// Member-variable layout of the blueprint a function is compiled against.
///
/// Maps field names to the slot indices the interpreter uses for
/// `load_member` / `store_member`.
#[derive(Debug, Default)]
pub struct MemberTable {
    slots: FxHashMap<Symbol, Word>,
}

impl MemberTable {
    /// Create an empty table.
    pub fn new() -> Self {
        MemberTable {
            slots: FxHashMap::default(),
        }
    }

    /// Declare a field, returning its slot.
    pub fn declare(&mut self, name: Symbol) -> Word {
        let slot = self.slots.len() as Word;
        *self.slots.entry(name).or_insert(slot)
    }

    /// Look up a field's slot.
    pub fn resolve(&self, name: &Symbol) -> Option<Word> {
        self.slots.get(name).copied()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Break/continue targets registered by one block.
#[derive(Debug, Default, Clone, Copy)]
struct BlockContext {
    break_label: Option<Label>,
    continue_label: Option<Label>,
}

/// The compilation facade for one function body.
pub struct Compiler {
    /// The underlying emitter.
    writer: CodeWriter,
    /// Lexical variable chain.
    scopes: ScopeChain,
    /// Per-block loop targets, parallel to the scope chain.
    contexts: SmallVec<[BlockContext; 4]>,
    /// Field layout of the enclosing blueprint.
    members: MemberTable,
}

impl Compiler {
    /// Create a compiler for a function of a blueprint with the given
    /// member layout.
    pub fn new(members: MemberTable) -> Self {
        let mut contexts = SmallVec::new();
        contexts.push(BlockContext::default());
        Compiler {
            writer: CodeWriter::new(),
            scopes: ScopeChain::new(),
            contexts,
            members,
        }
    }

    // =========================================================================
    // Blocks and declarations
    // =========================================================================

    /// Enter a nested lexical block.
    pub fn enter_block(&mut self) {
        self.scopes.enter();
        self.contexts.push(BlockContext::default());
    }

    /// Leave the innermost block, releasing its slots and loop targets.
    pub fn leave_block(&mut self) {
        self.scopes.leave();
        debug_assert!(self.contexts.len() > 1, "leaving the root block");
        if self.contexts.len() > 1 {
            self.contexts.pop();
        }
    }

    /// Declare a parameter in the innermost block.
    pub fn add_arg(&mut self, name: Symbol) -> Word {
        self.add_var(name)
    }

    /// Declare a variable in the innermost block and keep the writer's
    /// local count current.
    pub fn add_var(&mut self, name: Symbol) -> Word {
        let slot = self.scopes.declare(name);
        self.writer.report_locals(self.scopes.count());
        slot
    }

    /// Mark the function as accepting surplus arguments.
    pub fn enable_varargs(&mut self) {
        self.writer.enable_varargs();
    }

    // =========================================================================
    // Variable access
    // =========================================================================

    /// Resolve a name to a local slot, falling back to the member layout.
    pub fn resolve_var(&self, name: &Symbol) -> Option<VarLocation> {
        if let Some(slot) = self.scopes.resolve(name) {
            return Some(VarLocation::Local(slot));
        }
        self.members.resolve(name).map(VarLocation::Member)
    }

    /// Emit a load of `name`. Returns `false`, emitting nothing, when the
    /// name resolves to neither a local nor a member.
    pub fn load_var(&mut self, name: &Symbol) -> bool {
        match self.resolve_var(name) {
            Some(VarLocation::Local(slot)) => self.writer.load_local(slot),
            Some(VarLocation::Member(slot)) => self.writer.load_member(slot),
            None => return false,
        }
        true
    }

    /// Emit a store to `name`. Returns `false`, emitting nothing, when the
    /// name is unknown.
    pub fn store_var(&mut self, name: &Symbol) -> bool {
        match self.resolve_var(name) {
            Some(VarLocation::Local(slot)) => self.writer.store_local(slot),
            Some(VarLocation::Member(slot)) => self.writer.store_member(slot),
            None => return false,
        }
        true
    }

    // =========================================================================
    // Emission pass-throughs
    // =========================================================================

    /// Load the implicit receiver.
    pub fn load_self(&mut self) {
        self.writer.load_self();
    }

    /// Load a constant value.
    pub fn load_constant(&mut self, value: Value) {
        self.writer.load_const(value);
    }

    /// Collect stacked elements into an array.
    pub fn load_array(&mut self, size: Word) {
        self.writer.load_array(size);
    }

    /// Collect stacked elements into a mapping.
    pub fn load_mapping(&mut self, size: Word) {
        self.writer.load_mapping(size);
    }

    /// Build a function reference bound to self.
    pub fn load_funcref(&mut self, name: Symbol) {
        self.writer.load_funcref(name);
    }

    /// Push the implicit receiver.
    pub fn push_self(&mut self) {
        self.writer.push_self();
    }

    /// Push the accumulator.
    pub fn push(&mut self) {
        self.writer.push();
    }

    /// Pop into the accumulator.
    pub fn pop(&mut self) {
        self.writer.pop();
    }

    /// Run a secondary operator.
    pub fn op(&mut self, op: Op) {
        self.writer.op(op);
    }

    /// Dispatch a message on the stacked receiver.
    pub fn send(&mut self, message: Symbol, args: Word) {
        self.writer.send(message, args);
    }

    /// Dispatch a message on the parent blueprint.
    pub fn super_send(&mut self, message: Symbol, args: Word) {
        self.writer.super_send(message, args);
    }

    /// Return from the function.
    pub fn return_(&mut self) {
        self.writer.return_();
    }

    // =========================================================================
    // Labels and loops
    // =========================================================================

    /// Hand out a fresh label.
    pub fn open_label(&mut self) -> Label {
        self.writer.open_label()
    }

    /// Open a label and register it as the innermost block's break target.
    pub fn open_break_label(&mut self) -> Label {
        let label = self.writer.open_label();
        self.contexts
            .last_mut()
            .expect("facade holds a root context")
            .break_label = Some(label);
        label
    }

    /// Open a label and register it as the innermost block's continue
    /// target.
    pub fn open_continue_label(&mut self) -> Label {
        let label = self.writer.open_label();
        self.contexts
            .last_mut()
            .expect("facade holds a root context")
            .continue_label = Some(label);
        label
    }

    /// Record the current offset as `label`'s target.
    pub fn place_label(&mut self, label: Label) {
        self.writer.place_label(label);
    }

    /// Release `label`.
    pub fn close_label(&mut self, label: Label) {
        self.writer.close_label(label);
    }

    /// Unconditional branch.
    pub fn jump(&mut self, label: Label) {
        self.writer.jump(label);
    }

    /// Branch when the accumulator is true.
    pub fn jump_if(&mut self, label: Label) {
        self.writer.jump_if(label);
    }

    /// Branch when the accumulator is false.
    pub fn jump_if_not(&mut self, label: Label) {
        self.writer.jump_if_not(label);
    }

    /// Jump to the innermost enclosing break target. Returns `false`,
    /// emitting nothing, outside a loop.
    pub fn break_(&mut self) -> bool {
        let target = self
            .contexts
            .iter()
            .rev()
            .find_map(|context| context.break_label);
        match target {
            Some(label) => {
                self.writer.jump(label);
                true
            }
            None => false,
        }
    }

    /// Jump to the innermost enclosing continue target. Returns `false`,
    /// emitting nothing, outside a loop.
    pub fn continue_(&mut self) -> bool {
        let target = self
            .contexts
            .iter()
            .rev()
            .find_map(|context| context.continue_label);
        match target {
            Some(label) => {
                self.writer.jump(label);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Byte offset the next emission will land on.
    #[inline]
    pub fn current_offset(&self) -> usize {
        self.writer.current_offset()
    }

    /// Consume the facade into the finished function.
    pub fn finish(self) -> Result<Function, EmitError> {
        self.writer.finish()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new(MemberTable::new())
    }
}
