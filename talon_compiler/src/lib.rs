//! Bytecode emission for the Talon scripting language.
//!
//! This crate turns a front-end's semantic emission calls into executable
//! function artifacts. It has two layers:
//!
//! - [`bytecode`] - the code writer: a growable instruction buffer, a
//!   constant pool, forward/backward label resolution and finalization into
//!   an immutable [`bytecode::Function`]
//! - [`Compiler`] - the parser-facing facade: lexical scopes, argument and
//!   variable declarations, symbolic load/store lowering, and break/continue
//!   label management

pub mod bytecode;
mod compiler;
mod scope;

pub use compiler::{Compiler, MemberTable, VarLocation};
pub use scope::ScopeChain;
