//! Facade lowering scenarios: scopes, members, loops, sends.

use talon_compiler::bytecode::{Op, Opcode, WORD_BYTES};
use talon_compiler::{Compiler, MemberTable};
use talon_core::{Symbol, Value};

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

/// Collect the opcodes of a finished function, skipping operands.
fn opcodes(function: &talon_compiler::bytecode::Function) -> Vec<Opcode> {
    let mut result = Vec::new();
    let mut pc = 0;
    while pc < function.code_len() {
        let opcode = Opcode::from_u8(function.bc_at(pc)).expect("decodable stream");
        result.push(opcode);
        pc += 1 + opcode.operands().width();
    }
    result
}

#[test]
fn greet_method_lowering() {
    // void greet(string who) { who = who; self.hello(who); }
    let mut compiler = Compiler::new(MemberTable::new());
    compiler.add_arg(sym("who"));

    assert!(compiler.load_var(&sym("who")));
    assert!(compiler.store_var(&sym("who")));
    compiler.push_self();
    compiler.load_var(&sym("who"));
    compiler.push();
    compiler.send(sym("hello"), 1);
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert_eq!(
        opcodes(&function),
        vec![
            Opcode::LoadLocal,
            Opcode::StoreLocal,
            Opcode::PushSelf,
            Opcode::LoadLocal,
            Opcode::PushAccu,
            Opcode::Send,
            Opcode::Return,
        ]
    );
    assert_eq!(function.num_locals(), 2);
    assert_eq!(
        function.const_at(0),
        &Value::Symbol(sym("hello"))
    );
}

#[test]
fn member_assignment_lowering() {
    // hp = hp - damage;  with `hp` a member and `damage` an argument
    let mut members = MemberTable::new();
    members.declare(sym("hp"));
    let mut compiler = Compiler::new(members);
    compiler.add_arg(sym("damage"));

    compiler.load_var(&sym("hp"));
    compiler.push();
    compiler.load_var(&sym("damage"));
    compiler.op(Op::Sub);
    compiler.store_var(&sym("hp"));
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert_eq!(
        opcodes(&function),
        vec![
            Opcode::LoadMember,
            Opcode::PushAccu,
            Opcode::LoadLocal,
            Opcode::Op,
            Opcode::StoreMember,
            Opcode::Return,
        ]
    );
}

#[test]
fn array_literal_lowering() {
    // { "hi", "hello", "hey" }
    let mut compiler = Compiler::new(MemberTable::new());
    for greeting in ["hi", "hello", "hey"] {
        compiler.load_constant(Value::Str(greeting.into()));
        compiler.push();
    }
    compiler.load_array(3);
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert_eq!(function.constant_count(), 3);
    let array_at = 3 * (2 + WORD_BYTES);
    assert_eq!(function.bc_at(array_at), Opcode::LoadArray as u8);
    assert_eq!(function.wc_at(array_at + 1), 3);
}

#[test]
fn funcref_and_super_send() {
    let mut compiler = Compiler::new(MemberTable::new());
    compiler.load_funcref(sym("on_tick"));
    compiler.push_self();
    compiler.super_send(sym("create"), 0);
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert_eq!(function.const_at(0), &Value::Symbol(sym("on_tick")));
    assert_eq!(function.const_at(1), &Value::Symbol(sym("create")));
    assert_eq!(
        opcodes(&function),
        vec![
            Opcode::LoadFuncref,
            Opcode::PushSelf,
            Opcode::SuperSend,
            Opcode::Return,
        ]
    );
}

#[test]
fn counting_loop_lowering() {
    // for (int i = 0; i < max; i = i + 1) { self.tick(); }
    let mut members = MemberTable::new();
    members.declare(sym("max"));
    let mut compiler = Compiler::new(members);

    compiler.enter_block();
    compiler.add_var(sym("i"));
    compiler.load_constant(Value::Int(0));
    compiler.store_var(&sym("i"));

    let head = compiler.open_continue_label();
    let end = compiler.open_break_label();
    compiler.place_label(head);

    compiler.load_var(&sym("i"));
    compiler.push();
    compiler.load_var(&sym("max"));
    compiler.op(Op::Greater);
    compiler.jump_if_not(end);

    compiler.push_self();
    compiler.send(sym("tick"), 0);

    compiler.load_var(&sym("i"));
    compiler.push();
    compiler.load_constant(Value::Int(1));
    compiler.op(Op::Add);
    compiler.store_var(&sym("i"));
    compiler.jump(head);

    compiler.place_label(end);
    compiler.close_label(head);
    compiler.close_label(end);
    compiler.leave_block();
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert_eq!(function.num_locals(), 2);
    assert!(!function.is_varargs());

    let ops = opcodes(&function);
    assert_eq!(ops.first(), Some(&Opcode::LoadConst));
    assert_eq!(ops.last(), Some(&Opcode::Return));
    assert!(ops.contains(&Opcode::JumpIfNot));
    assert!(ops.contains(&Opcode::Jump));

    // the backward jump returns to the loop head, past the two
    // initializer instructions
    let head_offset = 2 * (1 + WORD_BYTES);
    let mut pc = 0;
    let mut jump_target = None;
    while pc < function.code_len() {
        let opcode = Opcode::from_u8(function.bc_at(pc)).unwrap();
        if opcode == Opcode::Jump {
            jump_target = Some(function.wc_at(pc + 1));
        }
        pc += 1 + opcode.operands().width();
    }
    assert_eq!(jump_target, Some(head_offset as u16));
}

#[test]
fn varargs_function() {
    let mut compiler = Compiler::new(MemberTable::new());
    compiler.add_arg(sym("first"));
    compiler.enable_varargs();
    compiler.return_();

    let function = compiler.finish().expect("finish");
    assert!(function.is_varargs());
    assert_eq!(function.num_locals(), 2);
}
