// Driving the interpreter one statement at a time against a hand-built frame

mod common;

use cimage::ast::{Expr, Program, UnOp};
use cimage::interpreter::engine::{ExecutionConfig, Interpreter};
use cimage::memory::frame::Frame;
use cimage::memory::{Memory, MemoryConfig};
use cimage::types::DataType;
use common::*;
use std::cell::RefCell;
use std::rc::Rc;

fn fresh_memory() -> Rc<RefCell<Memory>> {
    Rc::new(RefCell::new(Memory::new(&MemoryConfig::default()).unwrap()))
}

fn interpreter() -> Interpreter {
    init_logging();
    Interpreter::new(Program::new(), ExecutionConfig::default())
}

#[test]
fn test_post_increment_updates_binding() {
    let mut root = Frame::root(fresh_memory());
    Interpreter::bind_builtins(&mut root).unwrap();
    let mut scope = root.extend();
    let mut interp = interpreter();

    interp.execute(&decl("a", DataType::Int, None), &mut scope).unwrap();
    interp
        .execute(&expr(Expr::assign(var("a"), num(5.0))), &mut scope)
        .unwrap();
    let observed = interp
        .evaluate(&Expr::unary(UnOp::PostInc, var("a")), &mut scope)
        .unwrap();

    assert_eq!(observed.value(), 5.0);
    assert!(!observed.is_lvalue());

    let a = scope.lookup_value("a").unwrap();
    assert_eq!(a.value(), 6.0);
    assert_eq!(a.data_type(), &DataType::Int);
    assert!(a.is_lvalue());
}

#[test]
fn test_strcpy_through_decayed_pointer() {
    let mut root = Frame::root(fresh_memory());
    Interpreter::bind_builtins(&mut root).unwrap();
    let mut scope = root.extend();
    let mut interp = interpreter();

    interp
        .execute(&decl("buf", DataType::Char.array_of(&[4]), None), &mut scope)
        .unwrap();
    interp
        .evaluate(
            &Expr::call("strcpy", vec![var("buf"), Expr::string("hi")]),
            &mut scope,
        )
        .unwrap();

    let buf = scope.lookup_value("buf").unwrap();
    let pointer = buf.implicit_cast(&DataType::Char.pointer_to()).unwrap();
    assert_eq!(pointer.to_address(), buf.address().unwrap());
    assert_eq!(scope.dereference_as_string(&pointer).unwrap(), "hi");
}

#[test]
fn test_heap_reuses_freed_block() {
    let memory = fresh_memory();
    let root = Frame::root(Rc::clone(&memory));

    let first = root.allocate_on_heap(10).unwrap();
    let second = root.allocate_on_heap(10).unwrap();
    assert!(second.to_address() >= first.to_address() + 10 + 8);

    root.free(&first).unwrap();
    let third = root.allocate_on_heap(10).unwrap();
    assert_eq!(third.to_address(), first.to_address());

    let memory = memory.borrow();
    assert_eq!(memory.live_allocations(), 2);
    memory.check_heap().unwrap();
}

#[test]
fn test_block_scope_hides_names_after_close() {
    let mut root = Frame::root(fresh_memory());
    Interpreter::bind_builtins(&mut root).unwrap();
    let mut scope = root.extend();
    let mut interp = interpreter();

    interp
        .execute(
            &block(vec![decl("inner", DataType::Int, Some(num(1.0)))]),
            &mut scope,
        )
        .unwrap();

    assert!(scope.lookup_value("inner").is_err());
    assert_eq!(scope.stack_top(), scope.base());
}

#[test]
fn test_string_literals_are_interned() {
    let root = Frame::root(fresh_memory());

    let a = root.allocate_string_literal("shared").unwrap();
    let b = root.allocate_string_literal("\"shared\"").unwrap();
    assert_eq!(a.to_address(), b.to_address());
    assert_eq!(root.dereference_as_string(&a).unwrap(), "shared");

    // Literals are read-only
    let err = root.assign_value_by_address(a.to_address(), &DataType::Char, &num_value(120.0));
    assert!(err.is_err());
}

fn num_value(value: f64) -> cimage::memory::value::TypedValue {
    cimage::memory::value::TypedValue::literal(value)
}
