mod common;

use cimage::ast::{BinOp, Expr, UnOp};
use cimage::types::DataType;
use common::*;

fn op(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::binary(op, left, right)
}

#[test]
fn test_arithmetic_coercion() {
    let p = program(vec![main_fn(vec![
        decl("c", DataType::Char, Some(num(97.0))),
        decl("two", DataType::Char, Some(num(2.0))),
        decl("i", DataType::Int, Some(num(10.0))),
        printf("Char + Int: %d\n", vec![op(BinOp::Add, var("c"), var("i"))]),
        printf("Int - Char: %d\n", vec![op(BinOp::Sub, var("i"), var("c"))]),
        printf("Char * Char: %d\n", vec![op(BinOp::Mul, var("c"), var("two"))]),
        printf("Char / Int: %d\n", vec![op(BinOp::Div, var("c"), num(2.0))]),
        printf("Char == Int: %d\n", vec![op(BinOp::Eq, var("c"), num(97.0))]),
        printf("Int == Char: %d\n", vec![op(BinOp::Eq, num(97.0), var("c"))]),
        ret(num(0.0)),
    ])]);

    assert_eq!(
        run_program(p),
        TestResult::ok(
            0,
            "Char + Int: 107\nInt - Char: -87\nChar * Char: 194\nChar / Int: 48\n\
             Char == Int: 1\nInt == Char: 1\n"
        )
    );
}

#[test]
fn test_float_arithmetic() {
    let p = program(vec![main_fn(vec![
        decl("f", DataType::Float, Some(num(7.0))),
        printf("%.2f ", vec![op(BinOp::Div, var("f"), num(2.0))]),
        printf("%d ", vec![Expr::cast(DataType::Int, num(-3.75))]),
        printf("%f", vec![op(BinOp::Mul, var("f"), num(0.5))]),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::ok(0, "3.50 -3 3.500000"));
}

#[test]
fn test_integer_division_truncates() {
    let p = program(vec![main_fn(vec![
        decl("a", DataType::Int, Some(num(-7.0))),
        printf(
            "%d %d",
            vec![
                op(BinOp::Div, var("a"), num(2.0)),
                op(BinOp::Mod, var("a"), num(2.0)),
            ],
        ),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::ok(0, "-3 -1"));
}

#[test]
fn test_modulo_by_zero() {
    let p = program(vec![main_fn(vec![
        decl("a", DataType::Int, Some(num(5.0))),
        expr(op(BinOp::Mod, var("a"), num(0.0))),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::error("modulo by zero"));
}

#[test]
fn test_bitwise_operators() {
    let p = program(vec![main_fn(vec![
        decl("x", DataType::Int, Some(num(12.0))),
        printf(
            "%d %d %d %d %x",
            vec![
                op(BinOp::BitAnd, var("x"), num(10.0)),
                op(BinOp::BitOr, var("x"), num(3.0)),
                op(BinOp::BitXor, var("x"), num(5.0)),
                op(BinOp::BitShl, var("x"), num(2.0)),
                Expr::unary(UnOp::BitNot, num(0.0)),
            ],
        ),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::ok(0, "8 15 9 48 ffffffff"));
}

#[test]
fn test_pointer_arithmetic() {
    let int_ptr = DataType::Int.pointer_to();
    let p = program(vec![main_fn(vec![
        decl("arr", DataType::Int.array_of(&[5]), None),
        decl("p", int_ptr.clone(), Some(var("arr"))),
        decl("p2", int_ptr, Some(op(BinOp::Add, var("p"), num(2.0)))),
        expr(Expr::assign(Expr::unary(UnOp::Deref, var("p2")), num(42.0))),
        printf(
            "%d %d %d",
            vec![
                Expr::index(var("arr"), num(2.0)),
                op(BinOp::Sub, var("p2"), var("p")),
                op(BinOp::Lt, var("p"), var("p2")),
            ],
        ),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::ok(0, "42 2 1"));
}

#[test]
fn test_pointer_times_int_rejected() {
    let p = program(vec![main_fn(vec![
        decl("arr", DataType::Int.array_of(&[2]), None),
        expr(op(BinOp::Mul, var("arr"), num(2.0))),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::error(r"invalid operands to '\*'"));
}

#[test]
fn test_compound_assignment() {
    let p = program(vec![main_fn(vec![
        decl("n", DataType::Int, Some(num(10.0))),
        expr(Expr::compound(BinOp::Add, var("n"), num(5.0))),
        expr(Expr::compound(BinOp::Mul, var("n"), num(2.0))),
        expr(Expr::compound(BinOp::Sub, var("n"), num(1.0))),
        printf("%d", vec![var("n")]),
        ret(num(0.0)),
    ])]);

    assert_eq!(run_program(p), TestResult::ok(0, "29"));
}
