//! Expression evaluation implementation
//!
//! This module handles evaluation of all expression types, including:
//!
//! - Literals (numbers, strings)
//! - Variables and identifiers
//! - Binary operators, with short-circuit `&&` and `||`
//! - Unary operators (negation, not, address-of, dereference, pre/post increment/decrement)
//! - Assignment, plain and compound
//! - Array subscripting and struct member access
//! - Function calls (including built-ins)
//! - Type casts and sizeof operator
//!
//! All arithmetic and conversion rules live on [`TypedValue`]; evaluation only
//! decides the order in which operands are produced.

use crate::ast::{BinOp, Expr};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::frame::Frame;
use crate::memory::value::TypedValue;
use crate::types::DataType;

impl Interpreter {
    /// Evaluate an expression and return its value
    pub fn evaluate(
        &mut self,
        expr: &Expr,
        frame: &mut Frame<'_>,
    ) -> Result<TypedValue, RuntimeError> {
        match expr {
            Expr::Number(value) => Ok(TypedValue::literal(*value)),

            Expr::StringLiteral(text) => frame.allocate_string_literal(text),

            Expr::Variable(name) => frame.lookup_value(name),

            Expr::Binary { op, left, right } => match op {
                BinOp::And => {
                    let result =
                        self.condition(left, frame)? && self.condition(right, frame)?;
                    Ok(TypedValue::new(result as i32 as f64, DataType::Int))
                }
                BinOp::Or => {
                    let result =
                        self.condition(left, frame)? || self.condition(right, frame)?;
                    Ok(TypedValue::new(result as i32 as f64, DataType::Int))
                }
                _ => {
                    let left = self.evaluate(left, frame)?;
                    let right = self.evaluate(right, frame)?;
                    left.apply_binary(*op, &right)
                }
            },

            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, frame)?;
                value.unary(*op, frame)
            }

            // The right side is evaluated before the target is located
            Expr::Assign { op, target, value } => {
                let right = self.evaluate(value, frame)?;
                let left = self.evaluate(target, frame)?;
                left.assign(frame, &right, *op)
            }

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                let chosen = if self.condition(condition, frame)? {
                    then_expr
                } else {
                    else_expr
                };
                Ok(self.evaluate(chosen, frame)?.into_rvalue())
            }

            Expr::Call { name, args } => {
                let callable = frame.lookup_function(name)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg, frame)?.into_rvalue());
                }
                self.call_function(&callable, values, frame)
            }

            // a[i] is *(a + i)
            Expr::Index { array, index } => {
                let base = self.evaluate(array, frame)?;
                let offset = self.evaluate(index, frame)?;
                base.plus(&offset)?.dereference(frame)
            }

            Expr::Member { object, field } => {
                let object = self.evaluate(object, frame)?;
                object.member(field, frame)
            }

            Expr::PointerMember { object, field } => {
                let pointer = self.evaluate(object, frame)?;
                pointer.dereference(frame)?.member(field, frame)
            }

            Expr::Cast { target_type, expr } => {
                let value = self.evaluate(expr, frame)?;
                if matches!(target_type, DataType::Void) {
                    return Ok(TypedValue::void());
                }
                value.explicit_cast(target_type)
            }

            Expr::SizeofType(ty) => Ok(TypedValue::new(ty.size()? as f64, DataType::Int)),

            Expr::SizeofExpr(inner) => {
                let ty = self.infer_type(inner, frame)?;
                Ok(TypedValue::new(ty.size()? as f64, DataType::Int))
            }
        }
    }
}
