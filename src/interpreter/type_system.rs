//! Static type inference
//!
//! `sizeof(expr)` needs the type of `expr` without evaluating it, so side effects
//! such as `sizeof(i++)` never happen. The rules mirror evaluation exactly: every
//! operator result type comes from [`DataType::apply_binary_operator`] or
//! [`DataType::apply_unary_operator`], the same tables [`TypedValue`] uses.
//!
//! [`TypedValue`]: crate::memory::value::TypedValue

use crate::ast::{BinOp, Expr, UnOp};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{RuntimeError, TypeError};
use crate::memory::frame::{Callable, Frame};
use crate::memory::literal_text;
use crate::memory::value::classify_literal;
use crate::types::DataType;

impl Interpreter {
    /// Infer the type of an expression without evaluating it
    pub(crate) fn infer_type(
        &self,
        expr: &Expr,
        frame: &Frame<'_>,
    ) -> Result<DataType, RuntimeError> {
        match expr {
            Expr::Number(value) => Ok(classify_literal(*value)),

            // The literal's storage, terminator included
            Expr::StringLiteral(text) => {
                Ok(DataType::Char.array_of(&[literal_text(text).chars().count() + 1]))
            }

            Expr::Variable(name) => frame.binding_type(name),

            Expr::Binary { op, left, right } => {
                if op.is_logical() {
                    return Ok(DataType::Int);
                }
                let left = self.infer_type(left, frame)?;
                let right = self.infer_type(right, frame)?;
                left.apply_binary_operator(*op, &right)
                    .ok_or_else(|| invalid_operands(*op, &left, &right))
            }

            Expr::Unary { op, operand } => {
                let operand = self.infer_type(operand, frame)?;
                operand.apply_unary_operator(*op).ok_or_else(|| match op {
                    UnOp::Deref => TypeError::NotDereferenceable {
                        ty: operand.to_string(),
                    }
                    .into(),
                    _ => TypeError::InvalidUnaryOperand {
                        op: op.symbol().to_string(),
                        operand: operand.to_string(),
                    }
                    .into(),
                })
            }

            Expr::Assign { target, .. } => self.infer_type(target, frame),

            // Simplified: the branch types are not unified
            Expr::Ternary { then_expr, .. } => self.infer_type(then_expr, frame),

            Expr::Call { name, .. } => match frame.lookup_function(name)? {
                Callable::User(def) => Ok(def.return_type.clone()),
                Callable::Builtin(builtin) => Ok(builtin.return_type()),
            },

            Expr::Index { array, index } => {
                let array = self.infer_type(array, frame)?;
                let index = self.infer_type(index, frame)?;
                let pointer = array
                    .apply_binary_operator(BinOp::Add, &index)
                    .ok_or_else(|| invalid_operands(BinOp::Add, &array, &index))?;
                pointer.dereference()
            }

            Expr::Member { object, field } => {
                let object = self.infer_type(object, frame)?;
                field_type(&object, field)
            }

            Expr::PointerMember { object, field } => {
                let pointer = self.infer_type(object, frame)?;
                field_type(&pointer.dereference()?, field)
            }

            Expr::Cast { target_type, .. } => Ok(target_type.clone()),

            Expr::SizeofType(_) | Expr::SizeofExpr(_) => Ok(DataType::Int),
        }
    }
}

fn invalid_operands(op: BinOp, left: &DataType, right: &DataType) -> RuntimeError {
    TypeError::InvalidOperands {
        op: op.symbol().to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
    .into()
}

fn field_type(object: &DataType, field: &str) -> Result<DataType, RuntimeError> {
    match object {
        DataType::Struct(st) => Ok(st.field(field)?.field_type.clone()),
        other => Err(TypeError::NotAStruct {
            ty: other.to_string(),
        }
        .into()),
    }
}
