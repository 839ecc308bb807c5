//! Runtime value representation
//!
//! This module defines [`TypedValue`]: a number tagged with its [`DataType`] and,
//! when it names a storage location, the address it was read from.
//!
//! # Lvalues and Rvalues
//!
//! - `address == Some(a)`: an lvalue bound to byte `a` of the shared [`Memory`];
//!   it may be assigned, incremented, and have its address taken.
//! - `address == None`: an rvalue, the transient result of a computation.
//!
//! # Capping
//!
//! Every constructor and every arithmetic result wraps the number into the range
//! of its type (`int` and `char` two's complement, pointers unsigned 32-bit,
//! `float` single precision). Overflow is modeled, never reported.
//!
//! [`Memory`]: super::Memory

use super::frame::Frame;
use crate::ast::{AssignOp, BinOp, UnOp};
use crate::interpreter::errors::{ArithmeticError, RuntimeError, TypeError};
use crate::types::DataType;
use std::fmt;

/// A typed number, optionally bound to an address
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    value: f64,
    data_type: DataType,
    address: Option<u32>,
}

/// Wrap `value` into the representable range of `ty`. Whole-number types keep
/// the low bits of the truncated value, as two's complement storage would.
pub fn cap(value: f64, ty: &DataType) -> f64 {
    match ty {
        DataType::Int => wrap(value, 32, true),
        DataType::Char => wrap(value, 8, true),
        DataType::Pointer(_) | DataType::Array(..) | DataType::Struct(_) => wrap(value, 32, false),
        DataType::Float => value as f32 as f64,
        DataType::Void | DataType::Function => value,
    }
}

/// Reduce `value` modulo `2^bits`, recentred on zero when `signed`
fn wrap(value: f64, bits: i32, signed: bool) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let modulus = 2f64.powi(bits);
    let low = value.trunc().rem_euclid(modulus);
    if signed && low >= modulus / 2.0 {
        low - modulus
    } else {
        low
    }
}

/// Type of a bare numeric literal: fractional values are `float`, whole values
/// that fit a `char` are `char`, everything else is `int`
pub fn classify_literal(value: f64) -> DataType {
    if value.fract() != 0.0 {
        DataType::Float
    } else if (-128.0..=127.0).contains(&value) {
        DataType::Char
    } else {
        DataType::Int
    }
}

fn bool_value(b: bool) -> TypedValue {
    TypedValue::new(if b { 1.0 } else { 0.0 }, DataType::Int)
}

impl TypedValue {
    /// An rvalue of type `data_type`
    pub fn new(value: f64, data_type: DataType) -> Self {
        TypedValue {
            value: cap(value, &data_type),
            data_type,
            address: None,
        }
    }

    /// A value read from `address`
    pub fn lvalue(value: f64, data_type: DataType, address: u32) -> Self {
        TypedValue {
            value: cap(value, &data_type),
            data_type,
            address: Some(address),
        }
    }

    /// A numeric literal typed by [`classify_literal`]
    pub fn literal(value: f64) -> Self {
        Self::new(value, classify_literal(value))
    }

    pub fn void() -> Self {
        Self::new(0.0, DataType::Void)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn address(&self) -> Option<u32> {
        self.address
    }

    pub fn is_lvalue(&self) -> bool {
        self.address.is_some()
    }

    /// The value interpreted as an address
    pub fn to_address(&self) -> u32 {
        self.value as i64 as u32
    }

    pub fn to_int(&self) -> i32 {
        self.value as i64 as i32
    }

    pub fn is_truthy(&self) -> bool {
        self.value != 0.0
    }

    /// Drop the address binding
    pub fn into_rvalue(self) -> Self {
        TypedValue {
            address: None,
            ..self
        }
    }

    /// A zero of whole-number type that is not a variable may stand in for NULL
    pub fn is_null_pointer_constant(&self) -> bool {
        self.data_type.is_whole_number() && self.value == 0.0 && !self.is_lvalue()
    }

    /// Re-tag this value as `ty`, applying C conversion rules.
    ///
    /// `in_place` keeps the address so that the result still names the same
    /// storage; otherwise the result is an rvalue. No legality check is done here.
    pub fn cast_to_type(&self, ty: &DataType, in_place: bool) -> TypedValue {
        let address = if in_place { self.address } else { None };

        if self.data_type == *ty || (self.data_type.is_pointer_like() && ty.is_pointer()) {
            return TypedValue {
                value: cap(self.value, ty),
                data_type: ty.clone(),
                address,
            };
        }

        if matches!(self.data_type, DataType::Float) {
            let truncated = TypedValue {
                value: self.value.trunc(),
                data_type: DataType::Int,
                address: self.address,
            };
            return truncated.cast_to_type(ty, in_place);
        }

        let value = if matches!(ty, DataType::Char) {
            self.value.rem_euclid(256.0)
        } else {
            self.value
        };
        TypedValue {
            value: cap(value, ty),
            data_type: ty.clone(),
            address,
        }
    }

    /// Conversion allowed without a cast operator (assignment, arguments, return)
    pub fn implicit_cast(&self, ty: &DataType) -> Result<TypedValue, RuntimeError> {
        if self.data_type.can_implicit_cast_to(ty)
            || (ty.is_pointer() && self.is_null_pointer_constant())
        {
            Ok(self.cast_to_type(ty, false))
        } else {
            Err(TypeError::IllegalCast {
                from: self.data_type.to_string(),
                to: ty.to_string(),
                explicit: false,
            }
            .into())
        }
    }

    /// Conversion through a `(type)` cast operator
    pub fn explicit_cast(&self, ty: &DataType) -> Result<TypedValue, RuntimeError> {
        if self.data_type.can_explicit_cast_to(ty)
            || (ty.is_pointer() && self.is_null_pointer_constant())
        {
            Ok(self.cast_to_type(ty, false))
        } else {
            Err(TypeError::IllegalCast {
                from: self.data_type.to_string(),
                to: ty.to_string(),
                explicit: true,
            }
            .into())
        }
    }

    /// Unit of pointer arithmetic: the pointee size for pointers and arrays, else 1
    pub fn step(&self) -> Result<u32, RuntimeError> {
        if self.data_type.is_pointer_like() {
            self.data_type.dereference()?.size()
        } else {
            Ok(1)
        }
    }

    fn result_type(&self, op: BinOp, right: &TypedValue) -> Result<DataType, RuntimeError> {
        self.data_type
            .apply_binary_operator(op, &right.data_type)
            .ok_or_else(|| {
                TypeError::InvalidOperands {
                    op: op.symbol().to_string(),
                    left: self.data_type.to_string(),
                    right: right.data_type.to_string(),
                }
                .into()
            })
    }

    /// Combine two numbers of an arithmetic result type
    fn arithmetic(
        &self,
        right: &TypedValue,
        ty: DataType,
        int_op: fn(i64, i64) -> i64,
        float_op: fn(f64, f64) -> f64,
    ) -> TypedValue {
        let raw = if matches!(ty, DataType::Float) {
            float_op(self.value, right.value)
        } else {
            int_op(self.value as i64, right.value as i64) as f64
        };
        TypedValue::new(raw, ty)
    }

    pub fn plus(&self, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        let ty = self.result_type(BinOp::Add, right)?;
        if self.data_type.is_pointer_like() {
            let offset = right.value as i64 * self.step()? as i64;
            return Ok(TypedValue::new((self.value as i64 + offset) as f64, ty));
        }
        if right.data_type.is_pointer_like() {
            let offset = self.value as i64 * right.step()? as i64;
            return Ok(TypedValue::new((right.value as i64 + offset) as f64, ty));
        }
        Ok(self.arithmetic(right, ty, i64::wrapping_add, |a, b| a + b))
    }

    pub fn minus(&self, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        let ty = self.result_type(BinOp::Sub, right)?;
        if self.data_type.is_pointer_like() {
            let step = self.step()?.max(1) as i64;
            if right.data_type.is_pointer_like() {
                let distance = self.to_address() as i64 - right.to_address() as i64;
                return Ok(TypedValue::new((distance / step) as f64, ty));
            }
            let offset = right.value as i64 * step;
            return Ok(TypedValue::new((self.value as i64 - offset) as f64, ty));
        }
        Ok(self.arithmetic(right, ty, i64::wrapping_sub, |a, b| a - b))
    }

    pub fn multiply(&self, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        let ty = self.result_type(BinOp::Mul, right)?;
        Ok(self.arithmetic(right, ty, i64::wrapping_mul, |a, b| a * b))
    }

    pub fn divide_by(&self, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        if right.value == 0.0 {
            return Err(ArithmeticError::DivisionByZero.into());
        }
        let ty = self.result_type(BinOp::Div, right)?;
        Ok(self.arithmetic(right, ty, i64::wrapping_div, |a, b| a / b))
    }

    pub fn modulo(&self, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        if right.value == 0.0 {
            return Err(ArithmeticError::ModuloByZero.into());
        }
        let ty = self.result_type(BinOp::Mod, right)?;
        Ok(self.arithmetic(right, ty, i64::wrapping_rem, |a, b| a % b))
    }

    /// Relational operators; the result is an `int` 0 or 1
    pub fn compare(&self, op: BinOp, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        self.result_type(op, right)?;
        // A pointer only compares with a non-pointer that is a null pointer constant
        let other = match (
            self.data_type.is_pointer_like(),
            right.data_type.is_pointer_like(),
        ) {
            (true, false) => Some(right),
            (false, true) => Some(self),
            _ => None,
        };
        if other.is_some_and(|other| !other.is_null_pointer_constant()) {
            return Err(TypeError::InvalidOperands {
                op: op.symbol().to_string(),
                left: self.data_type.to_string(),
                right: right.data_type.to_string(),
            }
            .into());
        }
        let (a, b) = (self.value, right.value);
        let result = match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => {
                return Err(TypeError::InvalidOperands {
                    op: op.symbol().to_string(),
                    left: self.data_type.to_string(),
                    right: right.data_type.to_string(),
                }
                .into())
            }
        };
        Ok(bool_value(result))
    }

    /// `&&` and `||` on already evaluated operands
    pub fn logical(&self, op: BinOp, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        self.result_type(op, right)?;
        let result = match op {
            BinOp::And => self.is_truthy() && right.is_truthy(),
            _ => self.is_truthy() || right.is_truthy(),
        };
        Ok(bool_value(result))
    }

    pub fn bitwise(&self, op: BinOp, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        let ty = self.result_type(op, right)?;
        let (a, b) = (self.to_int(), right.to_int());
        let raw = match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            BinOp::BitShl => a.wrapping_shl(b as u32),
            _ => a.wrapping_shr(b as u32),
        };
        Ok(TypedValue::new(raw as f64, ty))
    }

    /// Apply any binary operator to two evaluated operands
    pub fn apply_binary(&self, op: BinOp, right: &TypedValue) -> Result<TypedValue, RuntimeError> {
        match op {
            BinOp::Add => self.plus(right),
            BinOp::Sub => self.minus(right),
            BinOp::Mul => self.multiply(right),
            BinOp::Div => self.divide_by(right),
            BinOp::Mod => self.modulo(right),
            _ if op.is_relational() => self.compare(op, right),
            _ if op.is_logical() => self.logical(op, right),
            _ => self.bitwise(op, right),
        }
    }

    fn invalid_unary(&self, op: UnOp) -> RuntimeError {
        TypeError::InvalidUnaryOperand {
            op: op.symbol().to_string(),
            operand: self.data_type.to_string(),
        }
        .into()
    }

    /// Apply a unary operator. Operators that touch memory go through `frame`.
    pub fn unary(&self, op: UnOp, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        match op {
            UnOp::Deref => self.dereference(frame),
            UnOp::AddrOf => self.address_of(),
            UnOp::PreInc => self.increment(frame, 1.0, true),
            UnOp::PreDec => self.increment(frame, -1.0, true),
            UnOp::PostInc => self.increment(frame, 1.0, false),
            UnOp::PostDec => self.increment(frame, -1.0, false),
            UnOp::Neg | UnOp::Plus | UnOp::Not | UnOp::BitNot => {
                let ty = self
                    .data_type
                    .apply_unary_operator(op)
                    .ok_or_else(|| self.invalid_unary(op))?;
                let raw = match op {
                    UnOp::Neg => -self.value,
                    UnOp::Plus => self.value,
                    UnOp::Not => {
                        if self.is_truthy() {
                            0.0
                        } else {
                            1.0
                        }
                    }
                    _ => !self.to_int() as f64,
                };
                Ok(TypedValue::new(raw, ty))
            }
        }
    }

    pub fn address_of(&self) -> Result<TypedValue, RuntimeError> {
        let address = self.address.ok_or_else(|| TypeError::NotAnLvalue {
            operation: "unary '&'".to_string(),
        })?;
        let ty = self
            .data_type
            .apply_unary_operator(UnOp::AddrOf)
            .ok_or_else(|| self.invalid_unary(UnOp::AddrOf))?;
        Ok(TypedValue::new(address as f64, ty))
    }

    /// Load the value this pointer (or array) refers to
    pub fn dereference(&self, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        let ty = self
            .data_type
            .apply_unary_operator(UnOp::Deref)
            .ok_or_else(|| TypeError::NotDereferenceable {
                ty: self.data_type.to_string(),
            })?;
        frame.memory().read(self.to_address(), &ty)
    }

    /// Field access on a struct value (`s.field`)
    pub fn member(&self, field: &str, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        let DataType::Struct(st) = &self.data_type else {
            return Err(TypeError::NotAStruct {
                ty: self.data_type.to_string(),
            }
            .into());
        };
        let field = st.field(field)?;
        let address = self.to_address().wrapping_add(field.offset);
        frame.memory().read(address, &field.field_type)
    }

    fn increment(
        &self,
        frame: &Frame<'_>,
        direction: f64,
        prefix: bool,
    ) -> Result<TypedValue, RuntimeError> {
        let op = match (direction > 0.0, prefix) {
            (true, true) => UnOp::PreInc,
            (true, false) => UnOp::PostInc,
            (false, true) => UnOp::PreDec,
            (false, false) => UnOp::PostDec,
        };
        let address = self.address.ok_or_else(|| TypeError::NotAnLvalue {
            operation: format!("'{}'", op.symbol()),
        })?;
        let ty = self
            .data_type
            .apply_unary_operator(op)
            .ok_or_else(|| self.invalid_unary(op))?;

        let updated = TypedValue::new(self.value + direction * self.step()? as f64, ty);
        frame.memory_mut().write_numeric(address, &updated)?;

        Ok(if prefix {
            updated
        } else {
            self.clone().into_rvalue()
        })
    }

    pub fn pre_increment(&self, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        self.increment(frame, 1.0, true)
    }

    pub fn pre_decrement(&self, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        self.increment(frame, -1.0, true)
    }

    pub fn post_increment(&self, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        self.increment(frame, 1.0, false)
    }

    pub fn post_decrement(&self, frame: &Frame<'_>) -> Result<TypedValue, RuntimeError> {
        self.increment(frame, -1.0, false)
    }

    /// Store `right` into this lvalue.
    ///
    /// Plain `=` yields the right operand as it was before conversion, while the
    /// compound forms yield the converted result. Both are rvalues.
    pub fn assign(
        &self,
        frame: &Frame<'_>,
        right: &TypedValue,
        op: AssignOp,
    ) -> Result<TypedValue, RuntimeError> {
        let address = self.address.ok_or_else(|| TypeError::NotAnLvalue {
            operation: format!("'{}'", op),
        })?;
        if !self.data_type.is_scalar() || self.data_type.is_array() {
            return Err(TypeError::NotStorable {
                ty: self.data_type.to_string(),
            }
            .into());
        }

        match op {
            AssignOp::Assign => {
                let converted = right.implicit_cast(&self.data_type)?;
                frame.memory_mut().write_numeric(address, &converted)?;
                Ok(right.clone().into_rvalue())
            }
            AssignOp::Compound(bin) => {
                let result = self.apply_binary(bin, right)?;
                if !result.data_type.can_explicit_cast_to(&self.data_type) {
                    return Err(TypeError::IllegalCast {
                        from: result.data_type.to_string(),
                        to: self.data_type.to_string(),
                        explicit: false,
                    }
                    .into());
                }
                let converted = result.cast_to_type(&self.data_type, false);
                frame.memory_mut().write_numeric(address, &converted)?;
                Ok(converted)
            }
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data_type {
            DataType::Float => write!(f, "{}", self.value),
            DataType::Pointer(_) | DataType::Array(..) | DataType::Struct(_) => {
                write!(f, "0x{:x}", self.to_address())
            }
            _ => write!(f, "{}", self.value as i64),
        }
    }
}
