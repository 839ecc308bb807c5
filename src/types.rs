//! C data types and the rules that govern them
//!
//! [`DataType`] is a closed enum over every type the interpreter understands. All
//! behavior that depends on the type (size, operator applicability, cast legality)
//! lives here as exhaustive matches so that the decision tables stay in one place.
//!
//! # Type Sizes
//!
//! Sizes are fixed and platform independent:
//! - `int`, `float`, pointers: 4 bytes
//! - `char`, `void`: 1 byte
//! - `function`: incomplete, never a storage type
//! - arrays: product of dimensions times element size
//! - structs: sum of field sizes (no padding)
//!
//! # Equality
//!
//! Two types are equal exactly when they are spelled the same (`"int*"`,
//! `"int[3][4]"`, `"struct Point"`). Structs compare by tag only.

use crate::ast::{BinOp, UnOp};
use crate::interpreter::errors::{RuntimeError, TypeError};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// A C type
#[derive(Debug, Clone)]
pub enum DataType {
    Int,
    Float,
    Char,
    Void,
    Function,
    Pointer(Box<DataType>),
    /// Element type (never itself an array) and dimensions, outermost first
    Array(Box<DataType>, Vec<usize>),
    Struct(Rc<StructType>),
}

/// Struct field with its byte offset from the start of the struct
#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub field_type: DataType,
    pub offset: u32,
}

/// A tagged struct type.
///
/// The tag exists before the field list so that fields may point back at the
/// struct being defined (`struct Node { struct Node *next; }`).
pub struct StructType {
    tag: String,
    fields: OnceCell<Vec<StructField>>,
}

impl StructType {
    /// Declare a struct tag whose fields are not known yet
    pub fn declare(tag: &str) -> Rc<Self> {
        Rc::new(StructType {
            tag: tag.to_string(),
            fields: OnceCell::new(),
        })
    }

    /// Declare and define a struct in one step
    pub fn new(tag: &str, fields: Vec<(String, DataType)>) -> Result<Rc<Self>, RuntimeError> {
        let st = Self::declare(tag);
        st.define(fields)?;
        Ok(st)
    }

    /// Lay out the fields sequentially. A struct can only be defined once.
    pub fn define(&self, fields: Vec<(String, DataType)>) -> Result<(), RuntimeError> {
        let mut offset = 0u32;
        let mut laid_out = Vec::with_capacity(fields.len());
        for (name, field_type) in fields {
            if laid_out.iter().any(|f: &StructField| f.name == name) {
                return Err(TypeError::Redefinition { name }.into());
            }
            let size = field_type.size()?;
            let end = offset.checked_add(size).ok_or_else(|| TypeError::TooLarge {
                ty: format!("struct {}", self.tag),
            })?;
            laid_out.push(StructField {
                name,
                field_type,
                offset,
            });
            offset = end;
        }
        self.fields.set(laid_out).map_err(|_| {
            RuntimeError::from(TypeError::Redefinition {
                name: format!("struct {}", self.tag),
            })
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_complete(&self) -> bool {
        self.fields.get().is_some()
    }

    pub fn fields(&self) -> &[StructField] {
        self.fields.get().map(|f| f.as_slice()).unwrap_or(&[])
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Result<&StructField, RuntimeError> {
        let fields = self.fields.get().ok_or_else(|| TypeError::IncompleteType {
            ty: format!("struct {}", self.tag),
        })?;
        fields.iter().find(|f| f.name == name).ok_or_else(|| {
            TypeError::MissingField {
                struct_name: format!("struct {}", self.tag),
                field: name.to_string(),
            }
            .into()
        })
    }

    pub fn size(&self) -> Result<u32, RuntimeError> {
        let fields = self.fields.get().ok_or_else(|| TypeError::IncompleteType {
            ty: format!("struct {}", self.tag),
        })?;
        fields.iter().try_fold(0u32, |total, f| {
            total
                .checked_add(f.field_type.size()?)
                .ok_or_else(|| {
                    RuntimeError::from(TypeError::TooLarge {
                        ty: format!("struct {}", self.tag),
                    })
                })
        })
    }
}

// Field types may refer back to this struct, so only names are printed
impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields().iter().map(|f| f.name.as_str()).collect();
        f.debug_struct("StructType")
            .field("tag", &self.tag)
            .field("fields", &names)
            .finish()
    }
}

impl DataType {
    /// Pointer to this type
    pub fn pointer_to(self) -> DataType {
        DataType::Pointer(Box::new(self))
    }

    /// Array of this type. Nested arrays are flattened into one dimension list.
    pub fn array_of(self, dims: &[usize]) -> DataType {
        match self {
            DataType::Array(elem, inner) => {
                let mut all = dims.to_vec();
                all.extend(inner);
                DataType::Array(elem, all)
            }
            other => DataType::Array(Box::new(other), dims.to_vec()),
        }
    }

    pub fn void_pointer() -> DataType {
        DataType::Void.pointer_to()
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float | DataType::Char)
    }

    pub fn is_whole_number(&self) -> bool {
        matches!(self, DataType::Int | DataType::Char)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, DataType::Array(..))
    }

    /// Pointers and arrays share arithmetic and dereference rules
    pub fn is_pointer_like(&self) -> bool {
        self.is_pointer() || self.is_array()
    }

    pub fn is_void_pointer(&self) -> bool {
        matches!(self, DataType::Pointer(inner) if matches!(**inner, DataType::Void))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, DataType::Struct(_))
    }

    /// Types whose values can be tested for truth
    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer_like()
    }

    /// Size in bytes. Fails for incomplete types.
    pub fn size(&self) -> Result<u32, RuntimeError> {
        match self {
            DataType::Int | DataType::Float | DataType::Pointer(_) => Ok(4),
            DataType::Char | DataType::Void => Ok(1),
            DataType::Function => Err(TypeError::IncompleteType {
                ty: self.to_string(),
            }
            .into()),
            DataType::Array(elem, dims) => dims.iter().try_fold(elem.size()?, |size, &dim| {
                u32::try_from(dim)
                    .ok()
                    .and_then(|dim| size.checked_mul(dim))
                    .ok_or_else(|| {
                        RuntimeError::from(TypeError::TooLarge {
                            ty: self.to_string(),
                        })
                    })
            }),
            DataType::Struct(st) => st.size(),
        }
    }

    /// Size of one element, used for stack slot alignment
    pub fn element_size(&self) -> Result<u32, RuntimeError> {
        match self {
            DataType::Array(elem, _) => elem.size(),
            _ => self.size(),
        }
    }

    /// Type obtained by dereferencing: the pointee, or the array with its
    /// outermost dimension peeled off
    pub fn dereference(&self) -> Result<DataType, RuntimeError> {
        match self {
            DataType::Pointer(inner) => Ok((**inner).clone()),
            DataType::Array(elem, dims) if dims.len() > 1 => {
                Ok(DataType::Array(elem.clone(), dims[1..].to_vec()))
            }
            DataType::Array(elem, _) => Ok((**elem).clone()),
            _ => Err(TypeError::NotDereferenceable {
                ty: self.to_string(),
            }
            .into()),
        }
    }

    /// Array-to-pointer decay; every other type is returned unchanged
    pub fn decay(&self) -> DataType {
        match self {
            DataType::Array(elem, dims) if dims.len() > 1 => {
                DataType::Array(elem.clone(), dims[1..].to_vec()).pointer_to()
            }
            DataType::Array(elem, _) => (**elem).clone().pointer_to(),
            other => other.clone(),
        }
    }

    pub fn can_implicit_cast_to(&self, target: &DataType) -> bool {
        match self {
            DataType::Int | DataType::Char => {
                matches!(target, DataType::Int | DataType::Char | DataType::Float)
            }
            DataType::Float => matches!(target, DataType::Float),
            DataType::Pointer(_) => {
                target.is_pointer()
                    && (self == target || self.is_void_pointer() || target.is_void_pointer())
            }
            DataType::Array(..) => self.decay().can_implicit_cast_to(target),
            DataType::Struct(_) => self == target,
            DataType::Void | DataType::Function => false,
        }
    }

    pub fn can_explicit_cast_to(&self, target: &DataType) -> bool {
        if self.can_implicit_cast_to(target) {
            return true;
        }
        match self {
            DataType::Int | DataType::Char => target.is_pointer(),
            DataType::Float => matches!(target, DataType::Int | DataType::Char),
            DataType::Pointer(_) => target.is_pointer() || matches!(target, DataType::Int),
            DataType::Array(..) => self.decay().can_explicit_cast_to(target),
            DataType::Struct(_) | DataType::Void | DataType::Function => false,
        }
    }

    /// Result type of `self op right`, or `None` if the operator does not apply
    pub fn apply_binary_operator(&self, op: BinOp, right: &DataType) -> Option<DataType> {
        if self.is_arithmetic() {
            if !right.is_arithmetic() {
                // Pointer and array operands get first refusal
                return if op.is_commutative() {
                    right.apply_binary_operator(op, self)
                } else {
                    None
                };
            }
            if op.is_relational() || op.is_logical() {
                return Some(DataType::Int);
            }
            if matches!(self, DataType::Float) || matches!(right, DataType::Float) {
                return match op {
                    BinOp::Mod => None,
                    _ if op.is_bitwise() => None,
                    _ => Some(DataType::Float),
                };
            }
            return Some(DataType::Int);
        }

        match self {
            DataType::Pointer(_) | DataType::Array(..) => self.pointer_operator(op, right),
            _ => None,
        }
    }

    fn pointer_operator(&self, op: BinOp, right: &DataType) -> Option<DataType> {
        let this = self.decay();
        match op {
            BinOp::Add => right.is_whole_number().then_some(this),
            BinOp::Sub => {
                if right.is_whole_number() {
                    Some(this)
                } else if right.is_pointer_like() && right.decay() == this {
                    Some(DataType::Int)
                } else {
                    None
                }
            }
            _ if op.is_relational() => {
                if right.is_pointer_like() {
                    let other = right.decay();
                    (other == this || other.is_void_pointer() || this.is_void_pointer())
                        .then_some(DataType::Int)
                } else {
                    // Comparison against a null pointer constant
                    (matches!(op, BinOp::Eq | BinOp::Ne) && right.is_whole_number())
                        .then_some(DataType::Int)
                }
            }
            BinOp::And | BinOp::Or => right.is_scalar().then_some(DataType::Int),
            _ => None,
        }
    }

    /// Result type of `op self`, or `None` if the operator does not apply
    pub fn apply_unary_operator(&self, op: UnOp) -> Option<DataType> {
        match self {
            DataType::Int | DataType::Char | DataType::Float => match op {
                UnOp::Neg | UnOp::Plus => Some(if matches!(self, DataType::Float) {
                    DataType::Float
                } else {
                    DataType::Int
                }),
                UnOp::Not => Some(DataType::Int),
                UnOp::BitNot => self.is_whole_number().then_some(DataType::Int),
                UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                    Some(self.clone())
                }
                UnOp::Deref => None,
                UnOp::AddrOf => Some(self.clone().pointer_to()),
            },
            DataType::Pointer(inner) => match op {
                UnOp::Not => Some(DataType::Int),
                UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                    Some(self.clone())
                }
                UnOp::Deref => match **inner {
                    DataType::Void | DataType::Function => None,
                    _ => Some((**inner).clone()),
                },
                UnOp::AddrOf => Some(self.clone().pointer_to()),
                _ => None,
            },
            DataType::Array(..) => match op {
                UnOp::Not => Some(DataType::Int),
                UnOp::Deref => self.dereference().ok(),
                UnOp::AddrOf => Some(self.clone().pointer_to()),
                _ => None,
            },
            DataType::Struct(_) => match op {
                UnOp::AddrOf => Some(self.clone().pointer_to()),
                _ => None,
            },
            DataType::Void | DataType::Function => None,
        }
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        // Structural comparison; coincides with comparing the spelled types
        match (self, other) {
            (DataType::Int, DataType::Int)
            | (DataType::Float, DataType::Float)
            | (DataType::Char, DataType::Char)
            | (DataType::Void, DataType::Void)
            | (DataType::Function, DataType::Function) => true,
            (DataType::Pointer(a), DataType::Pointer(b)) => a == b,
            (DataType::Array(a, da), DataType::Array(b, db)) => a == b && da == db,
            (DataType::Struct(a), DataType::Struct(b)) => a.tag == b.tag,
            _ => false,
        }
    }
}

impl Eq for DataType {}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => f.write_str("int"),
            DataType::Float => f.write_str("float"),
            DataType::Char => f.write_str("char"),
            DataType::Void => f.write_str("void"),
            DataType::Function => f.write_str("function"),
            DataType::Pointer(inner) => write!(f, "{}*", inner),
            DataType::Array(elem, dims) => {
                write!(f, "{}", elem)?;
                for dim in dims {
                    write!(f, "[{}]", dim)?;
                }
                Ok(())
            }
            DataType::Struct(st) => write!(f, "struct {}", st.tag),
        }
    }
}
