//! Runtime error types for the C interpreter
//!
//! This module defines [`RuntimeError`], which represents all errors that can occur
//! during program execution. Each failure category is its own enum so callers can
//! match on the condition rather than on a message:
//!
//! - [`TypeError`]: illegal casts, operators, redefinitions, unknown symbols
//! - [`ArithmeticError`]: division or modulo by zero
//! - [`MemoryError`]: bounds, read-only protection, allocator failures
//! - [`ResourceError`]: runaway loops and runaway recursion
//! - [`RuntimeError::Exit`]: an explicit `exit(status)` request
//!
//! All runtime errors are fatal - they unwind to the driver, which wraps them in an
//! [`ExecutionError`] annotated with the source line being executed.

use std::fmt;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    Type(TypeError),
    Arithmetic(ArithmeticError),
    Memory(MemoryError),
    ResourceExceeded(ResourceError),
    /// Explicit termination request. Status 0 is a normal end of the program.
    Exit { status: i32 },
}

/// Illegal type, operator, or symbol usage
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    IllegalCast {
        from: String,
        to: String,
        explicit: bool,
    },
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },
    InvalidUnaryOperand {
        op: String,
        operand: String,
    },
    NotAnLvalue {
        operation: String,
    },
    NotDereferenceable {
        ty: String,
    },
    /// Values of this type cannot be written to memory as a unit
    NotStorable {
        ty: String,
    },
    IncompleteType {
        ty: String,
    },
    /// The size of the type does not fit the 32-bit address space
    TooLarge {
        ty: String,
    },
    Redefinition {
        name: String,
    },
    ConflictingSignature {
        name: String,
        existing: String,
        new: String,
    },
    UndeclaredSymbol {
        name: String,
    },
    UndefinedFunction {
        name: String,
    },
    NotCallable {
        name: String,
    },
    /// A function name was used where a value is required
    NotAValue {
        name: String,
    },
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },
    ArgumentType {
        function: String,
        index: usize,
        expected: String,
        got: String,
    },
    MissingField {
        struct_name: String,
        field: String,
    },
    NotAStruct {
        ty: String,
    },
    InvalidFormat {
        function: String,
        message: String,
    },
}

/// Division or modulo by a zero right operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    DivisionByZero,
    ModuloByZero,
}

/// Failures of the simulated memory image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    OutOfBounds { address: i64, size: u32 },
    NullDereference,
    ReadOnlyWrite { address: u32 },
    OutOfMemory { requested: u32 },
    ReadOnlyExhausted { requested: u32, available: u32 },
    StackOverflow { requested: u32, available: u32 },
    /// Address is not a live allocation (never allocated, or already freed)
    InvalidFree { address: u32 },
    InvalidAllocationSize { size: i64 },
    UnterminatedString { address: u32 },
    /// A boundary tag no longer describes a valid block
    HeapCorrupted { address: u32 },
    /// Region sizes that cannot form a memory image
    InvalidLayout { reason: String },
}

/// Execution budget exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    RunawayLoop { limit: u64 },
    CallDepth { limit: usize },
}

impl RuntimeError {
    /// Check whether this is a successful `exit(0)` rather than a failure
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, RuntimeError::Exit { status: 0 })
    }
}

impl From<TypeError> for RuntimeError {
    fn from(e: TypeError) -> Self {
        RuntimeError::Type(e)
    }
}

impl From<ArithmeticError> for RuntimeError {
    fn from(e: ArithmeticError) -> Self {
        RuntimeError::Arithmetic(e)
    }
}

impl From<MemoryError> for RuntimeError {
    fn from(e: MemoryError) -> Self {
        RuntimeError::Memory(e)
    }
}

impl From<ResourceError> for RuntimeError {
    fn from(e: ResourceError) -> Self {
        RuntimeError::ResourceExceeded(e)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Type(e) => write!(f, "Type error: {}", e),
            RuntimeError::Arithmetic(e) => write!(f, "Arithmetic error: {}", e),
            RuntimeError::Memory(e) => write!(f, "Memory error: {}", e),
            RuntimeError::ResourceExceeded(e) => write!(f, "Resource exceeded: {}", e),
            RuntimeError::Exit { status } => write!(f, "Program exited with status {}", status),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::IllegalCast { from, to, explicit } => {
                let kind = if *explicit { "explicitly" } else { "implicitly" };
                write!(f, "cannot {} cast '{}' to '{}'", kind, from, to)
            }
            TypeError::InvalidOperands { op, left, right } => {
                write!(
                    f,
                    "invalid operands to '{}' ('{}' and '{}')",
                    op, left, right
                )
            }
            TypeError::InvalidUnaryOperand { op, operand } => {
                write!(f, "invalid operand to unary '{}' ('{}')", op, operand)
            }
            TypeError::NotAnLvalue { operation } => {
                write!(f, "{} requires an lvalue", operation)
            }
            TypeError::NotDereferenceable { ty } => {
                write!(f, "cannot dereference a value of type '{}'", ty)
            }
            TypeError::NotStorable { ty } => {
                write!(f, "values of type '{}' cannot be stored directly", ty)
            }
            TypeError::IncompleteType { ty } => {
                write!(f, "type '{}' is incomplete", ty)
            }
            TypeError::TooLarge { ty } => write!(f, "type '{}' is too large", ty),
            TypeError::Redefinition { name } => write!(f, "redefinition of '{}'", name),
            TypeError::ConflictingSignature {
                name,
                existing,
                new,
            } => {
                write!(
                    f,
                    "conflicting types for '{}': '{}' vs '{}'",
                    name, existing, new
                )
            }
            TypeError::UndeclaredSymbol { name } => write!(f, "'{}' undeclared", name),
            TypeError::UndefinedFunction { name } => {
                write!(f, "function '{}' declared but never defined", name)
            }
            TypeError::NotCallable { name } => write!(f, "'{}' is not a function", name),
            TypeError::NotAValue { name } => {
                write!(f, "function '{}' used as a value", name)
            }
            TypeError::ArgumentCount {
                function,
                expected,
                got,
            } => {
                write!(
                    f,
                    "function '{}' expects {} argument{}, got {}",
                    function,
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                )
            }
            TypeError::ArgumentType {
                function,
                index,
                expected,
                got,
            } => {
                write!(
                    f,
                    "argument {} of '{}' expects '{}', got '{}'",
                    index + 1,
                    function,
                    expected,
                    got
                )
            }
            TypeError::MissingField { struct_name, field } => {
                write!(f, "'{}' has no field named '{}'", struct_name, field)
            }
            TypeError::NotAStruct { ty } => {
                write!(f, "member access on non-struct type '{}'", ty)
            }
            TypeError::InvalidFormat { function, message } => {
                write!(f, "{}: {}", function, message)
            }
        }
    }
}

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticError::DivisionByZero => write!(f, "division by zero"),
            ArithmeticError::ModuloByZero => write!(f, "modulo by zero"),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfBounds { address, size } => {
                write!(
                    f,
                    "access of {} byte{} at 0x{:x} is out of bounds",
                    size,
                    if *size == 1 { "" } else { "s" },
                    address
                )
            }
            MemoryError::NullDereference => write!(f, "null pointer dereference"),
            MemoryError::ReadOnlyWrite { address } => {
                write!(f, "write to read-only memory at 0x{:x}", address)
            }
            MemoryError::OutOfMemory { requested } => {
                write!(f, "out of heap memory: requested {} bytes", requested)
            }
            MemoryError::ReadOnlyExhausted {
                requested,
                available,
            } => {
                write!(
                    f,
                    "read-only region exhausted: requested {} bytes, {} available",
                    requested, available
                )
            }
            MemoryError::StackOverflow {
                requested,
                available,
            } => {
                write!(
                    f,
                    "stack overflow: requested {} bytes, {} available",
                    requested, available
                )
            }
            MemoryError::InvalidFree { address } => {
                write!(
                    f,
                    "invalid free: 0x{:x} is not a live allocation",
                    address
                )
            }
            MemoryError::InvalidAllocationSize { size } => {
                write!(f, "invalid allocation size: {} (must be positive)", size)
            }
            MemoryError::UnterminatedString { address } => {
                write!(f, "string at 0x{:x} is missing its terminator", address)
            }
            MemoryError::HeapCorrupted { address } => {
                write!(f, "heap corrupted: invalid block tag at 0x{:x}", address)
            }
            MemoryError::InvalidLayout { reason } => {
                write!(f, "invalid memory layout: {}", reason)
            }
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::RunawayLoop { limit } => {
                write!(f, "loop exceeded {} iterations", limit)
            }
            ResourceError::CallDepth { limit } => {
                write!(f, "call depth exceeded {} frames", limit)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// A runtime error annotated with where it happened
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    pub error: RuntimeError,
    pub line: usize,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.error, self.line)
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
