//! # Introduction
//!
//! cimage executes a subset of C against a simulated process memory image: one
//! flat byte buffer split into read-only, heap, and stack regions, with C-accurate
//! typed values, pointer arithmetic, casting rules, and an explicit allocator.
//!
//! ## Execution pipeline
//!
//! ```text
//! Program tree → Interpreter → Frames → TypedValues → Memory
//! ```
//!
//! 1. [`ast`]: the executable tree. There is no parser in this crate; a front end
//!    (or a test) builds [`ast::Program`] values directly.
//! 2. [`interpreter`]: walks the tree, evaluates expressions, calls functions and
//!    builtins, and threads a [`interpreter::context::ProgramContext`] through.
//! 3. [`memory`]: the memory image with its boundary-tag heap
//!    ([`memory::Memory`]), typed values ([`memory::value::TypedValue`]), and the
//!    scope chain ([`memory::frame::Frame`]).
//! 4. [`types`]: the [`types::DataType`] hierarchy and its cast and operator tables.
//!
//! ## Supported C subset
//!
//! Types: `int`, `float`, `char`, `void`, structs, pointers, multi-dimensional
//! arrays.
//! Control flow: `if/else`, `while`, `for`, `do-while`, `break`, `continue`,
//! `return`.
//! Built-ins: `malloc`, `calloc`, `free`, `strcpy`, `strlen`, `strcmp`, `printf`,
//! `puts`, `putchar`, `scanf`, `exit`.

pub mod ast;
pub mod interpreter;
pub mod memory;
pub mod types;
