//! C interpreter execution engine
//!
//! This module provides the core execution logic:
//! - [`engine`]: [`engine::Interpreter`], the run driver and function calls
//! - [`statements`], [`loops`]: statement execution
//! - [`expressions`]: expression evaluation
//! - [`type_system`]: static types for `sizeof(expr)`
//! - [`builtins`]: library functions bound in the root frame
//! - [`context`]: output, input, and execution budgets
//! - [`errors`]: runtime error types
//! - [`constants`]: default sizes and limits
//!
//! # Execution Model
//!
//! The interpreter walks the tree depth-first in program order. Every failure
//! unwinds to [`engine::Interpreter::run`], which reports it with the line that
//! was executing.

pub mod builtins;
pub mod constants;
pub mod context;
pub mod engine;
pub mod errors;
pub mod expressions;
pub mod loops;
pub mod statements;
pub mod type_system;
