//! Statement execution implementation
//!
//! This module handles the execution of all statement types, including:
//!
//! - Variable declarations and initializations
//! - Blocks, which open a nested scope
//! - `if`/`else`
//! - `return`, `break`, and `continue`, reported to the caller as a [`Flow`]
//!
//! Loops live in [`super::loops`].
//!
//! # Scopes
//!
//! A block runs in a child [`Frame`]. When the block ends, the child is closed and
//! the enclosing frame continues from the stack cursor the child hands back.

use crate::ast::{AssignOp, Expr, Stmt};
use crate::interpreter::engine::{Flow, Interpreter};
use crate::interpreter::errors::{RuntimeError, TypeError};
use crate::memory::frame::Frame;
use crate::memory::{encode_chars, literal_text};
use crate::types::DataType;
use tracing::trace;

impl Interpreter {
    /// Execute one statement in `frame`
    pub fn execute(&mut self, stmt: &Stmt, frame: &mut Frame<'_>) -> Result<Flow, RuntimeError> {
        self.context.set_line(stmt.location().line);

        match stmt {
            Stmt::Declare {
                name,
                var_type,
                init,
                ..
            } => {
                self.execute_declaration(name, var_type, init.as_ref(), frame)?;
                Ok(Flow::Normal)
            }

            Stmt::Expression { expr, .. } => {
                self.evaluate(expr, frame)?;
                Ok(Flow::Normal)
            }

            Stmt::Block { body, .. } => self.execute_block(body, frame),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.condition(condition, frame)? {
                    self.execute_block(then_branch, frame)
                } else if let Some(else_branch) = else_branch {
                    self.execute_block(else_branch, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => self.execute_while(condition, body, frame),

            Stmt::DoWhile {
                body, condition, ..
            } => self.execute_do_while(body, condition, frame),

            Stmt::For {
                init,
                condition,
                increment,
                body,
                ..
            } => self.execute_for(
                init.as_deref(),
                condition.as_ref(),
                increment.as_ref(),
                body,
                frame,
            ),

            Stmt::Return { expr, .. } => {
                let value = match expr {
                    Some(expr) => Some(self.evaluate(expr, frame)?.into_rvalue()),
                    None => None,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
        }
    }

    /// Execute statements in `frame` until one does not finish normally
    pub(crate) fn execute_statements(
        &mut self,
        body: &[Stmt],
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in body {
            let flow = self.execute(stmt, frame)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Execute `body` in a new scope nested in `frame`
    pub(crate) fn execute_block(
        &mut self,
        body: &[Stmt],
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        let (flow, top) = {
            let mut scope = frame.extend();
            let flow = self.execute_statements(body, &mut scope);
            (flow, scope.close())
        };
        frame.reclaim(top);
        flow
    }

    /// Evaluate a controlling expression to a truth value
    pub(crate) fn condition(
        &mut self,
        expr: &Expr,
        frame: &mut Frame<'_>,
    ) -> Result<bool, RuntimeError> {
        let value = self.evaluate(expr, frame)?;
        if !value.data_type().is_scalar() {
            return Err(TypeError::IllegalCast {
                from: value.data_type().to_string(),
                to: DataType::Int.to_string(),
                explicit: false,
            }
            .into());
        }
        Ok(value.is_truthy())
    }

    pub(crate) fn execute_declaration(
        &mut self,
        name: &str,
        var_type: &DataType,
        init: Option<&Expr>,
        frame: &mut Frame<'_>,
    ) -> Result<(), RuntimeError> {
        // `char buf[N] = "text"` copies the characters into the array
        if let (DataType::Array(elem, dims), Some(Expr::StringLiteral(text))) = (var_type, init) {
            if matches!(**elem, DataType::Char) && dims.len() == 1 {
                let slot = frame.declare_variable(name, var_type.clone())?;
                let mut bytes = encode_chars(literal_text(text));
                bytes.push(0);
                if bytes.len() - 1 > dims[0] {
                    return Err(TypeError::IllegalCast {
                        from: DataType::Char.array_of(&[bytes.len()]).to_string(),
                        to: var_type.to_string(),
                        explicit: false,
                    }
                    .into());
                }
                // The terminator is dropped when the text fills the array exactly
                bytes.truncate(dims[0]);
                if let Some(address) = slot.address() {
                    frame.memory_mut().write_bytes(address, &bytes)?;
                }
                trace!("initialized {} from string literal", name);
                return Ok(());
            }
        }

        // The initializer cannot see the name it initializes
        let value = match init {
            Some(expr) => Some(self.evaluate(expr, frame)?),
            None => None,
        };

        let slot = frame.declare_variable(name, var_type.clone())?;
        if let Some(value) = value {
            slot.assign(frame, &value, AssignOp::Assign)?;
        }
        Ok(())
    }
}
