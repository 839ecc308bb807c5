//! Loop statement execution (`while`, `do-while`, `for`).
//!
//! Adds `impl Interpreter` methods for the three loop forms supported by the
//! C subset. `break` and `continue` are propagated via `LoopBodyResult` so
//! the loop driver can react without inspecting the [`Flow`] itself.
//!
//! Every loop statement counts its own iterations and aborts the run with
//! `RunawayLoop` once the configured ceiling is exceeded.

use crate::ast::{Expr, Stmt};
use crate::interpreter::engine::{Flow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::memory::frame::Frame;

/// Result returned by [`Interpreter::execute_loop_body`] to signal how the body ended.
pub(crate) enum LoopBodyResult {
    /// Body completed normally or via `continue`, so the loop should iterate again.
    Continue,
    /// `break` was encountered and the loop should exit cleanly.
    Break,
    /// `return` was executed; the loop unwinds and hands the flow to its caller.
    Exit(Flow),
}

impl Interpreter {
    /// Executes all statements in `body` inside a fresh scope.
    pub(crate) fn execute_loop_body(
        &mut self,
        body: &[Stmt],
        frame: &mut Frame<'_>,
    ) -> Result<LoopBodyResult, RuntimeError> {
        Ok(match self.execute_block(body, frame)? {
            Flow::Normal | Flow::Continue => LoopBodyResult::Continue,
            Flow::Break => LoopBodyResult::Break,
            flow => LoopBodyResult::Exit(flow),
        })
    }

    /// Executes a `while (condition) { body }` loop.
    pub(crate) fn execute_while(
        &mut self,
        condition: &Expr,
        body: &[Stmt],
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        let mut iterations = 0;
        while self.condition(condition, frame)? {
            self.context.tick_loop(iterations)?;
            iterations += 1;

            match self.execute_loop_body(body, frame)? {
                LoopBodyResult::Continue => {}
                LoopBodyResult::Break => break,
                LoopBodyResult::Exit(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Executes a `do { body } while (condition)` loop.
    ///
    /// The body always runs at least once; the condition is checked after each
    /// iteration.
    pub(crate) fn execute_do_while(
        &mut self,
        body: &[Stmt],
        condition: &Expr,
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        let mut iterations = 0;
        loop {
            self.context.tick_loop(iterations)?;
            iterations += 1;

            match self.execute_loop_body(body, frame)? {
                LoopBodyResult::Continue => {}
                LoopBodyResult::Break => break,
                LoopBodyResult::Exit(flow) => return Ok(flow),
            }

            if !self.condition(condition, frame)? {
                break;
            }
        }
        Ok(Flow::Normal)
    }

    /// Executes a `for (init; condition; increment) { body }` loop.
    ///
    /// `init`, `condition`, and `increment` are all optional, matching C semantics.
    /// A missing condition is treated as always-true. The initializer and loop
    /// variable share a single scope that is closed when the loop ends.
    pub(crate) fn execute_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &[Stmt],
        frame: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        let (flow, top) = {
            let mut scope = frame.extend();
            let flow = self.run_for(init, condition, increment, body, &mut scope);
            (flow, scope.close())
        };
        frame.reclaim(top);
        flow
    }

    fn run_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &[Stmt],
        scope: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        if let Some(init) = init {
            self.execute(init, scope)?;
        }

        let mut iterations = 0;
        loop {
            if let Some(condition) = condition {
                if !self.condition(condition, scope)? {
                    break;
                }
            }

            self.context.tick_loop(iterations)?;
            iterations += 1;

            match self.execute_loop_body(body, scope)? {
                LoopBodyResult::Continue => {}
                LoopBodyResult::Break => break,
                LoopBodyResult::Exit(flow) => return Ok(flow),
            }

            if let Some(increment) = increment {
                self.evaluate(increment, scope)?;
            }
        }
        Ok(Flow::Normal)
    }
}
