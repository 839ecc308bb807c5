//! Common test utilities: program builders, runners, and result matching

#![allow(dead_code)]

use cimage::ast::{Expr, FunctionDef, Item, Param, Program, SourceLocation, Stmt};
use cimage::interpreter::engine::{ExecutionConfig, Interpreter};
use cimage::types::DataType;
use std::sync::Once;

static LOGGING: Once = Once::new();

/// Install a test subscriber filtered by `CIMAGE_LOG` (default `warn`)
pub fn init_logging() {
    LOGGING.call_once(|| {
        let level = std::env::var("CIMAGE_LOG").unwrap_or_else(|_| "warn".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(level))
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug)]
pub enum TestResult {
    Success { status: i32, output: String },
    Error(String),
    ErrorRegex(String),
}

impl TestResult {
    pub fn ok(status: i32, output: &str) -> Self {
        TestResult::Success {
            status,
            output: output.to_string(),
        }
    }

    pub fn error(pattern: &str) -> Self {
        TestResult::ErrorRegex(pattern.to_string())
    }
}

impl PartialEq for TestResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                TestResult::Success { status, output },
                TestResult::Success {
                    status: s,
                    output: o,
                },
            ) => status == s && output == o,
            (TestResult::Error(a), TestResult::Error(b)) => a == b,
            (TestResult::ErrorRegex(pattern), TestResult::Error(msg))
            | (TestResult::Error(msg), TestResult::ErrorRegex(pattern)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            _ => false,
        }
    }
}

pub fn run_program(program: Program) -> TestResult {
    run_with_config(program, ExecutionConfig::default())
}

pub fn run_with_config(program: Program, config: ExecutionConfig) -> TestResult {
    init_logging();
    let mut interpreter = Interpreter::new(program, config);
    match interpreter.run() {
        Ok(outcome) => TestResult::Success {
            status: outcome.exit_status,
            output: outcome.output,
        },
        Err(e) => TestResult::Error(e.to_string()),
    }
}

// Tree builders. Statements made here carry line 0 unless built with `on_line`.

pub fn program(items: Vec<Item>) -> Program {
    Program { items }
}

pub fn main_fn(body: Vec<Stmt>) -> Item {
    function("main", DataType::Int, vec![], body)
}

pub fn function(name: &str, return_type: DataType, params: Vec<Param>, body: Vec<Stmt>) -> Item {
    Item::Function(FunctionDef {
        name: name.to_string(),
        return_type,
        params,
        body: Some(body),
        location: SourceLocation::default(),
    })
}

pub fn prototype(name: &str, return_type: DataType, params: Vec<Param>) -> Item {
    Item::Function(FunctionDef {
        name: name.to_string(),
        return_type,
        params,
        body: None,
        location: SourceLocation::default(),
    })
}

pub fn global(name: &str, var_type: DataType, init: Option<Expr>) -> Item {
    Item::Global(decl(name, var_type, init))
}

pub fn decl(name: &str, var_type: DataType, init: Option<Expr>) -> Stmt {
    Stmt::Declare {
        name: name.to_string(),
        var_type,
        init,
        location: SourceLocation::default(),
    }
}

pub fn expr(expr: Expr) -> Stmt {
    Stmt::Expression {
        expr,
        location: SourceLocation::default(),
    }
}

/// Expression statement reported at `line`
pub fn on_line(line: usize, expr: Expr) -> Stmt {
    Stmt::Expression {
        expr,
        location: SourceLocation::new(line, 1),
    }
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::Return {
        expr: Some(expr),
        location: SourceLocation::default(),
    }
}

pub fn ret_void() -> Stmt {
    Stmt::Return {
        expr: None,
        location: SourceLocation::default(),
    }
}

pub fn block(body: Vec<Stmt>) -> Stmt {
    Stmt::Block {
        body,
        location: SourceLocation::default(),
    }
}

pub fn if_else(condition: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        condition,
        then_branch,
        else_branch,
        location: SourceLocation::default(),
    }
}

pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        condition,
        body,
        location: SourceLocation::default(),
    }
}

pub fn do_while(body: Vec<Stmt>, condition: Expr) -> Stmt {
    Stmt::DoWhile {
        body,
        condition,
        location: SourceLocation::default(),
    }
}

pub fn for_loop(init: Option<Stmt>, condition: Option<Expr>, increment: Option<Expr>, body: Vec<Stmt>) -> Stmt {
    Stmt::For {
        init: init.map(Box::new),
        condition,
        increment,
        body,
        location: SourceLocation::default(),
    }
}

pub fn brk() -> Stmt {
    Stmt::Break {
        location: SourceLocation::default(),
    }
}

pub fn cont() -> Stmt {
    Stmt::Continue {
        location: SourceLocation::default(),
    }
}

pub fn printf(format: &str, args: Vec<Expr>) -> Stmt {
    let mut all = vec![Expr::string(format)];
    all.extend(args);
    expr(Expr::call("printf", all))
}

pub fn num(value: f64) -> Expr {
    Expr::number(value)
}

pub fn var(name: &str) -> Expr {
    Expr::var(name)
}
