// Execution engine for the C interpreter

use crate::ast::{FunctionDef, Item, Param, Program, Stmt};
use crate::interpreter::builtins::Builtin;
use crate::interpreter::constants::{LOOP_LIMIT, MAX_CALL_DEPTH};
use crate::interpreter::context::ProgramContext;
use crate::interpreter::errors::{ExecutionError, RuntimeError, TypeError};
use crate::memory::frame::{Callable, Frame};
use crate::memory::value::TypedValue;
use crate::memory::{Memory, MemoryConfig};
use crate::types::DataType;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

/// Limits and memory layout for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub memory: MemoryConfig,
    /// Iterations a single loop statement may run
    pub loop_limit: u64,
    /// Maximum nesting of user function calls
    pub max_call_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            memory: MemoryConfig::default(),
            loop_limit: LOOP_LIMIT,
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

/// How a statement finished
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    /// `return`, with its value if one was given
    Return(Option<TypedValue>),
}

/// Result of a program that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// `main`'s return value, or 0 after `exit(0)`
    pub exit_status: i32,
    pub output: String,
}

/// The main interpreter that executes a C program
pub struct Interpreter {
    /// Function definitions and prototypes, in program order
    functions: Vec<Rc<FunctionDef>>,

    /// File-scope declarations, in program order
    globals: Rc<Vec<Stmt>>,

    config: ExecutionConfig,

    /// Text `scanf` reads from
    input: String,

    pub(crate) context: ProgramContext,
}

impl Interpreter {
    /// Create a new interpreter for `program`
    pub fn new(program: Program, config: ExecutionConfig) -> Self {
        let mut functions = Vec::new();
        let mut globals = Vec::new();

        for item in program.items {
            match item {
                Item::Function(def) => functions.push(Rc::new(def)),
                Item::Global(stmt) => globals.push(stmt),
            }
        }

        let context = ProgramContext::new(config.loop_limit, config.max_call_depth);
        Interpreter {
            functions,
            globals: Rc::new(globals),
            config,
            input: String::new(),
            context,
        }
    }

    /// Supply the text `scanf` will read
    pub fn with_input(mut self, input: &str) -> Self {
        self.input = input.to_string();
        self.context = self.fresh_context();
        self
    }

    fn fresh_context(&self) -> ProgramContext {
        ProgramContext::new(self.config.loop_limit, self.config.max_call_depth)
            .with_input(&self.input)
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn context(&self) -> &ProgramContext {
        &self.context
    }

    /// Everything printed so far, including by a run that failed
    pub fn output(&self) -> &str {
        self.context.output()
    }

    /// Run the program from `main` on a fresh memory image.
    ///
    /// `exit(0)` is a normal end; any other exit status or runtime failure is
    /// returned as an [`ExecutionError`] carrying the line being executed.
    pub fn run(&mut self) -> Result<Outcome, ExecutionError> {
        self.context = self.fresh_context();
        info!(
            "starting program: {} functions, {} globals",
            self.functions.len(),
            self.globals.len()
        );

        let result = Memory::new(&self.config.memory)
            .map_err(RuntimeError::from)
            .and_then(|memory| self.execute_program(Rc::new(RefCell::new(memory))));
        let output = self.context.output().to_string();

        match result {
            Ok(exit_status) => {
                info!("program finished with status {}", exit_status);
                Ok(Outcome {
                    exit_status,
                    output,
                })
            }
            Err(error) if error.is_clean_exit() => {
                info!("program exited with status 0");
                Ok(Outcome {
                    exit_status: 0,
                    output,
                })
            }
            Err(error) => {
                let line = self.context.line();
                info!("program failed at line {}: {}", line, error);
                Err(ExecutionError { error, line })
            }
        }
    }

    fn execute_program(&mut self, memory: Rc<RefCell<Memory>>) -> Result<i32, RuntimeError> {
        let mut root = Frame::root(memory);
        Self::bind_builtins(&mut root)?;

        let mut program = root.extend();
        self.declare_program(&mut program)?;

        let main = program.lookup_function("main")?;
        let status = self.call_function(&main, Vec::new(), &mut program)?;
        Ok(status.to_int())
    }

    /// Bind every builtin in `frame`, normally the root frame
    pub fn bind_builtins(frame: &mut Frame<'_>) -> Result<(), RuntimeError> {
        for builtin in Builtin::ALL {
            frame.declare_function(builtin.name(), Callable::Builtin(builtin))?;
        }
        Ok(())
    }

    /// Declare all functions, then run the file-scope declarations, in `frame`
    pub fn declare_program(&mut self, frame: &mut Frame<'_>) -> Result<(), RuntimeError> {
        for def in &self.functions {
            self.context.set_line(def.location.line);
            frame.declare_function(&def.name, Callable::User(Rc::clone(def)))?;
        }

        let globals = Rc::clone(&self.globals);
        for stmt in globals.iter() {
            self.execute(stmt, frame)?;
        }
        Ok(())
    }

    /// Call a builtin or user function with already evaluated arguments
    pub fn call_function(
        &mut self,
        callable: &Callable,
        args: Vec<TypedValue>,
        caller: &mut Frame<'_>,
    ) -> Result<TypedValue, RuntimeError> {
        match callable {
            Callable::Builtin(builtin) => self.call_builtin(*builtin, args, caller),
            Callable::User(def) => self.call_user_function(Rc::clone(def), args, caller),
        }
    }

    fn call_user_function(
        &mut self,
        def: Rc<FunctionDef>,
        args: Vec<TypedValue>,
        caller: &mut Frame<'_>,
    ) -> Result<TypedValue, RuntimeError> {
        let body = def.body.as_ref().ok_or_else(|| TypeError::UndefinedFunction {
            name: def.name.clone(),
        })?;

        if args.len() != def.params.len() {
            return Err(TypeError::ArgumentCount {
                function: def.name.clone(),
                expected: def.params.len(),
                got: args.len(),
            }
            .into());
        }

        let mut converted = Vec::with_capacity(args.len());
        for (index, (param, arg)) in def.params.iter().zip(&args).enumerate() {
            let ty = param.param_type.decay();
            let value = arg.implicit_cast(&ty).map_err(|_| TypeError::ArgumentType {
                function: def.name.clone(),
                index,
                expected: ty.to_string(),
                got: arg.data_type().to_string(),
            })?;
            converted.push((param, ty, value));
        }

        self.context.enter_call()?;
        let saved_line = self.context.line();
        debug!(
            "call {}({} args) at depth {}",
            def.name,
            args.len(),
            self.context.call_depth()
        );

        let (flow, top) = {
            let mut activation = caller.activation();
            let flow = self.run_activation(body, converted, &mut activation);
            (flow, activation.close())
        };
        caller.reclaim(top);
        self.context.exit_call();

        let flow = flow?;
        self.context.set_line(saved_line);

        if matches!(def.return_type, DataType::Void) {
            return Ok(TypedValue::void());
        }
        match flow {
            Flow::Return(Some(value)) => value.implicit_cast(&def.return_type),
            _ => Ok(TypedValue::new(0.0, def.return_type.clone())),
        }
    }

    fn run_activation(
        &mut self,
        body: &[Stmt],
        params: Vec<(&Param, DataType, TypedValue)>,
        activation: &mut Frame<'_>,
    ) -> Result<Flow, RuntimeError> {
        for (param, ty, value) in params {
            let slot = activation.declare_variable(&param.name, ty.clone())?;
            if let Some(address) = slot.address() {
                activation.assign_value_by_address(address, &ty, &value)?;
            }
        }
        self.execute_statements(body, activation)
    }
}
