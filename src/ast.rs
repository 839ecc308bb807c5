// Executable tree definitions for the C interpreter
//
// The tree is produced by an external front end (or built directly in tests) and
// walked by the interpreter. Only statements carry a source location; expressions
// report errors against the line of the statement that contains them.

use crate::types::DataType;
use std::fmt;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitShl,
    BitShr,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitShl => "<<",
            BinOp::BitShr => ">>",
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::BitShl | BinOp::BitShr
        )
    }

    /// Operators whose operands may be swapped without changing the result type
    pub fn is_commutative(&self) -> bool {
        !matches!(
            self,
            BinOp::Sub | BinOp::Div | BinOp::Mod | BinOp::BitShl | BinOp::BitShr
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

impl UnOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc | UnOp::PostInc => "++",
            UnOp::PreDec | UnOp::PostDec => "--",
            UnOp::Deref => "*",
            UnOp::AddrOf => "&",
        }
    }

    pub fn is_inc_dec(&self) -> bool {
        matches!(
            self,
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec
        )
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Assignment operators: `=` or a compound form such as `+=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinOp),
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignOp::Assign => f.write_str("="),
            AssignOp::Compound(op) => write!(f, "{}=", op),
        }
    }
}

/// Expressions
#[derive(Debug, Clone)]
pub enum Expr {
    /// Numeric literal; its type is decided by [`crate::memory::value::classify_literal`]
    Number(f64),
    /// String literal with escapes already resolved
    StringLiteral(String),
    Variable(String),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    PointerMember {
        object: Box<Expr>,
        field: String,
    },
    Cast {
        target_type: DataType,
        expr: Box<Expr>,
    },
    SizeofType(DataType),
    SizeofExpr(Box<Expr>),
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn string(text: &str) -> Self {
        Expr::StringLiteral(text.to_string())
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn compound(op: BinOp, target: Expr, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Compound(op),
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
        }
    }

    pub fn index(array: Expr, index: Expr) -> Self {
        Expr::Index {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    pub fn member(object: Expr, field: &str) -> Self {
        Expr::Member {
            object: Box::new(object),
            field: field.to_string(),
        }
    }

    pub fn arrow(object: Expr, field: &str) -> Self {
        Expr::PointerMember {
            object: Box::new(object),
            field: field.to_string(),
        }
    }

    pub fn cast(target_type: DataType, expr: Expr) -> Self {
        Expr::Cast {
            target_type,
            expr: Box::new(expr),
        }
    }

    pub fn ternary(condition: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }
}

/// Statements
#[derive(Debug, Clone)]
pub enum Stmt {
    Declare {
        name: String,
        var_type: DataType,
        init: Option<Expr>,
        location: SourceLocation,
    },
    Expression {
        expr: Expr,
        location: SourceLocation,
    },
    Block {
        body: Vec<Stmt>,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        location: SourceLocation,
    },
    DoWhile {
        body: Vec<Stmt>,
        condition: Expr,
        location: SourceLocation,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Vec<Stmt>,
        location: SourceLocation,
    },
    Return {
        expr: Option<Expr>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
}

impl Stmt {
    /// Get the source location of this statement
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Declare { location, .. } => location,
            Stmt::Expression { location, .. } => location,
            Stmt::Block { location, .. } => location,
            Stmt::If { location, .. } => location,
            Stmt::While { location, .. } => location,
            Stmt::DoWhile { location, .. } => location,
            Stmt::For { location, .. } => location,
            Stmt::Return { location, .. } => location,
            Stmt::Break { location } => location,
            Stmt::Continue { location } => location,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub param_type: DataType,
}

impl Param {
    pub fn new(name: &str, param_type: DataType) -> Self {
        Param {
            name: name.to_string(),
            param_type,
        }
    }
}

/// Function definition, or a prototype when `body` is `None`
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: DataType,
    pub params: Vec<Param>,
    pub body: Option<Vec<Stmt>>,
    pub location: SourceLocation,
}

impl FunctionDef {
    /// Signature string used to detect conflicting declarations, e.g. `int(int,char*)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.param_type.to_string()).collect();
        format!("{}({})", self.return_type, params.join(","))
    }

    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }
}

/// A file-scope item
#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDef),
    /// A global variable declaration (`Stmt::Declare`)
    Global(Stmt),
}

/// Top-level program structure
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }
}
