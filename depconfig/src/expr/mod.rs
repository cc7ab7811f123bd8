//! Dependency expressions.
//!
//! A dependency string such as `ENABLE_NET && (LOG_LEVEL=='INFO' || PORT > 1024)`
//! is compiled once into an [`Expr`] and evaluated against an
//! [`Environment`](crate::Environment) whenever visibility must be refreshed.
//!
//! Two shorthand forms are recognized when they make up the whole string:
//!
//! - `!NAME` compiles to [`Expr::Negation`]
//! - `NAME=a,b,c` compiles to [`Expr::SetMembership`], equivalent to
//!   `NAME==a || NAME==b || NAME==c`
//!
//! ## Submodules
//!
//! - `lexer` - tokenizer
//! - `parser` - recursive descent parser with the operator precedence table
//! - [`eval`] - evaluation and type coercion

use std::fmt;

use crate::{error::ParseError, value::Value};

/// Evaluation of compiled expressions.
pub mod eval;

mod lexer;
mod parser;

pub use eval::{evaluate, evaluate_condition};

/// Literal constant in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// The value this literal evaluates to.
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(v) if v.fract() == 0.0 => write!(f, "{v:.1}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(s) if s.contains('\'') => write!(f, "\"{s}\""),
            Literal::Str(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not.
    Not,
    /// Arithmetic negation.
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    /// Canonical source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::Xor => "xor",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
        }
    }
}

/// Compiled dependency expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// Reference to an option or context variable.
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `NAME=a,b,...`
    SetMembership {
        name: String,
        values: Vec<Literal>,
    },
    /// `!NAME`
    Negation(String),
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub(crate) fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Identifiers referenced by this expression, in first-seen order.
    pub fn references(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(name) | Expr::Negation(name) | Expr::SetMembership { name, .. } => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_references(names),
            Expr::Binary { left, right, .. } => {
                left.collect_references(names);
                right.collect_references(names);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Var(name) => f.write_str(name),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "!{operand}"),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{operand}"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::SetMembership { name, values } => {
                write!(f, "{name}=")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
            Expr::Negation(name) => write!(f, "!{name}"),
        }
    }
}

/// Compile a single dependency string.
pub fn compile(text: &str) -> Result<Expr, ParseError> {
    parser::parse(text)
}

/// Compile a dependency list into the conjunction of its elements.
///
/// Blank elements are skipped; `None` means the list places no condition.
pub fn compile_all<S: AsRef<str>>(texts: &[S]) -> Result<Option<Expr>, ParseError> {
    let mut combined: Option<Expr> = None;
    for text in texts {
        let text = text.as_ref();
        if text.trim().is_empty() {
            continue;
        }
        let expr = compile(text)?;
        combined = Some(match combined {
            Some(left) => Expr::binary(BinaryOp::And, left, expr),
            None => expr,
        });
    }
    Ok(combined)
}
