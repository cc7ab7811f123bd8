//! Error types and diagnostics.
//!
//! Errors are split by the phase that produces them:
//!
//! - [`ParseError`] - malformed dependency expression text
//! - [`IngestError`] - schema loading failures, fatal to the load
//! - [`EvalError`] - faults while evaluating a dependency, recovered by the
//!   resolver and reported as a [`Diagnostic`]
//! - [`EngineError`] - rejected calls on the [`Engine`](crate::Engine) API

use std::fmt;

use thiserror::Error;

/// Malformed dependency expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the expression text.
    pub position: usize,
    /// Human readable description.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Failure while building an option forest from schema documents.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Two nodes share an identifier somewhere in the merged forest.
    #[error("duplicate option identifier `{name}` (declared in {first} and {second})")]
    DuplicateIdentifier {
        name: String,
        first: String,
        second: String,
    },

    /// An include chain revisits a document already being processed.
    #[error("circular include: {}", chain.join(" -> "))]
    CircularInclude { chain: Vec<String> },

    /// A declared default does not fit the option's type.
    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A dependency expression failed to compile.
    #[error("invalid dependency of `{option}`: {source}")]
    Parse {
        option: String,
        #[source]
        source: ParseError,
    },

    /// The document does not have the expected shape.
    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    /// The document loader could not provide a document.
    #[error("failed to load schema document `{reference}`: {message}")]
    Load { reference: String, message: String },
}

/// Fault raised while evaluating a dependency expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The expression names an identifier the environment does not know.
    #[error("unknown reference `{name}`")]
    UnknownReference { name: String },

    /// An operand cannot be coerced to what the operator needs.
    #[error("type mismatch in `{op}`: expected {expected}, got {actual}")]
    TypeMismatch {
        op: String,
        expected: String,
        actual: String,
    },

    /// Division or modulus by zero.
    #[error("division by zero in `{op}`")]
    DivisionByZero { op: String },

    /// Integer overflow, negative exponent or out of range shift.
    #[error("arithmetic overflow in `{op}`")]
    Overflow { op: String },
}

/// Rejected call on the engine API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown option `{name}`")]
    UnknownOption { name: String },

    #[error("type mismatch for `{path}`: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// External options only change through [`Engine::inject`](crate::Engine::inject).
    #[error("option `{name}` is provided externally and cannot be edited")]
    ReadOnly { name: String },

    /// The option's dependencies are not satisfied.
    #[error("option `{name}` is disabled")]
    Disabled { name: String },

    /// A context variable would shadow a declared option or group.
    #[error("`{name}` is already declared by the schema")]
    Duplicate { name: String },
}

/// Non-fatal problem collected while resolving or loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Identifier the diagnostic is about.
    pub option: String,
    pub kind: DiagnosticKind,
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The option's dependency could not be evaluated; it is treated as unsatisfied.
    Eval(EvalError),
    /// A stored value was rejected and the default was used instead.
    InvalidValue { expected: String, actual: String },
    /// A stored entry names no option in the forest.
    UnknownKey,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Eval(err) => write!(f, "{}: {}", self.option, err),
            DiagnosticKind::InvalidValue { expected, actual } => write!(
                f,
                "{}: stored value {} is not {}, using default",
                self.option, actual, expected
            ),
            DiagnosticKind::UnknownKey => write!(f, "{}: not declared by the schema", self.option),
        }
    }
}

impl Diagnostic {
    /// The evaluation fault, if this diagnostic carries one.
    pub fn eval_error(&self) -> Option<&EvalError> {
        match &self.kind {
            DiagnosticKind::Eval(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
