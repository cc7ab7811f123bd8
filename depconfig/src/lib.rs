//! # depconfig
//!
//! Dependency-driven configuration option trees.
//!
//! A project describes its options (booleans, integers, strings, choices and
//! nesting groups) in JSON schema documents. Each option may carry dependency
//! expressions over other options' values; `depconfig` compiles them once and
//! keeps every option's visibility in step with the current values.
//!
//! ## Features
//!
//! - Schema documents with `include` merging and cycle detection
//! - A small expression language: logic, comparison, arithmetic and bitwise
//!   operators plus the `!NAME` and `NAME=a,b,c` shorthands
//! - Cascading visibility through nested groups
//! - Non-fatal diagnostics for faulty dependencies and stored values
//! - JSON and TOML configuration files with automatic backup
//!
//! ## Quick Start
//!
//! ```rust
//! use depconfig::Engine;
//! use serde_json::json;
//!
//! let mut engine = Engine::from_documents(&[json!({
//!     "name": "Demo",
//!     "options": [
//!         {"name": "NET", "type": "bool", "default": true},
//!         {"name": "PORT", "type": "int", "default": 80, "dependencies": "NET"}
//!     ]
//! })])
//! .unwrap();
//!
//! assert!(engine.state("PORT").unwrap().visible);
//! engine.set_value("NET", false).unwrap();
//! assert!(!engine.state("PORT").unwrap().visible);
//! assert!(!engine.export().contains_key("PORT"));
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Option forest and schema ingestion
//! - [`expr`] - Dependency expression compiler and evaluator
//! - [`env`] - Value environment
//! - [`resolve`] - Visibility resolution
//! - [`engine`] - The configuration engine
//! - [`store`] - Configuration files

#[macro_use]
extern crate log;

/// Option forest data model and schema ingestion.
pub mod data;

/// The configuration engine.
pub mod engine;

/// Value environment seen by expressions.
pub mod env;

/// Error types and diagnostics.
pub mod error;

/// Dependency expressions.
pub mod expr;

/// Visibility and availability resolution.
pub mod resolve;

/// Reading and writing stored configurations.
pub mod store;

/// Typed option values.
pub mod value;

pub use data::{DocumentLoader, Forest, FsLoader, MemoryLoader, NodeId, OptionNode, OptionType};
pub use engine::{Engine, SnapshotEntry};
pub use env::Environment;
pub use error::{
    Diagnostic, DiagnosticKind, EngineError, EvalError, EvalResult, IngestError, ParseError,
};
pub use expr::{Expr, compile, compile_all, evaluate, evaluate_condition};
pub use resolve::{NodeState, Resolution, Resolver, resolve};
pub use value::Value;
