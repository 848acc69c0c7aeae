//! # sqlint - SQL Compiler Frontend
//!
//! A three-stage analysis pipeline over SQL source text: a lexer producing
//! classified tokens with precise positions, a recursive descent parser
//! producing a parse tree per statement, and a semantic analyzer producing
//! an annotated tree backed by a persistent symbol table. The stages share
//! one error-recovery contract: a single run over invalid input surfaces as
//! many independent defects as possible instead of halting at the first.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │         Driver (compile)             │
//! ├──────────────────────────────────────┤
//! │  Semantic Analyzer │ Symbol Table    │
//! ├──────────────────────────────────────┤
//! │  Parser (recursive descent,          │
//! │          panic-mode recovery)        │
//! ├──────────────────────────────────────┤
//! │  Lexer (single pass, one-character   │
//! │         lookahead, local recovery)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! Data flows strictly upward; each stage emits its partial output plus a
//! list of [`Diagnostic`] values and never raises across its boundary.
//! Downstream stages treat `Error` subtrees and `UNKNOWN` types as opaque,
//! so one root cause produces one diagnostic.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sqlint::compile;
//!
//! let result = compile(
//!     "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50));\n\
//!      SELECT name FROM users WHERE id = 1;",
//! );
//! assert!(result.success());
//! for diagnostic in &result.diagnostics {
//!     println!("{}", diagnostic);
//! }
//! ```
//!
//! The stage entry points are independently callable: [`scan`] for tokens,
//! [`parse`] for the tree, [`analyze`] for the annotated tree and symbol
//! table.
//!
//! ## Module Overview
//!
//! - [`token`]: token kinds, keyword set (perfect-hashed), positions
//! - [`lexer`]: source text → token stream + lexical diagnostics
//! - [`tree`]: homogeneous parse-tree nodes with a rule tag and type slot
//! - [`parser`]: token stream → parse tree + syntactic diagnostics
//! - [`symbols`]: tables, views, columns, constraints
//! - [`semantic`]: reference resolution, type inference, annotation
//! - [`suggest`]: keyword spelling suggestions for rejected identifiers
//! - [`driver`]: the `compile` composition
//!
//! The whole pipeline is CPU-bound over an in-memory buffer: no files, no
//! environment, no global state. Re-entrancy is safe because every
//! invocation builds its own symbol table.

pub mod diag;
pub mod driver;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod suggest;
pub mod symbols;
pub mod token;
pub mod tree;

pub use diag::{Diagnostic, Severity, Stage};
pub use driver::{compile, CompileResult};
pub use lexer::{scan, Lexer};
pub use parser::{parse, Parser};
pub use semantic::{analyze, AnalysisResult, Analyzer};
pub use symbols::{ColumnDef, Constraint, SqlType, SymbolTable, TableDef};
pub use token::{Keyword, Position, Token, TokenKind, Value};
pub use tree::{ParseTreeNode, Rule};
