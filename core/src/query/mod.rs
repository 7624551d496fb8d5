//! Boolean queries: `AND`, `OR`, `NOT` and parentheses over single terms.
//!
//! ```text
//! Query    := OrExpr
//! OrExpr   := AndExpr ("OR" AndExpr)*
//! AndExpr  := NotExpr ("AND" NotExpr)*
//! NotExpr  := "NOT" NotExpr | Atom
//! Atom     := TERM | "(" Query ")"
//! ```
//!
//! `NOT` binds tighter than `AND`, which binds tighter than `OR`. Operators are
//! recognized only in upper case; `and` is an ordinary term.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::QueryNode;
pub use eval::{search, QueryEvaluator};
pub use parser::{parse_query, QueryParser, MAX_CLAUSES, MAX_DEPTH};
