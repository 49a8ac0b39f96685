//! ParserCraft is a library for building a programming language's front end
//! and code generation in one pass: a PEG grammar engine, a packrat
//! interpreter, an incremental parser for editor-style workloads, and a
//! multi-backend lowering layer that turns a parsed document into a
//! high-level rewrite, ANSI C, WebAssembly text, or LLVM IR.
//!
//! # Overview
//!
//! Grammars are written in ordinary PEG notation and compiled once into a
//! [`peg::Grammar`] value:
//!
//! ```
//! use parsercraft::peg::notation;
//!
//! let grammar = notation::parse(
//!     "program   <- statement+\n\
//!      statement <- IDENT \"=\" expr \";\"\n\
//!      expr      <- term ((\"+\" / \"-\") term)*\n\
//!      term      <- factor ((\"*\" / \"/\") factor)*\n\
//!      factor    <- NUMBER / IDENT / \"(\" expr \")\"\n",
//! ).unwrap();
//!
//! let ast = parsercraft::interpreter::parse(&grammar, "x = 2 + 3 * 4 ;").unwrap();
//! assert_eq!(ast.node_type, "program");
//! ```
//!
//! A parsed document is a plain [`ast::AstNode`] tree: one generic node
//! type carrying a string `node_type`, rather than a closed per-grammar
//! enum, so rule names pass straight through from grammar to tree.
//!
//! For editor-style usage where a document is re-parsed after every
//! keystroke, [`incremental::IncrementalParser`] keeps the packrat memo
//! table alive across edits and only re-evaluates what an edit could have
//! affected.
//!
//! The [`backend`] module lowers an `AstNode` into a grammar-agnostic
//! [`backend::Program`] and ships four targets: [`backend::transpiler`]
//! (a configurable high-level rewrite, plus a direct `execute` path),
//! [`backend::c`], [`backend::wasm`], and [`backend::llvm`].

pub mod ast;
pub mod backend;
pub mod config;
pub mod error;
pub mod incremental;
pub mod interpreter;
pub mod peg;
pub mod position;

pub use ast::AstNode;
pub use backend::{Backend, Expr, Program, Statement};
pub use config::TranspileOptions;
pub use error::{BackendError, GrammarError, ImplementationError, MatchError, SourceError};
pub use incremental::IncrementalParser;
pub use interpreter::{parse, parse_with_cache, Cache};
pub use peg::{notation, Grammar, PegExpr, Rule};
pub use position::{Position, Source};
