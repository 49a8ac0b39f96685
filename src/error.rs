//! The three structured error kinds surfaced across the core's public
//! boundary, plus the internal failure types used while a match is in
//! flight.
//!
//! Internal helpers are free to use whatever `Result` shape is convenient;
//! only [`GrammarError`], [`SourceError`], and [`BackendError`] are allowed
//! to cross a public entry point.

use crate::position::Position;
use thiserror::Error;

/// Raised by [`crate::peg::notation`] or [`crate::peg::Grammar::build`] when
/// PEG notation is malformed or a compiled grammar violates an invariant
/// (unknown rule reference, left recursion).
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("grammar error at line {line}, column {column}: {message}")]
pub struct GrammarError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl GrammarError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}

/// Raised by [`crate::interpreter`] when a source program fails to match
/// the grammar's start rule.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("source error at line {line}, column {column}: {message}")]
pub struct SourceError {
    pub line: usize,
    pub column: usize,
    /// The single furthest byte offset reached during the whole parse.
    pub furthest_position: usize,
    /// Name of the deepest rule attempted at `furthest_position`.
    pub deepest_rule: String,
    pub message: String,
}

/// Raised by a backend when an `AstNode` is structurally unrecognizable.
/// Backends never fail on an *unknown* node type — only on a known node
/// type whose children violate the shape that node type requires.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("backend error in {backend_name}: {message}")]
pub struct BackendError {
    pub backend_name: String,
    pub message: String,
}

impl BackendError {
    pub fn new(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend_name: backend_name.into(),
            message: message.into(),
        }
    }
}

/// Internal failure reported by [`crate::peg::Grammar::build`]'s validation
/// pass, e.g. a dangling rule reference or left recursion. Always
/// converted to a [`GrammarError`] before crossing the public boundary.
#[derive(Debug, Clone, Error)]
#[error("{what}: {message}")]
pub struct ImplementationError {
    pub what: String,
    pub message: String,
}

impl ImplementationError {
    pub fn new(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// Internal, single-match failure used inside the packrat interpreter.
/// PEG matching never distinguishes *why* an expression failed beyond the
/// furthest position reached, so this carries no payload of its own — the
/// furthest position lives in the interpreter's cache.
#[derive(Debug, Clone, Copy, Error)]
#[error("no match")]
pub struct MatchError;
