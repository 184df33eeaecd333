// ABOUTME: Error types for parsing and evaluation failures in the expression interpreter

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// Malformed input, an unexpected character, an unterminated construct, or
    /// non-whitespace input left over after the top-level expression.
    #[error("parse error: {0}")]
    Parse(String),

    /// Lookup of a name in the empty environment.
    #[error("free variable: {0}")]
    FreeVariable(String),

    /// `add_to`/`mult_with` applied to a non-number.
    #[error("not a number: {0}")]
    NotANumber(String),

    /// An `If` test, or a `CompCont`'s boolean, applied to a non-boolean.
    #[error("not a boolean: {0}")]
    NotABoolean(String),

    /// `call` applied to a non-closure.
    #[error("not a function: {0}")]
    NotAFunction(String),

    /// The collector could not reclaim enough space even after growing the heap.
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, ProgramError>;
