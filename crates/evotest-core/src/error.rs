//! Error types for test-program representation and execution.
//!
//! Faults raised by the subject program are not errors: they are captured as
//! [`SubjectFault`](crate::SubjectFault) data. Everything here signals that a
//! single test program is unusable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Structural inconsistency: {0}")]
    Structural(#[from] StructuralError),

    #[error("Infrastructure fault: {0}")]
    Infrastructure(#[from] InfrastructureFault),

    #[error("No equivalent operation for {0} in the target context")]
    NoEquivalentOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Code generation error: {0}")]
    Codegen(String),

    #[error("WASM error: {0}")]
    Wasm(String),
}

impl Error {
    /// True for errors that indicate an engine bug rather than a subject bug.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural(_))
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Infrastructure(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Invariant violations in the position-addressed representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("statement {statement} references position {operand}, which is not before it")]
    ForwardReference { statement: usize, operand: usize },

    #[error("statement {statement} references its own return value")]
    SelfReference { statement: usize },

    #[error("no value bound for position {position}")]
    UnboundReference { position: usize },

    #[error("position {position} does not exist in a program of length {len}")]
    MissingPosition { position: usize, len: usize },

    /// A relocation moved a reference before the start of the program
    #[error("position {position} is before the start of a program of length {len}")]
    NegativePosition { position: isize, len: usize },

    #[error("statement at index {index} claims position {claimed}")]
    PositionMismatch { index: usize, claimed: usize },

    #[error("position {position}: expected type {expected}, found {found}")]
    TypeMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("statement {statement} references a value owned by another program")]
    ForeignReference { statement: usize },

    #[error("{operation} expects {expected} operands, got {found}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        found: usize,
    },

    #[error("{operation} cannot be used as a {role}")]
    KindMismatch { operation: String, role: String },

    #[error("literal {literal} cannot be represented: {reason}")]
    InvalidLiteral { literal: String, reason: String },
}

/// Failures to set up an invocation of the subject program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfrastructureFault {
    #[error("bad arguments for {operation}: {reason}")]
    BadArguments { operation: String, reason: String },

    #[error("operation {operation} is not accessible")]
    Inaccessible { operation: String },

    #[error("cannot construct {type_name}: {reason}")]
    Construction { type_name: String, reason: String },

    #[error("unsupported operation {operation}")]
    Unsupported { operation: String },
}
