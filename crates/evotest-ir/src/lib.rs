//! Statement / VariableReference intermediate representation.
//!
//! A [`TestProgram`] is an ordered list of [`Statement`]s. Each statement
//! produces one value addressed by a [`VariableReference`] (its position in
//! the program) and reads only values produced before it. The IR is built
//! to be:
//! - Mutation-friendly: local mutations keep every reference backward
//! - Comparable: exact identity (`==`) versus cross-program `same`
//! - Renderable: source text and WASM derived from one lowering

pub mod assertion;
pub mod codegen;
pub mod compiler;
pub mod mutation;
pub mod operation;
pub mod program;
pub mod reference;
pub mod statement;
pub mod validation;
pub mod value;

#[cfg(test)]
mod testing;

pub use assertion::Assertion;
pub use codegen::{BytecodeEmitter, Lowered, LoweredOp, SourceWriter};
pub use compiler::{Compiler, CompilerConfig};
pub use mutation::{MutationFactory, MutationKind, RandomMutationFactory};
pub use operation::{ExecutionContext, OperationCatalog, OperationDescriptor, OperationKind};
pub use program::TestProgram;
pub use reference::VariableReference;
pub use statement::{AssignTarget, Statement, StatementKind};
pub use validation::{validate_program, validate_statement};
pub use value::{Literal, ObjectHandle, Value};
