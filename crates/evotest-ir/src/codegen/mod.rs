//! Code generation back ends.
//!
//! Statements never render themselves directly. [`Statement::lower`] produces
//! a [`Lowered`] description and both back ends consume only that, so the
//! source text and the instruction stream cannot drift apart.
//!
//! [`Statement::lower`]: crate::statement::Statement::lower

mod bytecode;
mod source;

pub use bytecode::{wasm_type, BytecodeEmitter, ImportedFunction, FAIL_IMPORT, GUARDED_SUFFIX, STRING_IMPORT};
pub use source::SourceWriter;

use crate::operation::OperationDescriptor;
use crate::reference::VariableReference;
use crate::value::Literal;

/// What a statement does, independent of the output format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoweredOp<'a> {
    /// Operands are the constructor arguments
    Construct(&'a OperationDescriptor),
    /// Operands are the receiver (when the method has one) and the arguments
    Invoke(&'a OperationDescriptor),
    /// Operands are the receiver, if any
    ReadField(&'a OperationDescriptor),
    /// Operands are the receiver, if any, then the stored value
    WriteField(&'a OperationDescriptor),
    /// Operands are the destination variable, then the value
    Copy,
    Literal(&'a Literal),
    Null,
}

/// Operation, operand references and result slot of one statement
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered<'a> {
    pub op: LoweredOp<'a>,
    pub operands: Vec<&'a VariableReference>,
    pub result: &'a VariableReference,
}

impl<'a> Lowered<'a> {
    /// True if the statement binds a value at its own position
    pub fn binds_result(&self) -> bool {
        !self.result.ty().is_void()
    }
}
