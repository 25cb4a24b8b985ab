//! Postconditions attached to statements.

use crate::operation::OperationDescriptor;
use crate::reference::VariableReference;
use crate::value::Literal;
use evotest_core::Result;
use serde::{Deserialize, Serialize};

/// Tolerance used when comparing floating point observations
pub const FLOAT_DELTA: f64 = 0.01;

/// A check on the values bound after a statement executed.
///
/// Assertions are advisory: they never influence execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Assertion {
    /// The value equals a primitive or string constant
    Primitive {
        source: VariableReference,
        expected: Literal,
    },
    /// The value is (or is not) null
    Null {
        source: VariableReference,
        is_null: bool,
    },
    /// Two values are (or are not) equal
    Equals {
        source: VariableReference,
        other: VariableReference,
        equal: bool,
    },
    /// A zero-argument observer method returns the expected constant
    Inspector {
        source: VariableReference,
        inspector: OperationDescriptor,
        expected: Literal,
    },
    /// A field holds the expected constant
    Field {
        source: VariableReference,
        field: OperationDescriptor,
        expected: Literal,
    },
}

impl Assertion {
    pub fn primitive(source: VariableReference, expected: Literal) -> Self {
        Assertion::Primitive { source, expected }
    }

    pub fn null(source: VariableReference, is_null: bool) -> Self {
        Assertion::Null { source, is_null }
    }

    pub fn equals(source: VariableReference, other: VariableReference, equal: bool) -> Self {
        Assertion::Equals {
            source,
            other,
            equal,
        }
    }

    pub fn inspector(
        source: VariableReference,
        inspector: OperationDescriptor,
        expected: Literal,
    ) -> Self {
        Assertion::Inspector {
            source,
            inspector,
            expected,
        }
    }

    pub fn field(source: VariableReference, field: OperationDescriptor, expected: Literal) -> Self {
        Assertion::Field {
            source,
            field,
            expected,
        }
    }

    pub fn source(&self) -> &VariableReference {
        match self {
            Assertion::Primitive { source, .. }
            | Assertion::Null { source, .. }
            | Assertion::Equals { source, .. }
            | Assertion::Inspector { source, .. }
            | Assertion::Field { source, .. } => source,
        }
    }

    /// Every reference the assertion reads, source first
    pub fn references(&self) -> Vec<&VariableReference> {
        match self {
            Assertion::Equals { source, other, .. } => vec![source, other],
            _ => vec![self.source()],
        }
    }

    pub(crate) fn references_mut(&mut self) -> Vec<&mut VariableReference> {
        match self {
            Assertion::Equals { source, other, .. } => vec![source, other],
            Assertion::Primitive { source, .. }
            | Assertion::Null { source, .. }
            | Assertion::Inspector { source, .. }
            | Assertion::Field { source, .. } => vec![source],
        }
    }

    pub fn references_var(&self, var: &VariableReference) -> bool {
        self.references().into_iter().any(|r| r == var)
    }

    pub fn operation(&self) -> Option<&OperationDescriptor> {
        match self {
            Assertion::Inspector { inspector, .. } => Some(inspector),
            Assertion::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub(crate) fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        match self {
            Assertion::Inspector { inspector, .. } => Some(inspector),
            Assertion::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Deep copy with every reference passed through `f`
    pub fn map_references<F>(&self, mut f: F) -> Result<Assertion>
    where
        F: FnMut(&VariableReference) -> Result<VariableReference>,
    {
        let mut copy = self.clone();
        match &mut copy {
            Assertion::Equals { source, other, .. } => {
                *source = f(source)?;
                *other = f(other)?;
            }
            Assertion::Primitive { source, .. }
            | Assertion::Null { source, .. }
            | Assertion::Inspector { source, .. }
            | Assertion::Field { source, .. } => {
                *source = f(source)?;
            }
        }
        Ok(copy)
    }

    /// Source text of the check
    pub fn code(&self) -> String {
        crate::codegen::SourceWriter::default().assertion(self)
    }
}
