//! Assignment to an earlier variable or to a field.

use super::field::check_field_access;
use super::{check_operand, Variant};
use crate::codegen::LoweredOp;
use crate::operation::OperationDescriptor;
use crate::reference::VariableReference;
use evotest_core::{Result, TypeDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    Variable(VariableReference),
    Field {
        receiver: Option<VariableReference>,
        field: OperationDescriptor,
    },
}

impl AssignTarget {
    /// Type a value must have to be stored in the target
    pub fn ty(&self) -> &TypeDescriptor {
        match self {
            AssignTarget::Variable(var) => var.ty(),
            AssignTarget::Field { field, .. } => &field.returns,
        }
    }
}

/// `target = value`. Produces no value of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatement {
    pub(crate) target: AssignTarget,
    pub(crate) value: VariableReference,
}

impl AssignmentStatement {
    pub fn new(target: AssignTarget, value: VariableReference) -> Result<Self> {
        let statement = Self { target, value };
        statement.check()?;
        Ok(statement)
    }

    pub fn target(&self) -> &AssignTarget {
        &self.target
    }

    pub fn value(&self) -> &VariableReference {
        &self.value
    }
}

impl Variant for AssignmentStatement {
    fn check(&self) -> Result<()> {
        if let AssignTarget::Field { receiver, field } = &self.target {
            check_field_access(field, receiver.as_ref())?;
        }
        check_operand(self.target.ty(), &self.value)
    }

    fn operands(&self) -> Vec<&VariableReference> {
        match &self.target {
            AssignTarget::Variable(var) => vec![var, &self.value],
            AssignTarget::Field { receiver, .. } => {
                receiver.iter().chain(std::iter::once(&self.value)).collect()
            }
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        match &mut self.target {
            AssignTarget::Variable(var) => vec![var, &mut self.value],
            AssignTarget::Field { receiver, .. } => receiver
                .iter_mut()
                .chain(std::iter::once(&mut self.value))
                .collect(),
        }
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        vec![(self.target.ty().clone(), &mut self.value)]
    }

    fn operation(&self) -> Option<&OperationDescriptor> {
        match &self.target {
            AssignTarget::Field { field, .. } => Some(field),
            AssignTarget::Variable(_) => None,
        }
    }

    fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        match &mut self.target {
            AssignTarget::Field { field, .. } => Some(field),
            AssignTarget::Variable(_) => None,
        }
    }

    fn return_type(&self) -> TypeDescriptor {
        TypeDescriptor::Void
    }

    fn same(&self, other: &Self) -> bool {
        let target_same = match (&self.target, &other.target) {
            (AssignTarget::Variable(a), AssignTarget::Variable(b)) => a.same(b),
            (
                AssignTarget::Field {
                    receiver: ra,
                    field: fa,
                },
                AssignTarget::Field {
                    receiver: rb,
                    field: fb,
                },
            ) => {
                fa.same_signature(fb)
                    && match (ra, rb) {
                        (Some(a), Some(b)) => a.same(b),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        };
        target_same && self.value.same(&other.value)
    }

    fn lower(&self) -> LoweredOp<'_> {
        match &self.target {
            AssignTarget::Variable(_) => LoweredOp::Copy,
            AssignTarget::Field { field, .. } => LoweredOp::WriteField(field),
        }
    }
}
