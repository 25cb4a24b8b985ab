//! Field reads.

use super::{check_operand, Variant};
use crate::codegen::LoweredOp;
use crate::operation::{OperationDescriptor, OperationKind};
use crate::reference::VariableReference;
use evotest_core::{Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStatement {
    pub(crate) field: OperationDescriptor,
    pub(crate) receiver: Option<VariableReference>,
}

impl FieldStatement {
    pub fn new(field: OperationDescriptor, receiver: Option<VariableReference>) -> Result<Self> {
        let statement = Self { field, receiver };
        statement.check()?;
        Ok(statement)
    }

    pub fn field(&self) -> &OperationDescriptor {
        &self.field
    }

    pub fn receiver(&self) -> Option<&VariableReference> {
        self.receiver.as_ref()
    }
}

/// Shared by reads and field assignments
pub(crate) fn check_field_access(
    field: &OperationDescriptor,
    receiver: Option<&VariableReference>,
) -> Result<()> {
    if field.kind != OperationKind::Field {
        return Err(StructuralError::KindMismatch {
            operation: field.signature(),
            role: "field".to_string(),
        }
        .into());
    }
    match (receiver, field.has_receiver()) {
        (Some(receiver), true) => check_operand(&field.owner, receiver),
        (None, false) => Ok(()),
        (receiver, _) => Err(StructuralError::ArityMismatch {
            operation: field.signature(),
            expected: field.has_receiver() as usize,
            found: receiver.is_some() as usize,
        }
        .into()),
    }
}

impl Variant for FieldStatement {
    fn check(&self) -> Result<()> {
        check_field_access(&self.field, self.receiver.as_ref())
    }

    fn operands(&self) -> Vec<&VariableReference> {
        self.receiver.iter().collect()
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        self.receiver.iter_mut().collect()
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        let owner = self.field.owner.clone();
        self.receiver.iter_mut().map(|r| (owner.clone(), r)).collect()
    }

    fn operation(&self) -> Option<&OperationDescriptor> {
        Some(&self.field)
    }

    fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        Some(&mut self.field)
    }

    fn return_type(&self) -> TypeDescriptor {
        self.field.returns.clone()
    }

    fn same(&self, other: &Self) -> bool {
        let receiver_same = match (&self.receiver, &other.receiver) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        };
        self.field.same_signature(&other.field) && receiver_same
    }

    fn lower(&self) -> LoweredOp<'_> {
        LoweredOp::ReadField(&self.field)
    }
}
