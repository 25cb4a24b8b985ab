//! Object construction.

use super::{check_arguments, Variant};
use crate::codegen::LoweredOp;
use crate::operation::{OperationDescriptor, OperationKind};
use crate::reference::VariableReference;
use evotest_core::{Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorStatement {
    pub(crate) constructor: OperationDescriptor,
    pub(crate) args: Vec<VariableReference>,
}

impl ConstructorStatement {
    pub fn new(constructor: OperationDescriptor, args: Vec<VariableReference>) -> Result<Self> {
        let statement = Self { constructor, args };
        statement.check()?;
        Ok(statement)
    }

    pub fn constructor(&self) -> &OperationDescriptor {
        &self.constructor
    }

    pub fn args(&self) -> &[VariableReference] {
        &self.args
    }
}

impl Variant for ConstructorStatement {
    fn check(&self) -> Result<()> {
        if self.constructor.kind != OperationKind::Constructor {
            return Err(StructuralError::KindMismatch {
                operation: self.constructor.signature(),
                role: "constructor".to_string(),
            }
            .into());
        }
        check_arguments(&self.constructor, &self.args)
    }

    fn operands(&self) -> Vec<&VariableReference> {
        self.args.iter().collect()
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        self.args.iter_mut().collect()
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        self.constructor
            .params
            .iter()
            .cloned()
            .zip(self.args.iter_mut())
            .collect()
    }

    fn operation(&self) -> Option<&OperationDescriptor> {
        Some(&self.constructor)
    }

    fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        Some(&mut self.constructor)
    }

    fn return_type(&self) -> TypeDescriptor {
        self.constructor.owner.clone()
    }

    fn same(&self, other: &Self) -> bool {
        self.constructor.same_signature(&other.constructor)
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.same(b))
    }

    fn lower(&self) -> LoweredOp<'_> {
        LoweredOp::Construct(&self.constructor)
    }
}
