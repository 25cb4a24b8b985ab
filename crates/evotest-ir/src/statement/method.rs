//! Method invocation.

use super::{check_arguments, check_operand, Variant};
use crate::codegen::LoweredOp;
use crate::operation::{OperationDescriptor, OperationKind};
use crate::reference::VariableReference;
use evotest_core::{Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodStatement {
    pub(crate) method: OperationDescriptor,
    pub(crate) callee: Option<VariableReference>,
    pub(crate) args: Vec<VariableReference>,
}

impl MethodStatement {
    /// `callee` must be present exactly when the method is not static
    pub fn new(
        method: OperationDescriptor,
        callee: Option<VariableReference>,
        args: Vec<VariableReference>,
    ) -> Result<Self> {
        let statement = Self {
            method,
            callee,
            args,
        };
        statement.check()?;
        Ok(statement)
    }

    pub fn method(&self) -> &OperationDescriptor {
        &self.method
    }

    pub fn callee(&self) -> Option<&VariableReference> {
        self.callee.as_ref()
    }

    pub fn args(&self) -> &[VariableReference] {
        &self.args
    }
}

impl Variant for MethodStatement {
    fn check(&self) -> Result<()> {
        let method = &self.method;
        if method.kind != OperationKind::Method {
            return Err(StructuralError::KindMismatch {
                operation: method.signature(),
                role: "method".to_string(),
            }
            .into());
        }
        match (&self.callee, method.has_receiver()) {
            (Some(callee), true) => check_operand(&method.owner, callee)?,
            (None, false) => {}
            (callee, _) => {
                return Err(StructuralError::ArityMismatch {
                    operation: method.signature(),
                    expected: method.params.len() + method.has_receiver() as usize,
                    found: self.args.len() + callee.is_some() as usize,
                }
                .into())
            }
        }
        check_arguments(method, &self.args)
    }

    fn operands(&self) -> Vec<&VariableReference> {
        self.callee.iter().chain(self.args.iter()).collect()
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        self.callee.iter_mut().chain(self.args.iter_mut()).collect()
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        let mut slots = Vec::with_capacity(self.args.len() + 1);
        if let Some(callee) = self.callee.as_mut() {
            slots.push((self.method.owner.clone(), callee));
        }
        slots.extend(self.method.params.iter().cloned().zip(self.args.iter_mut()));
        slots
    }

    fn operation(&self) -> Option<&OperationDescriptor> {
        Some(&self.method)
    }

    fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        Some(&mut self.method)
    }

    fn return_type(&self) -> TypeDescriptor {
        self.method.returns.clone()
    }

    fn same(&self, other: &Self) -> bool {
        let callee_same = match (&self.callee, &other.callee) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        };
        self.method.same_signature(&other.method)
            && callee_same
            && self.args.len() == other.args.len()
            && self.args.iter().zip(&other.args).all(|(a, b)| a.same(b))
    }

    fn lower(&self) -> LoweredOp<'_> {
        LoweredOp::Invoke(&self.method)
    }
}
