//! Literals: primitive constants, strings and typed `null`.

use super::Variant;
use crate::codegen::LoweredOp;
use crate::reference::VariableReference;
use crate::value::Literal;
use evotest_core::{Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveStatement {
    pub(crate) value: Literal,
}

impl PrimitiveStatement {
    pub fn new(value: Literal) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Literal {
        &self.value
    }

    /// Replace the constant; the type must not change
    pub(crate) fn set_value(&mut self, value: Literal) -> bool {
        if value.ty() != self.value.ty() || value == self.value || check_literal(&value).is_err() {
            return false;
        }
        self.value = value;
        true
    }
}

/// A `char` holds one UTF-16 code unit
fn check_literal(value: &Literal) -> Result<()> {
    match value {
        Literal::Char(c) if c.len_utf16() > 1 => Err(StructuralError::InvalidLiteral {
            literal: format!("U+{:X}", *c as u32),
            reason: "char outside the basic multilingual plane".to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

impl Variant for PrimitiveStatement {
    fn check(&self) -> Result<()> {
        check_literal(&self.value)
    }

    fn operands(&self) -> Vec<&VariableReference> {
        Vec::new()
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        Vec::new()
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        Vec::new()
    }

    fn return_type(&self) -> TypeDescriptor {
        self.value.ty()
    }

    fn same(&self, other: &Self) -> bool {
        self.value == other.value
    }

    fn lower(&self) -> LoweredOp<'_> {
        LoweredOp::Literal(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullStatement {
    pub(crate) ty: TypeDescriptor,
}

impl NullStatement {
    pub fn new(ty: TypeDescriptor) -> Result<Self> {
        if !ty.is_reference() {
            return Err(StructuralError::TypeMismatch {
                position: 0,
                expected: "reference type".to_string(),
                found: ty.to_string(),
            }
            .into());
        }
        Ok(Self { ty })
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }
}

impl Variant for NullStatement {
    fn operands(&self) -> Vec<&VariableReference> {
        Vec::new()
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        Vec::new()
    }

    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)> {
        Vec::new()
    }

    fn return_type(&self) -> TypeDescriptor {
        self.ty.clone()
    }

    fn same(&self, other: &Self) -> bool {
        self.ty == other.ty
    }

    fn lower(&self) -> LoweredOp<'_> {
        LoweredOp::Null
    }
}
