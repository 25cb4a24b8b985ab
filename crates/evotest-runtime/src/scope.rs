//! Per-execution binding table.

use evotest_core::{Result, StructuralError};
use evotest_ir::{Value, VariableReference};
use std::collections::HashMap;

/// Values bound by the statements executed so far.
///
/// Created empty for each execution and dropped afterwards.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<VariableReference, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &VariableReference) -> Option<&Value> {
        self.values.get(var)
    }

    /// The bound value; an unbound reference is an engine bug
    pub fn lookup(&self, var: &VariableReference) -> Result<&Value> {
        self.values.get(var).ok_or_else(|| {
            StructuralError::UnboundReference {
                position: var.position(),
            }
            .into()
        })
    }

    /// Bind `value`, replacing any earlier binding of `var`
    pub fn bind(&mut self, var: VariableReference, value: Value) -> Option<Value> {
        self.values.insert(var, value)
    }

    pub fn is_bound(&self, var: &VariableReference) -> bool {
        self.values.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evotest_core::{Error, ProgramId, TypeDescriptor};

    #[test]
    fn test_bind_and_lookup() {
        let program = ProgramId::new();
        let var = VariableReference::new(program, 0, TypeDescriptor::Int);
        let mut scope = Scope::new();
        assert!(scope.is_empty());

        assert!(scope.bind(var.clone(), Value::Int(4)).is_none());
        assert_eq!(scope.lookup(&var).unwrap(), &Value::Int(4));
        assert_eq!(scope.bind(var.clone(), Value::Int(5)), Some(Value::Int(4)));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_unbound_is_structural() {
        let scope = Scope::new();
        let var = VariableReference::new(ProgramId::new(), 2, TypeDescriptor::Int);
        assert!(matches!(
            scope.lookup(&var),
            Err(Error::Structural(StructuralError::UnboundReference { position: 2 }))
        ));
    }

    #[test]
    fn test_lookup_is_structural_not_by_program() {
        let var = VariableReference::new(ProgramId::new(), 1, TypeDescriptor::Int);
        let twin = VariableReference::new(ProgramId::new(), 1, TypeDescriptor::Int);
        let mut scope = Scope::new();
        scope.bind(var, Value::Int(1));
        assert!(scope.is_bound(&twin));
    }
}
