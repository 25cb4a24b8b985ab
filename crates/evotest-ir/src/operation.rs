//! Opaque descriptors of invocable subject operations.

use evotest_core::{ContextId, FaultKind, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Constructor,
    Method,
    Field,
}

/// Description of a constructor, method or field of the subject program.
///
/// Statements hold descriptors instead of live handles; the subject resolves
/// them at invocation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub owner: TypeDescriptor,
    pub name: String,
    pub params: Vec<TypeDescriptor>,
    pub returns: TypeDescriptor,
    pub is_static: bool,
    pub declared_faults: BTreeSet<FaultKind>,
    pub context: ContextId,
}

impl OperationDescriptor {
    pub fn constructor(owner: TypeDescriptor, params: Vec<TypeDescriptor>) -> Self {
        Self {
            kind: OperationKind::Constructor,
            name: owner.name().to_string(),
            returns: owner.clone(),
            owner,
            params,
            is_static: true,
            declared_faults: BTreeSet::new(),
            context: ContextId::default(),
        }
    }

    pub fn method(
        owner: TypeDescriptor,
        name: impl Into<String>,
        params: Vec<TypeDescriptor>,
        returns: TypeDescriptor,
    ) -> Self {
        Self {
            kind: OperationKind::Method,
            owner,
            name: name.into(),
            params,
            returns,
            is_static: false,
            declared_faults: BTreeSet::new(),
            context: ContextId::default(),
        }
    }

    pub fn static_method(
        owner: TypeDescriptor,
        name: impl Into<String>,
        params: Vec<TypeDescriptor>,
        returns: TypeDescriptor,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::method(owner, name, params, returns)
        }
    }

    pub fn field(owner: TypeDescriptor, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            kind: OperationKind::Field,
            owner,
            name: name.into(),
            params: Vec::new(),
            returns: ty,
            is_static: false,
            declared_faults: BTreeSet::new(),
            context: ContextId::default(),
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_faults(mut self, faults: impl IntoIterator<Item = FaultKind>) -> Self {
        self.declared_faults.extend(faults);
        self
    }

    pub fn in_context(mut self, context: ContextId) -> Self {
        self.context = context;
        self
    }

    pub fn declares(&self, kind: &FaultKind) -> bool {
        self.declared_faults.contains(kind)
    }

    /// True if the operation needs a receiver operand
    pub fn has_receiver(&self) -> bool {
        self.kind != OperationKind::Constructor && !self.is_static
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    /// Context-independent identity of the operation
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        match self.kind {
            OperationKind::Constructor => format!("{}.<init>({})", self.owner, params.join(",")),
            OperationKind::Method => format!(
                "{}{}.{}({}){}",
                if self.is_static { "static " } else { "" },
                self.owner,
                self.name,
                params.join(","),
                self.returns
            ),
            OperationKind::Field => format!(
                "{}{}.{}:{}",
                if self.is_static { "static " } else { "" },
                self.owner,
                self.name,
                self.returns
            ),
        }
    }

    /// Equal up to the execution context and declared faults
    pub fn same_signature(&self, other: &OperationDescriptor) -> bool {
        self.kind == other.kind
            && self.owner == other.owner
            && self.name == other.name
            && self.params == other.params
            && self.returns == other.returns
            && self.is_static == other.is_static
    }

    /// Whether `other` can stand in for `self` without touching operands or the return slot
    pub fn accepts_replacement(&self, other: &OperationDescriptor) -> bool {
        self.kind == other.kind
            && self.owner == other.owner
            && self.is_static == other.is_static
            && self.params == other.params
            && self.returns == other.returns
            && !self.same_signature(other)
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Source of operation descriptors bound to one execution environment.
///
/// Re-running a program in a fresh sandbox means rebinding its statements to
/// the equivalent operations of the new context.
pub trait ExecutionContext {
    fn id(&self) -> ContextId;

    fn operations(&self) -> &[OperationDescriptor];

    /// Find the operation equivalent to `op` in this context
    fn resolve(&self, op: &OperationDescriptor) -> Option<OperationDescriptor> {
        self.operations()
            .iter()
            .find(|candidate| candidate.same_signature(op))
            .map(|candidate| candidate.clone().in_context(self.id()))
    }
}

/// In-memory list of known operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationCatalog {
    context: ContextId,
    operations: Vec<OperationDescriptor>,
}

impl OperationCatalog {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            operations: Vec::new(),
        }
    }

    pub fn with_operations(context: ContextId, operations: Vec<OperationDescriptor>) -> Self {
        let mut catalog = Self::new(context);
        for op in operations {
            catalog.add(op);
        }
        catalog
    }

    pub fn add(&mut self, op: OperationDescriptor) {
        let op = op.in_context(self.context);
        if !self.operations.iter().any(|known| known.same_signature(&op)) {
            self.operations.push(op);
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations that may replace `op` in a statement
    pub fn replacements_for<'a>(
        &'a self,
        op: &'a OperationDescriptor,
    ) -> impl Iterator<Item = &'a OperationDescriptor> + 'a {
        self.operations
            .iter()
            .filter(move |candidate| op.accepts_replacement(candidate))
    }

    /// Operations producing a value of type `ty`
    pub fn producers_of<'a>(
        &'a self,
        ty: &'a TypeDescriptor,
    ) -> impl Iterator<Item = &'a OperationDescriptor> + 'a {
        self.operations
            .iter()
            .filter(move |candidate| ty.is_assignable_from(&candidate.returns))
    }
}

impl ExecutionContext for OperationCatalog {
    fn id(&self) -> ContextId {
        self.context
    }

    fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }
}
