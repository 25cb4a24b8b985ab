//! Statements: the instructions of a test program.
//!
//! A [`Statement`] pairs a return-value reference with one variant of the
//! closed [`StatementKind`] set. Everything that is common to all variants
//! (reference rewriting, copying, comparison, mutation, code generation,
//! assertions) lives here and dispatches on the variant with [`dispatch!`].
//!
//! Invariants, checked by [`Statement::is_valid`]:
//! - the return value sits at the statement's own position;
//! - every operand refers to a strictly earlier position of the same program;
//! - assertions refer to earlier positions or to the statement's own value.

mod assignment;
mod constructor;
mod field;
mod method;
mod primitive;

pub use assignment::{AssignTarget, AssignmentStatement};
pub use constructor::ConstructorStatement;
pub use field::FieldStatement;
pub use method::MethodStatement;
pub use primitive::{NullStatement, PrimitiveStatement};

use crate::assertion::Assertion;
use crate::codegen::{BytecodeEmitter, Lowered, LoweredOp, SourceWriter};
use crate::mutation::{MutationFactory, MutationKind};
use crate::operation::{ExecutionContext, OperationDescriptor};
use crate::program::TestProgram;
use crate::reference::VariableReference;
use crate::value::Literal;
use evotest_core::{Error, FaultKind, Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Behaviour each statement variant supplies to the shared contract
pub(crate) trait Variant {
    /// Operands in evaluation order, receiver first
    fn operands(&self) -> Vec<&VariableReference>;

    fn operands_mut(&mut self) -> Vec<&mut VariableReference>;

    /// Operands mutation may rewire, with the type each slot requires
    fn mutable_operands(&mut self) -> Vec<(TypeDescriptor, &mut VariableReference)>;

    fn operation(&self) -> Option<&OperationDescriptor> {
        None
    }

    fn operation_mut(&mut self) -> Option<&mut OperationDescriptor> {
        None
    }

    fn return_type(&self) -> TypeDescriptor;

    /// Operand types and arity against the operation
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn same(&self, other: &Self) -> bool;

    fn lower(&self) -> LoweredOp<'_>;
}

macro_rules! dispatch {
    ($kind:expr, $v:ident => $body:expr) => {
        match $kind {
            StatementKind::Constructor($v) => $body,
            StatementKind::Method($v) => $body,
            StatementKind::Field($v) => $body,
            StatementKind::Primitive($v) => $body,
            StatementKind::Null($v) => $body,
            StatementKind::Assignment($v) => $body,
        }
    };
}

/// The closed set of statement variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    Constructor(ConstructorStatement),
    Method(MethodStatement),
    Field(FieldStatement),
    Primitive(PrimitiveStatement),
    Null(NullStatement),
    Assignment(AssignmentStatement),
}

impl StatementKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Constructor(_) => "constructor",
            StatementKind::Method(_) => "method",
            StatementKind::Field(_) => "field",
            StatementKind::Primitive(_) => "primitive",
            StatementKind::Null(_) => "null",
            StatementKind::Assignment(_) => "assignment",
        }
    }

    pub fn return_type(&self) -> TypeDescriptor {
        dispatch!(self, v => v.return_type())
    }

    fn same(&self, other: &StatementKind) -> bool {
        match (self, other) {
            (StatementKind::Constructor(a), StatementKind::Constructor(b)) => a.same(b),
            (StatementKind::Method(a), StatementKind::Method(b)) => a.same(b),
            (StatementKind::Field(a), StatementKind::Field(b)) => a.same(b),
            (StatementKind::Primitive(a), StatementKind::Primitive(b)) => a.same(b),
            (StatementKind::Null(a), StatementKind::Null(b)) => a.same(b),
            (StatementKind::Assignment(a), StatementKind::Assignment(b)) => a.same(b),
            _ => false,
        }
    }
}

/// One instruction of a test program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    retval: VariableReference,
    kind: StatementKind,
    assertions: Vec<Assertion>,
}

impl Statement {
    pub fn new(retval: VariableReference, kind: StatementKind) -> Result<Self> {
        let statement = Self {
            retval,
            kind,
            assertions: Vec::new(),
        };
        statement.is_valid()?;
        Ok(statement)
    }

    pub fn constructor(
        retval: VariableReference,
        constructor: OperationDescriptor,
        args: Vec<VariableReference>,
    ) -> Result<Self> {
        let kind = StatementKind::Constructor(ConstructorStatement::new(constructor, args)?);
        Self::new(retval, kind)
    }

    pub fn method(
        retval: VariableReference,
        method: OperationDescriptor,
        callee: Option<VariableReference>,
        args: Vec<VariableReference>,
    ) -> Result<Self> {
        let kind = StatementKind::Method(MethodStatement::new(method, callee, args)?);
        Self::new(retval, kind)
    }

    pub fn field(
        retval: VariableReference,
        field: OperationDescriptor,
        receiver: Option<VariableReference>,
    ) -> Result<Self> {
        let kind = StatementKind::Field(FieldStatement::new(field, receiver)?);
        Self::new(retval, kind)
    }

    pub fn primitive(retval: VariableReference, value: Literal) -> Result<Self> {
        Self::new(retval, StatementKind::Primitive(PrimitiveStatement::new(value)))
    }

    pub fn null(retval: VariableReference) -> Result<Self> {
        let kind = StatementKind::Null(NullStatement::new(retval.ty().clone())?);
        Self::new(retval, kind)
    }

    pub fn assignment(
        retval: VariableReference,
        target: AssignTarget,
        value: VariableReference,
    ) -> Result<Self> {
        let kind = StatementKind::Assignment(AssignmentStatement::new(target, value)?);
        Self::new(retval, kind)
    }

    pub fn position(&self) -> usize {
        self.retval.position()
    }

    pub fn return_value(&self) -> &VariableReference {
        &self.retval
    }

    pub fn return_type(&self) -> &TypeDescriptor {
        self.retval.ty()
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Move the statement to the position of `retval`; operands must stay behind it
    pub fn set_return_value(&mut self, retval: VariableReference) -> Result<()> {
        let previous = std::mem::replace(&mut self.retval, retval);
        if let Err(err) = self.is_valid() {
            self.retval = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Operands in evaluation order, receiver first
    pub fn operands(&self) -> Vec<&VariableReference> {
        dispatch!(&self.kind, v => v.operands())
    }

    fn operands_mut(&mut self) -> Vec<&mut VariableReference> {
        dispatch!(&mut self.kind, v => v.operands_mut())
    }

    /// Operands without duplicates, first occurrence order
    pub fn unique_operands(&self) -> Vec<&VariableReference> {
        let mut unique: Vec<&VariableReference> = Vec::new();
        for operand in self.operands() {
            if !unique.contains(&operand) {
                unique.push(operand);
            }
        }
        unique
    }

    /// The return value followed by the unique operands
    pub fn variable_references(&self) -> Vec<&VariableReference> {
        let mut refs = vec![&self.retval];
        refs.extend(self.unique_operands());
        refs
    }

    /// True if `var` is this statement's value or one of its operands
    pub fn references(&self, var: &VariableReference) -> bool {
        self.retval == *var || self.depends_on(var)
    }

    /// True if one of the operands is `var`
    pub fn depends_on(&self, var: &VariableReference) -> bool {
        self.operands().into_iter().any(|operand| operand == var)
    }

    /// Rewrite every use of `old` in the operands and assertions with `new`.
    ///
    /// Leaves the statement untouched when the rewrite would break the
    /// no-forward-reference invariant.
    pub fn replace(&mut self, old: &VariableReference, new: &VariableReference) -> Result<()> {
        let position = self.position();
        if old.position() == position {
            return Err(StructuralError::SelfReference {
                statement: position,
            }
            .into());
        }
        let in_operands = self.depends_on(old);
        let in_assertions = self.assertions.iter().any(|a| a.references_var(old));
        if !in_operands && !in_assertions {
            return Ok(());
        }
        if in_operands {
            self.check_replacement(old, new)?;
        }
        if new.program() != self.retval.program() {
            return Err(StructuralError::ForeignReference {
                statement: position,
            }
            .into());
        }
        if in_operands && new.position() == position {
            return Err(StructuralError::SelfReference {
                statement: position,
            }
            .into());
        }
        if new.position() > position {
            return Err(StructuralError::ForwardReference {
                statement: position,
                operand: new.position(),
            }
            .into());
        }

        for operand in self.operands_mut() {
            if *operand == *old {
                *operand = new.clone();
            }
        }
        for assertion in &mut self.assertions {
            *assertion = assertion.map_references(|r| {
                Ok(if r == old { new.clone() } else { r.clone() })
            })?;
        }
        Ok(())
    }

    /// Fail unless every slot holding `old` also accepts `new`
    fn check_replacement(&self, old: &VariableReference, new: &VariableReference) -> Result<()> {
        let mut candidate = self.kind.clone();
        for operand in dispatch!(&mut candidate, v => v.operands_mut()) {
            if *operand == *old {
                *operand = new.clone();
            }
        }
        dispatch!(&candidate, v => v.check())
    }

    /// Renumber references for an insertion or removal at `from`
    pub(crate) fn shift(&mut self, from: usize, delta: isize) {
        self.retval = self.retval.shifted(from, delta);
        for operand in self.operands_mut() {
            *operand = operand.shifted(from, delta);
        }
        for assertion in &mut self.assertions {
            for reference in assertion.references_mut() {
                *reference = reference.shifted(from, delta);
            }
        }
    }

    /// Check the statement-local invariants
    pub fn is_valid(&self) -> Result<()> {
        dispatch!(&self.kind, v => v.check())?;
        let position = self.position();
        let expected = self.kind.return_type();
        if *self.retval.ty() != expected {
            return Err(StructuralError::TypeMismatch {
                position,
                expected: expected.to_string(),
                found: self.retval.ty().to_string(),
            }
            .into());
        }

        for operand in self.operands() {
            if operand.program() != self.retval.program() {
                return Err(StructuralError::ForeignReference {
                    statement: position,
                }
                .into());
            }
            if operand.position() == position {
                return Err(StructuralError::SelfReference {
                    statement: position,
                }
                .into());
            }
            if operand.position() > position {
                return Err(StructuralError::ForwardReference {
                    statement: position,
                    operand: operand.position(),
                }
                .into());
            }
        }

        for reference in self.assertions.iter().flat_map(|a| a.references()) {
            if reference.program() != self.retval.program() {
                return Err(StructuralError::ForeignReference {
                    statement: position,
                }
                .into());
            }
            if reference.position() > position {
                return Err(StructuralError::ForwardReference {
                    statement: position,
                    operand: reference.position(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn operation(&self) -> Option<&OperationDescriptor> {
        dispatch!(&self.kind, v => v.operation())
    }

    pub fn declared_faults(&self) -> BTreeSet<FaultKind> {
        self.operation()
            .map(|op| op.declared_faults.clone())
            .unwrap_or_default()
    }

    pub fn is_declared_fault(&self, kind: &FaultKind) -> bool {
        self.operation().map_or(false, |op| op.declares(kind))
    }

    pub fn is_assignment(&self) -> bool {
        matches!(self.kind, StatementKind::Assignment(_))
    }

    /// Position and declared-type equivalence, usable across programs.
    ///
    /// Operations are compared by signature, literals by value.
    pub fn same(&self, other: &Statement) -> bool {
        self.retval.same(&other.retval) && self.kind.same(&other.kind)
    }

    /// Deep copy into `program`, keeping positions
    pub fn clone_into(&self, program: &TestProgram) -> Result<Statement> {
        self.copy(program, 0)
    }

    /// Deep copy into `program`, shifted by `offset` positions.
    ///
    /// Every operand is re-pointed at the return value of the destination
    /// statement `offset` positions away from the original.
    pub fn copy(&self, program: &TestProgram, offset: isize) -> Result<Statement> {
        let relocation = Relocation::new(self, program, offset)?;

        let mut copy = self.clone();
        copy.retval = relocation.retval.clone();
        for operand in copy.operands_mut() {
            *operand = relocation.resolve(operand)?;
        }
        copy.assertions = self.copy_assertions(program, offset)?;
        copy.is_valid()?;
        Ok(copy)
    }

    /// Deep copies of the attached assertions, relocated like [`Statement::copy`]
    pub fn copy_assertions(&self, program: &TestProgram, offset: isize) -> Result<Vec<Assertion>> {
        let relocation = Relocation::new(self, program, offset)?;
        self.assertions
            .iter()
            .map(|assertion| assertion.map_references(|r| relocation.resolve(r)))
            .collect()
    }

    /// Apply one local mutation. Returns true iff the statement changed.
    ///
    /// Candidates come from `factory`; any candidate that would create a
    /// forward reference or change a required type is ignored.
    pub fn mutate(&mut self, program: &TestProgram, factory: &mut dyn MutationFactory) -> bool {
        let position = self.position();

        match &mut self.kind {
            StatementKind::Primitive(primitive) => {
                return match factory.regenerate_literal(&primitive.value) {
                    Some(value) => primitive.set_value(value),
                    None => false,
                };
            }
            StatementKind::Null(_) => return false,
            _ => {}
        }

        let mut changed = false;

        if factory.attempt(MutationKind::SwapOperation) {
            if let Some(op) = dispatch!(&mut self.kind, v => v.operation_mut()) {
                if let Some(candidate) = factory.compatible_operation(op) {
                    if op.accepts_replacement(&candidate) {
                        tracing::trace!(from = %op, to = %candidate, "swapping operation");
                        *op = candidate;
                        changed = true;
                    }
                }
            }
        }

        let slots = dispatch!(&mut self.kind, v => v.mutable_operands());
        for (required, slot) in slots {
            if !factory.attempt(MutationKind::ReplaceOperand) {
                continue;
            }
            let Some(candidate) = factory.candidate_operand(program, position, &required, slot)
            else {
                continue;
            };
            if candidate.position() < position
                && candidate.program() == slot.program()
                && required.is_assignable_from(candidate.ty())
                && candidate != *slot
            {
                *slot = candidate;
                changed = true;
            }
        }

        changed
    }

    /// The single description both code generators render
    pub fn lower(&self) -> Lowered<'_> {
        Lowered {
            op: dispatch!(&self.kind, v => v.lower()),
            operands: self.operands(),
            result: &self.retval,
        }
    }

    /// Source text; a pending fault turns it into a protective block
    pub fn code(&self, pending: Option<&FaultKind>) -> String {
        SourceWriter::default().statement(self, pending)
    }

    /// Append the instruction-stream form to `emitter`
    pub fn emit_bytecode(
        &self,
        emitter: &mut BytecodeEmitter,
        pending: Option<&FaultKind>,
    ) -> Result<()> {
        emitter.emit(&self.lower(), pending)
    }

    /// Re-resolve operation descriptors under another execution context
    pub fn rebind(&mut self, context: &dyn ExecutionContext) -> Result<()> {
        let resolve = |op: &OperationDescriptor| {
            context
                .resolve(op)
                .ok_or_else(|| Error::NoEquivalentOperation(op.signature()))
        };

        let own = self.operation().map(resolve).transpose()?;
        let mut assertions = self.assertions.clone();
        for assertion in &mut assertions {
            if let Some(op) = assertion.operation_mut() {
                *op = resolve(&*op)?;
            }
        }

        if let (Some(op), Some(resolved)) = (dispatch!(&mut self.kind, v => v.operation_mut()), own) {
            *op = resolved;
        }
        self.assertions = assertions;
        Ok(())
    }

    pub fn has_assertions(&self) -> bool {
        !self.assertions.is_empty()
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Attach an assertion. Returns false if an equal one is already attached.
    pub fn add_assertion(&mut self, assertion: Assertion) -> Result<bool> {
        if self.assertions.contains(&assertion) {
            return Ok(false);
        }
        self.assertions.push(assertion);
        if let Err(err) = self.is_valid() {
            self.assertions.pop();
            return Err(err);
        }
        Ok(true)
    }

    pub fn set_assertions(&mut self, assertions: Vec<Assertion>) -> Result<()> {
        let previous = std::mem::take(&mut self.assertions);
        for assertion in assertions {
            if let Err(err) = self.add_assertion(assertion) {
                self.assertions = previous;
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn remove_assertion(&mut self, assertion: &Assertion) -> bool {
        let before = self.assertions.len();
        self.assertions.retain(|a| a != assertion);
        self.assertions.len() != before
    }

    pub fn remove_assertions(&mut self) {
        self.assertions.clear();
    }

    /// Drop assertions reading any of `positions`
    pub(crate) fn drop_assertions_on(&mut self, positions: &BTreeSet<usize>) {
        self.assertions
            .retain(|a| !a.references().iter().any(|r| positions.contains(&r.position())));
    }

    /// Source text of all attached assertions, one per line
    pub fn assertion_code(&self) -> String {
        let writer = SourceWriter::default();
        self.assertions
            .iter()
            .map(|assertion| writer.assertion(assertion))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fail unless `operand` may be passed where `required` is expected
pub(crate) fn check_operand(required: &TypeDescriptor, operand: &VariableReference) -> Result<()> {
    if required == operand.ty() || required.is_assignable_from(operand.ty()) {
        return Ok(());
    }
    Err(StructuralError::TypeMismatch {
        position: operand.position(),
        expected: required.to_string(),
        found: operand.ty().to_string(),
    }
    .into())
}

pub(crate) fn check_arguments(op: &OperationDescriptor, args: &[VariableReference]) -> Result<()> {
    if op.params.len() != args.len() {
        return Err(StructuralError::ArityMismatch {
            operation: op.signature(),
            expected: op.params.len(),
            found: args.len(),
        }
        .into());
    }
    for (param, arg) in op.params.iter().zip(args) {
        check_operand(param, arg)?;
    }
    Ok(())
}

/// Exact structural identity: variant, operation (including its context),
/// literal, positions and the owning program of every reference.
impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        let operands = self.operands();
        let other_operands = other.operands();
        self.kind == other.kind
            && self.retval.identical(&other.retval)
            && operands.len() == other_operands.len()
            && operands
                .iter()
                .zip(&other_operands)
                .all(|(a, b)| a.identical(b))
    }
}

/// Maps references of a statement onto a destination program
struct Relocation<'a> {
    program: &'a TestProgram,
    offset: isize,
    source_position: usize,
    retval: VariableReference,
}

impl<'a> Relocation<'a> {
    fn new(statement: &Statement, program: &'a TestProgram, offset: isize) -> Result<Self> {
        let position = statement.position() as isize + offset;
        if position < 0 {
            return Err(StructuralError::NegativePosition {
                position,
                len: program.len(),
            }
            .into());
        }
        Ok(Self {
            program,
            offset,
            source_position: statement.position(),
            retval: VariableReference::new(
                program.id(),
                position as usize,
                statement.return_type().clone(),
            ),
        })
    }

    fn resolve(&self, reference: &VariableReference) -> Result<VariableReference> {
        if reference.position() == self.source_position {
            return Ok(self.retval.clone());
        }
        let target = reference.position() as isize + self.offset;
        if target < 0 {
            return Err(StructuralError::NegativePosition {
                position: target,
                len: self.program.len(),
            }
            .into());
        }
        if target as usize >= self.program.len() {
            return Err(StructuralError::MissingPosition {
                position: target as usize,
                len: self.program.len(),
            }
            .into());
        }
        let target = target as usize;
        if target >= self.retval.position() {
            return Err(StructuralError::ForwardReference {
                statement: self.retval.position(),
                operand: target,
            }
            .into());
        }
        let destination = self.program.statement(target)?.return_value();
        if !(destination.ty() == reference.ty() || reference.ty().is_assignable_from(destination.ty())) {
            return Err(StructuralError::TypeMismatch {
                position: target,
                expected: reference.ty().to_string(),
                found: destination.ty().to_string(),
            }
            .into());
        }
        Ok(destination.clone())
    }
}

#[cfg(test)]
mod tests;
