//! Test programs: ordered statement sequences.

use crate::assertion::Assertion;
use crate::codegen::SourceWriter;
use crate::mutation::{MutationFactory, MutationKind};
use crate::operation::{ExecutionContext, OperationDescriptor};
use crate::reference::VariableReference;
use crate::statement::{AssignTarget, Statement};
use crate::validation::{validate_program, validate_statement};
use crate::value::Literal;
use evotest_core::{FaultKind, ProgramId, Result, StructuralError, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A synthesized test: statement `i` sits at position `i`.
///
/// `Clone` keeps the program id; use [`TestProgram::duplicate`] for an
/// independent copy under a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestProgram {
    id: ProgramId,
    statements: Vec<Statement>,
}

impl TestProgram {
    pub fn new() -> Self {
        Self::with_id(ProgramId::new())
    }

    pub fn with_id(id: ProgramId) -> Self {
        Self {
            id,
            statements: Vec::new(),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn get(&self, position: usize) -> Option<&Statement> {
        self.statements.get(position)
    }

    pub fn statement(&self, position: usize) -> Result<&Statement> {
        self.statements.get(position).ok_or_else(|| {
            StructuralError::MissingPosition {
                position,
                len: self.len(),
            }
            .into()
        })
    }

    pub fn return_value(&self, position: usize) -> Result<VariableReference> {
        Ok(self.statement(position)?.return_value().clone())
    }

    /// Reference for a new statement appended at the end
    pub fn next_reference(&self, ty: TypeDescriptor) -> VariableReference {
        VariableReference::new(self.id, self.len(), ty)
    }

    /// Append a statement built for the next position
    pub fn push(&mut self, statement: Statement) -> Result<VariableReference> {
        if statement.position() != self.len() {
            return Err(StructuralError::PositionMismatch {
                index: self.len(),
                claimed: statement.position(),
            }
            .into());
        }
        validate_statement(self, &statement)?;
        let retval = statement.return_value().clone();
        self.statements.push(statement);
        Ok(retval)
    }

    pub fn add_constructor(
        &mut self,
        constructor: OperationDescriptor,
        args: Vec<VariableReference>,
    ) -> Result<VariableReference> {
        let retval = self.next_reference(constructor.owner.clone());
        self.push(Statement::constructor(retval, constructor, args)?)
    }

    pub fn add_method(
        &mut self,
        method: OperationDescriptor,
        callee: Option<VariableReference>,
        args: Vec<VariableReference>,
    ) -> Result<VariableReference> {
        let retval = self.next_reference(method.returns.clone());
        self.push(Statement::method(retval, method, callee, args)?)
    }

    pub fn add_field(
        &mut self,
        field: OperationDescriptor,
        receiver: Option<VariableReference>,
    ) -> Result<VariableReference> {
        let retval = self.next_reference(field.returns.clone());
        self.push(Statement::field(retval, field, receiver)?)
    }

    pub fn add_primitive(&mut self, value: Literal) -> Result<VariableReference> {
        let retval = self.next_reference(value.ty());
        self.push(Statement::primitive(retval, value)?)
    }

    pub fn add_null(&mut self, ty: TypeDescriptor) -> Result<VariableReference> {
        let retval = self.next_reference(ty);
        self.push(Statement::null(retval)?)
    }

    pub fn add_assignment(
        &mut self,
        target: AssignTarget,
        value: VariableReference,
    ) -> Result<VariableReference> {
        let retval = self.next_reference(TypeDescriptor::Void);
        self.push(Statement::assignment(retval, target, value)?)
    }

    /// Attach `assertion` to the statement at `position`
    pub fn add_assertion(&mut self, position: usize, assertion: Assertion) -> Result<bool> {
        let mut statement = self.statement(position)?.clone();
        if !statement.add_assertion(assertion)? {
            return Ok(false);
        }
        validate_statement(self, &statement)?;
        self.statements[position] = statement;
        Ok(true)
    }

    /// Insert `statement` at its own position, moving later statements back by one
    pub fn insert(&mut self, statement: Statement) -> Result<VariableReference> {
        let position = statement.position();
        if position > self.len() {
            return Err(StructuralError::MissingPosition {
                position,
                len: self.len(),
            }
            .into());
        }
        validate_statement(self, &statement)?;

        for later in &mut self.statements[position..] {
            later.shift(position, 1);
        }
        let retval = statement.return_value().clone();
        self.statements.insert(position, statement);
        tracing::trace!(position, len = self.len(), "inserted statement");
        Ok(retval)
    }

    /// Remove the statement at `position` and every statement depending on it.
    ///
    /// Assertions reading removed values are dropped. Returns the removed
    /// statements in program order, with their original positions.
    pub fn remove(&mut self, position: usize) -> Result<Vec<Statement>> {
        self.statement(position)?;

        let mut doomed = BTreeSet::from([position]);
        for statement in &self.statements[position + 1..] {
            if statement
                .operands()
                .iter()
                .any(|operand| doomed.contains(&operand.position()))
            {
                doomed.insert(statement.position());
            }
        }

        for statement in &mut self.statements[position + 1..] {
            if !doomed.contains(&statement.position()) {
                statement.drop_assertions_on(&doomed);
            }
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for &index in doomed.iter().rev() {
            removed.push(self.statements.remove(index));
            for later in &mut self.statements[index..] {
                later.shift(index + 1, -1);
            }
        }
        removed.reverse();

        tracing::debug!(position, removed = removed.len(), "removed statements");
        Ok(removed)
    }

    /// Rewrite every use of `old` after `new` with `new`, atomically
    pub fn replace_references(&mut self, old: &VariableReference, new: &VariableReference) -> Result<()> {
        let mut statements = self.statements.clone();
        for statement in statements.iter_mut().skip(new.position() + 1) {
            if statement.position() != old.position() {
                statement.replace(old, new)?;
            }
        }
        self.statements = statements;
        Ok(())
    }

    /// Values before `position` that may be stored where `required` is expected
    pub fn candidates(&self, position: usize, required: &TypeDescriptor) -> Vec<VariableReference> {
        self.statements
            .iter()
            .take(position)
            .map(|s| s.return_value())
            .filter(|r| required.is_assignable_from(r.ty()))
            .cloned()
            .collect()
    }

    /// Mutate the statement at `position`, keeping the original on failure.
    ///
    /// The clone taken before mutating doubles as the undo point: the result
    /// is written back only if it changed and still validates.
    pub fn mutate_at(&mut self, position: usize, factory: &mut dyn MutationFactory) -> Result<bool> {
        let mut candidate = self.statement(position)?.clone();
        if !candidate.mutate(self, factory) {
            return Ok(false);
        }
        if let Err(err) = validate_statement(self, &candidate) {
            tracing::warn!(position, error = %err, "discarding invalid mutation");
            return Ok(false);
        }
        self.statements[position] = candidate;
        Ok(true)
    }

    /// Offer every statement to the factory for mutation
    pub fn mutate(&mut self, factory: &mut dyn MutationFactory) -> Result<bool> {
        let len = self.len();
        let mut changed = false;
        for position in 0..len {
            if factory.attempt(MutationKind::Statement { program_len: len }) {
                changed |= self.mutate_at(position, factory)?;
            }
        }
        tracing::debug!(program = %self.id, changed, "mutated program");
        Ok(changed)
    }

    pub fn validate(&self) -> Result<()> {
        validate_program(self)
    }

    /// Statement-wise structural equivalence with another program
    pub fn same(&self, other: &TestProgram) -> bool {
        self.len() == other.len()
            && self
                .statements
                .iter()
                .zip(&other.statements)
                .all(|(a, b)| a.same(b))
    }

    /// Deep copy under a fresh program id
    pub fn duplicate(&self) -> Result<TestProgram> {
        let mut copy = TestProgram::new();
        copy.append(self)?;
        Ok(copy)
    }

    /// Copy all statements of `other` to the end of this program
    pub fn append(&mut self, other: &TestProgram) -> Result<()> {
        let offset = self.len() as isize;
        for statement in &other.statements {
            let copy = statement.copy(self, offset)?;
            self.push(copy)?;
        }
        Ok(())
    }

    /// Rebind every operation descriptor to `context`
    pub fn rebind(&mut self, context: &dyn ExecutionContext) -> Result<()> {
        let mut statements = self.statements.clone();
        for statement in &mut statements {
            statement.rebind(context)?;
        }
        self.statements = statements;
        Ok(())
    }

    /// Source text of the whole program; `faults` marks expected fault positions
    pub fn code(&self, faults: &BTreeMap<usize, FaultKind>) -> String {
        SourceWriter::default().program(self, faults)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let program: TestProgram = bincode::deserialize(bytes)?;
        program.validate()?;
        Ok(program)
    }
}

impl Default for TestProgram {
    fn default() -> Self {
        Self::new()
    }
}
