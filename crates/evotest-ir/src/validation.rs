//! Validation for test programs.

use crate::program::TestProgram;
use crate::reference::VariableReference;
use crate::statement::Statement;
use evotest_core::{Result, StructuralError};

/// Validate that a program is well-formed
pub fn validate_program(program: &TestProgram) -> Result<()> {
    for (index, statement) in program.statements().iter().enumerate() {
        if statement.position() != index {
            return Err(StructuralError::PositionMismatch {
                index,
                claimed: statement.position(),
            }
            .into());
        }
        validate_statement(program, statement)?;
    }
    Ok(())
}

/// Validate one statement against the program it belongs (or is about to belong) to.
///
/// Every reference other than the statement's own value must resolve to an
/// earlier statement producing a value of the same declared type.
pub fn validate_statement(program: &TestProgram, statement: &Statement) -> Result<()> {
    statement.is_valid()?;

    let position = statement.position();
    if statement.return_value().program() != program.id() {
        return Err(StructuralError::ForeignReference {
            statement: position,
        }
        .into());
    }

    let assertion_refs = statement.assertions().iter().flat_map(|a| a.references());
    for reference in statement.operands().into_iter().chain(assertion_refs) {
        if reference.position() == position {
            continue;
        }
        check_resolves(program, position, reference)?;
    }
    Ok(())
}

fn check_resolves(program: &TestProgram, statement: usize, reference: &VariableReference) -> Result<()> {
    let target = program.statement(reference.position())?;
    if target.return_value().ty() != reference.ty() {
        return Err(StructuralError::TypeMismatch {
            position: reference.position(),
            expected: reference.ty().to_string(),
            found: target.return_value().ty().to_string(),
        }
        .into());
    }
    if reference.program() != program.id() {
        return Err(StructuralError::ForeignReference { statement }.into());
    }
    Ok(())
}
