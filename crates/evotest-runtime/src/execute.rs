//! Running single statements and checking their assertions.

use crate::scope::Scope;
use crate::subject::{Invocation, Subject};
use evotest_core::{Result, SubjectFault};
use evotest_ir::assertion::FLOAT_DELTA;
use evotest_ir::statement::AssignTarget;
use evotest_ir::{Assertion, Literal, Statement, StatementKind, Value, VariableReference};

/// Capability to run against a subject, binding results in a scope
pub trait Execute {
    /// `Ok(Some(fault))` when the subject raised; the scope is then left
    /// without a binding for this statement.
    fn execute(&self, scope: &mut Scope, subject: &mut dyn Subject) -> Result<Option<SubjectFault>>;
}

fn resolve(scope: &Scope, refs: &[VariableReference]) -> Result<Vec<Value>> {
    refs.iter().map(|r| scope.lookup(r).cloned()).collect()
}

fn resolve_opt(scope: &Scope, var: Option<&VariableReference>) -> Result<Option<Value>> {
    var.map(|v| scope.lookup(v).cloned()).transpose()
}

impl Execute for Statement {
    fn execute(&self, scope: &mut Scope, subject: &mut dyn Subject) -> Result<Option<SubjectFault>> {
        let invocation = match self.kind() {
            StatementKind::Constructor(ctor) => {
                let args = resolve(scope, ctor.args())?;
                subject.invoke(ctor.constructor(), None, &args)?
            }
            StatementKind::Method(call) => {
                let receiver = resolve_opt(scope, call.callee())?;
                let args = resolve(scope, call.args())?;
                subject.invoke(call.method(), receiver.as_ref(), &args)?
            }
            StatementKind::Field(read) => {
                let receiver = resolve_opt(scope, read.receiver())?;
                subject.read_field(read.field(), receiver.as_ref())?
            }
            StatementKind::Primitive(literal) => Invocation::Returned(Value::from(literal.value())),
            StatementKind::Null(_) => Invocation::Returned(Value::Null),
            StatementKind::Assignment(assign) => {
                let value = scope.lookup(assign.value())?.clone();
                match assign.target() {
                    AssignTarget::Variable(var) => {
                        scope.lookup(var)?;
                        scope.bind(var.clone(), value);
                        Invocation::Returned(Value::Void)
                    }
                    AssignTarget::Field { receiver, field } => {
                        let receiver = resolve_opt(scope, receiver.as_ref())?;
                        subject.write_field(field, receiver.as_ref(), value)?
                    }
                }
            }
        };

        match invocation {
            Invocation::Returned(value) => {
                tracing::trace!(position = self.position(), ?value, "bound value");
                scope.bind(self.return_value().clone(), value);
                Ok(None)
            }
            Invocation::Raised(fault) => {
                let declared = self.is_declared_fault(&fault.kind);
                tracing::debug!(
                    position = self.position(),
                    kind = %fault.kind,
                    declared,
                    "captured subject fault"
                );
                Ok(Some(fault.declared(declared)))
            }
        }
    }
}

/// Capability to check a postcondition against the bindings of a run
pub trait Evaluate {
    /// True if the assertion holds
    fn evaluate(&self, scope: &Scope, subject: &mut dyn Subject) -> Result<bool>;
}

fn matches_literal(actual: &Value, expected: &Literal) -> bool {
    match (actual, expected) {
        (Value::Float(a), Literal::Float(e)) => ((*a as f64) - (*e as f64)).abs() <= FLOAT_DELTA,
        (Value::Double(a), Literal::Double(e)) => (a - e).abs() <= FLOAT_DELTA,
        _ => actual.as_literal().as_ref() == Some(expected),
    }
}

impl Evaluate for Assertion {
    fn evaluate(&self, scope: &Scope, subject: &mut dyn Subject) -> Result<bool> {
        let source = scope.lookup(self.source())?;
        let holds = match self {
            Assertion::Primitive { expected, .. } => matches_literal(source, expected),
            Assertion::Null { is_null, .. } => source.is_null() == *is_null,
            Assertion::Equals { other, equal, .. } => {
                let other = scope.lookup(other)?;
                subject.equals(source, other)? == *equal
            }
            Assertion::Inspector {
                inspector,
                expected,
                ..
            } => match subject.invoke(inspector, Some(source), &[])? {
                Invocation::Returned(value) => matches_literal(&value, expected),
                Invocation::Raised(_) => false,
            },
            Assertion::Field {
                field, expected, ..
            } => match subject.read_field(field, Some(source))? {
                Invocation::Returned(value) => matches_literal(&value, expected),
                Invocation::Raised(_) => false,
            },
        };
        Ok(holds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use evotest_core::{ContextId, Error, FaultKind, StructuralError, TypeDescriptor};
    use evotest_ir::TestProgram;

    fn run_all(program: &TestProgram, subject: &mut dyn Subject) -> (Scope, Vec<Option<SubjectFault>>) {
        let mut scope = Scope::new();
        let outcomes = program
            .statements()
            .iter()
            .map(|s| s.execute(&mut scope, subject).unwrap())
            .collect();
        (scope, outcomes)
    }

    #[test]
    fn test_zero_argument_constructor_binds_value() {
        let mut program = TestProgram::new();
        let retval = program.add_constructor(ledger_ctor(), vec![]).unwrap();
        let mut subject = bank_subject(ContextId::default());
        let mut scope = Scope::new();

        let fault = program.statement(0).unwrap().execute(&mut scope, &mut subject).unwrap();
        assert!(fault.is_none());
        assert!(matches!(scope.lookup(&retval).unwrap(), Value::Object(h) if h.ty == ledger()));
    }

    #[test]
    fn test_division_by_zero_is_captured() {
        let program = split_program(0);
        let mut subject = bank_subject(ContextId::default());
        let (scope, outcomes) = run_all(&program, &mut subject);

        let fault = outcomes[3].clone().unwrap();
        assert_eq!(fault.kind, FaultKind::Arithmetic);
        assert!(fault.declared);
        assert!(!scope.is_bound(&program.return_value(3).unwrap()));
        assert!(outcomes[..3].iter().all(Option::is_none));
    }

    #[test]
    fn test_undeclared_fault_is_flagged() {
        let mut program = TestProgram::new();
        let account_value = program.add_null(account()).unwrap();
        program.add_method(balance(), Some(account_value), vec![]).unwrap();
        let mut subject = bank_subject(ContextId::default());
        let (_, outcomes) = run_all(&program, &mut subject);

        let fault = outcomes[1].clone().unwrap();
        assert_eq!(fault.kind, FaultKind::NullPointer);
        assert!(!fault.declared);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let program = split_program(0);
        let mut first = bank_subject(ContextId::default());
        let mut second = first.fork();
        let (_, a) = run_all(&program, &mut first);
        let (_, b) = run_all(&program, &mut second);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unbound_operand_is_structural() {
        let program = split_program(2);
        let mut subject = bank_subject(ContextId::default());
        let mut scope = Scope::new();
        let err = program
            .statement(3)
            .unwrap()
            .execute(&mut scope, &mut subject)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Structural(StructuralError::UnboundReference { .. })
        ));
    }

    #[test]
    fn test_infrastructure_fault_propagates() {
        let mut program = TestProgram::new();
        let amount = program.add_primitive(Literal::Int(1)).unwrap();
        let account_value = program.add_constructor(account_ctor(), vec![amount]).unwrap();
        program.add_method(audit(), Some(account_value), vec![]).unwrap();
        let mut subject = bank_subject(ContextId::default());
        let mut scope = Scope::new();
        for position in 0..2 {
            program
                .statement(position)
                .unwrap()
                .execute(&mut scope, &mut subject)
                .unwrap();
        }
        let err = program
            .statement(2)
            .unwrap()
            .execute(&mut scope, &mut subject)
            .unwrap_err();
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_assignment_rebinds_variable() {
        let mut program = TestProgram::new();
        let a = program.add_primitive(Literal::Int(1)).unwrap();
        let b = program.add_primitive(Literal::Int(2)).unwrap();
        program
            .add_assignment(AssignTarget::Variable(a.clone()), b)
            .unwrap();
        let mut subject = bank_subject(ContextId::default());
        let (scope, outcomes) = run_all(&program, &mut subject);
        assert!(outcomes.iter().all(Option::is_none));
        assert_eq!(scope.lookup(&a).unwrap(), &Value::Int(2));
        assert_eq!(
            scope.lookup(&program.return_value(2).unwrap()).unwrap(),
            &Value::Void
        );
    }

    #[test]
    fn test_field_assignment_and_read() {
        let mut program = TestProgram::new();
        let amount = program.add_primitive(Literal::Int(4)).unwrap();
        let account_value = program.add_constructor(account_ctor(), vec![amount]).unwrap();
        let nine = program.add_primitive(Literal::Int(9)).unwrap();
        program
            .add_assignment(
                AssignTarget::Field {
                    receiver: Some(account_value.clone()),
                    field: balance_field(),
                },
                nine,
            )
            .unwrap();
        let read = program.add_field(balance_field(), Some(account_value)).unwrap();

        let mut subject = bank_subject(ContextId::default());
        let (scope, _) = run_all(&program, &mut subject);
        assert_eq!(scope.lookup(&read).unwrap(), &Value::Int(9));
    }

    #[test]
    fn test_assertions_evaluate_against_scope() {
        let program = split_program(2);
        let mut subject = bank_subject(ContextId::default());
        let (scope, _) = run_all(&program, &mut subject);
        let half = program.return_value(3).unwrap();
        let account_value = program.return_value(1).unwrap();

        let checks = [
            (Assertion::primitive(half.clone(), Literal::Int(5)), true),
            (Assertion::primitive(half.clone(), Literal::Int(6)), false),
            (Assertion::null(account_value.clone(), false), true),
            (Assertion::inspector(account_value.clone(), balance(), Literal::Int(10)), true),
            (Assertion::field(account_value.clone(), balance_field(), Literal::Int(10)), true),
            (Assertion::equals(account_value.clone(), account_value, true), true),
        ];
        for (assertion, expected) in checks {
            assert_eq!(
                assertion.evaluate(&scope, &mut subject).unwrap(),
                expected,
                "{}",
                assertion.code()
            );
        }

        let unbound = VariableReference::new(program.id(), 9, TypeDescriptor::Int);
        assert!(Assertion::null(unbound, true)
            .evaluate(&scope, &mut subject)
            .unwrap_err()
            .is_structural());
    }

    #[test]
    fn test_float_assertions_use_delta() {
        assert!(matches_literal(&Value::Double(1.004), &Literal::Double(1.0)));
        assert!(!matches_literal(&Value::Double(1.2), &Literal::Double(1.0)));
        assert!(matches_literal(&Value::Float(2.001), &Literal::Float(2.0)));
        assert!(!matches_literal(&Value::Int(1), &Literal::Long(1)));
    }
}
