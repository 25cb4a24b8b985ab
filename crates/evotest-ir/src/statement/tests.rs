use super::*;
use crate::mutation::RandomMutationFactory;
use crate::operation::OperationCatalog;
use crate::testing::*;
use evotest_core::{ContextId, MutationConfig};
use proptest::prelude::*;

/// Factory that always mutates and picks the first candidate offered
struct FirstCandidate {
    catalog: OperationCatalog,
}

impl MutationFactory for FirstCandidate {
    fn attempt(&mut self, _kind: MutationKind) -> bool {
        true
    }

    fn candidate_operand(
        &mut self,
        program: &TestProgram,
        position: usize,
        required: &TypeDescriptor,
        current: &VariableReference,
    ) -> Option<VariableReference> {
        program
            .candidates(position, required)
            .into_iter()
            .find(|c| c != current)
    }

    fn regenerate_literal(&mut self, current: &Literal) -> Option<Literal> {
        match current {
            Literal::Int(v) => Some(Literal::Int(v.wrapping_add(1))),
            _ => None,
        }
    }

    fn compatible_operation(&mut self, current: &OperationDescriptor) -> Option<OperationDescriptor> {
        self.catalog.replacements_for(current).next().cloned()
    }
}

/// Factory proposing one fixed operand regardless of position
struct Proposing(VariableReference);

impl MutationFactory for Proposing {
    fn attempt(&mut self, kind: MutationKind) -> bool {
        kind == MutationKind::ReplaceOperand
    }

    fn candidate_operand(
        &mut self,
        _program: &TestProgram,
        _position: usize,
        _required: &TypeDescriptor,
        _current: &VariableReference,
    ) -> Option<VariableReference> {
        Some(self.0.clone())
    }

    fn regenerate_literal(&mut self, _current: &Literal) -> Option<Literal> {
        None
    }

    fn compatible_operation(&mut self, _current: &OperationDescriptor) -> Option<OperationDescriptor> {
        None
    }
}

fn first_candidate() -> FirstCandidate {
    FirstCandidate {
        catalog: account_catalog(ContextId::default()),
    }
}

#[test]
fn test_return_value_sits_at_position() {
    let program = account_program();
    for (index, statement) in program.statements().iter().enumerate() {
        assert_eq!(statement.return_value().position(), index);
        assert!(statement.is_valid().is_ok());
    }
}

#[test]
fn test_constructor_checks_arguments() {
    let program = account_program();
    let retval = program.next_reference(account());
    let wrong = program.return_value(1).unwrap();

    let arity = Statement::constructor(retval.clone(), account_ctor(), vec![]);
    assert!(matches!(
        arity,
        Err(Error::Structural(StructuralError::ArityMismatch { expected: 1, found: 0, .. }))
    ));
    let typed = Statement::constructor(retval.clone(), account_ctor(), vec![wrong]);
    assert!(matches!(
        typed,
        Err(Error::Structural(StructuralError::TypeMismatch { .. }))
    ));
    let kind = Statement::constructor(retval, deposit(), vec![]);
    assert!(matches!(
        kind,
        Err(Error::Structural(StructuralError::KindMismatch { .. }))
    ));
}

#[test]
fn test_method_requires_receiver() {
    let program = account_program();
    let retval = program.next_reference(TypeDescriptor::Int);
    let missing = Statement::method(retval, balance(), None, vec![]);
    assert!(matches!(
        missing,
        Err(Error::Structural(StructuralError::ArityMismatch { .. }))
    ));
}

#[test]
fn test_null_rejects_primitive_type() {
    let program = account_program();
    assert!(Statement::null(program.next_reference(TypeDescriptor::Int)).is_err());
    assert!(Statement::null(program.next_reference(account())).is_ok());
}

#[test]
fn test_forward_and_self_references_are_rejected() {
    let program = account_program();
    let later = VariableReference::new(program.id(), 4, TypeDescriptor::Int);
    let retval = VariableReference::new(program.id(), 2, account());
    assert!(matches!(
        Statement::constructor(retval, account_ctor(), vec![later]),
        Err(Error::Structural(StructuralError::ForwardReference { statement: 2, operand: 4 }))
    ));

    let own = VariableReference::new(program.id(), 2, TypeDescriptor::Int);
    let retval = VariableReference::new(program.id(), 2, account());
    assert!(matches!(
        Statement::constructor(retval, account_ctor(), vec![own]),
        Err(Error::Structural(StructuralError::SelfReference { statement: 2 }))
    ));
}

#[test]
fn test_operand_queries() {
    let program = account_program();
    let deposit_call = program.statement(2).unwrap();
    let account_ref = program.return_value(1).unwrap();
    let amount = program.return_value(0).unwrap();

    assert_eq!(deposit_call.operands(), vec![&account_ref, &amount]);
    assert!(deposit_call.references(&amount));
    assert!(deposit_call.references(deposit_call.return_value()));
    assert!(!deposit_call.depends_on(deposit_call.return_value()));
    assert!(!deposit_call.references(&program.return_value(4).unwrap()));
    assert_eq!(deposit_call.variable_references().len(), 3);
}

#[test]
fn test_unique_operands_dedupes() {
    let mut program = TestProgram::new();
    let amount = program.add_primitive(Literal::Int(1)).unwrap();
    let account_ref = program.add_constructor(account_ctor(), vec![amount.clone()]).unwrap();
    let pair = OperationDescriptor::method(
        account(),
        "transfer",
        vec![TypeDescriptor::Int, TypeDescriptor::Int],
        TypeDescriptor::Void,
    );
    program
        .add_method(pair, Some(account_ref), vec![amount.clone(), amount])
        .unwrap();
    let call = program.statement(2).unwrap();
    assert_eq!(call.operands().len(), 3);
    assert_eq!(call.unique_operands().len(), 2);
}

#[test]
fn test_replace_rewires_operands_and_assertions() {
    let mut program = account_program();
    let old = program.return_value(0).unwrap();
    let new = program.add_primitive(Literal::Int(11)).unwrap();
    let account_ref = program.return_value(1).unwrap();
    program.add_method(deposit(), Some(account_ref), vec![old.clone()]).unwrap();
    let last = program.len() - 1;
    program
        .add_assertion(last, Assertion::equals(new.clone(), old.clone(), false))
        .unwrap();

    let mut statement = program.statement(last).unwrap().clone();
    statement.replace(&old, &new).unwrap();

    assert!(!statement.references(&old));
    assert!(statement.depends_on(&new));
    assert!(statement
        .assertions()
        .iter()
        .all(|a| !a.references_var(&old)));
    assert!(statement.is_valid().is_ok());
}

#[test]
fn test_replace_unused_reference_is_noop() {
    let program = account_program();
    let mut statement = program.statement(3).unwrap().clone();
    let before = statement.clone();
    let unused = program.return_value(4).unwrap();
    let other = program.return_value(0).unwrap();
    statement.replace(&unused, &other).unwrap();
    assert_eq!(statement, before);
}

#[test]
fn test_replace_rejects_forward_and_self() {
    let program = account_program();
    let mut statement = program.statement(2).unwrap().clone();
    let before = statement.clone();
    let amount = program.return_value(0).unwrap();

    let forward = VariableReference::new(program.id(), 4, TypeDescriptor::Int);
    assert!(matches!(
        statement.replace(&amount, &forward),
        Err(Error::Structural(StructuralError::ForwardReference { .. }))
    ));
    let own = VariableReference::new(program.id(), 2, TypeDescriptor::Int);
    assert!(matches!(
        statement.replace(&amount, &own),
        Err(Error::Structural(StructuralError::SelfReference { .. }))
    ));
    let own_value = statement.return_value().clone();
    assert!(statement.replace(&own_value, &amount).is_err());
    assert_eq!(statement, before);
}

#[test]
fn test_replace_rejects_incompatible_type() {
    let mut program = account_program();
    let text = program.add_primitive(Literal::Str("x".to_string())).unwrap();
    let amount = program.return_value(0).unwrap();
    let account_ref = program.return_value(1).unwrap();
    program.add_method(deposit(), Some(account_ref.clone()), vec![amount.clone()]).unwrap();
    let mut statement = program.statement(program.len() - 1).unwrap().clone();
    let before = statement.clone();

    assert!(matches!(
        statement.replace(&amount, &text),
        Err(Error::Structural(StructuralError::TypeMismatch { .. }))
    ));
    // the receiver slot wants an Account, not an int
    assert!(statement.replace(&account_ref, &amount).is_err());
    assert_eq!(statement, before);
    assert!(statement.is_valid().is_ok());
}

#[test]
fn test_is_valid_rechecks_operand_types() {
    let program = account_program();
    let statement = program.statement(2).unwrap();
    let mut json = serde_json::to_value(statement).unwrap();
    // retype the deposit amount as a string
    json["kind"]["Method"]["args"][0]["ty"] = serde_json::to_value(TypeDescriptor::Str).unwrap();
    let tampered: Statement = serde_json::from_value(json).unwrap();
    assert!(matches!(
        tampered.is_valid(),
        Err(Error::Structural(StructuralError::TypeMismatch { .. }))
    ));
}

#[test]
fn test_char_literal_must_fit_one_code_unit() {
    let mut program = TestProgram::new();
    assert!(matches!(
        program.add_primitive(Literal::Char('\u{1F600}')),
        Err(Error::Structural(StructuralError::InvalidLiteral { .. }))
    ));
    assert!(program.is_empty());

    let letter = program.add_primitive(Literal::Char('\u{FFFD}')).unwrap();
    assert_eq!(
        program.statement(letter.position()).unwrap().code(None),
        "char var0 = '\u{FFFD}';"
    );
}

#[test]
fn test_clone_is_same_and_equal_and_independent() {
    let program = account_program();
    let original = program.statement(2).unwrap().clone();
    let mut copy = original.clone();
    assert_eq!(copy, original);
    assert!(copy.same(&original));

    assert!(copy.mutate(&program, &mut first_candidate()));
    assert_ne!(copy, original);
    assert_eq!(program.statement(2).unwrap(), &original);
    assert_eq!(original.operation().map(|op| op.name.as_str()), Some("deposit"));
}

#[test]
fn test_clone_into_other_program() {
    let source = account_program();
    let destination = account_program();
    let statement = source.statement(2).unwrap();

    let copy = statement.clone_into(&destination).unwrap();
    assert!(copy.same(statement));
    assert_ne!(&copy, statement);
    assert_eq!(copy.return_value().program(), destination.id());
    assert!(copy
        .operands()
        .iter()
        .all(|operand| operand.program() == destination.id()));
}

#[test]
fn test_copy_with_offset() {
    let source = account_program();
    let mut destination = TestProgram::new();
    destination.add_primitive(Literal::Bool(true)).unwrap();
    destination.add_primitive(Literal::Bool(false)).unwrap();
    destination.append(&source).unwrap();

    let original = source.statement(2).unwrap();
    let copied = destination.statement(4).unwrap();
    assert_eq!(copied.position(), 4);
    let positions: Vec<usize> = copied.operands().iter().map(|r| r.position()).collect();
    assert_eq!(positions, vec![3, 2]);
    assert!(!copied.same(original));
    assert_ne!(copied, original);
}

#[test]
fn test_copy_fails_on_missing_position() {
    let source = account_program();
    let destination = TestProgram::new();
    let err = source.statement(1).unwrap().copy(&destination, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::Structural(StructuralError::MissingPosition { position: 0, len: 0 })
    ));
}

#[test]
fn test_copy_reports_negative_target() {
    let source = account_program();
    let destination = account_program();
    let statement = source.statement(1).unwrap();
    assert!(matches!(
        statement.copy(&destination, -4).unwrap_err(),
        Error::Structural(StructuralError::NegativePosition { position: -3, len: 5 })
    ));
    // own position stays in range, the operand at 0 does not
    assert!(matches!(
        statement.copy(&destination, -1).unwrap_err(),
        Error::Structural(StructuralError::NegativePosition { position: -1, len: 5 })
    ));
}

#[test]
fn test_copy_fails_on_incompatible_destination() {
    let source = account_program();
    let mut destination = TestProgram::new();
    destination.add_primitive(Literal::Str("x".to_string())).unwrap();
    let err = source.statement(1).unwrap().copy(&destination, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::Structural(StructuralError::TypeMismatch { .. })
    ));
}

#[test]
fn test_copy_deep_copies_assertions() {
    let mut source = account_program();
    let balance_ref = source.return_value(3).unwrap();
    source
        .add_assertion(3, Assertion::primitive(balance_ref, Literal::Int(7)))
        .unwrap();

    let statement = source.statement(3).unwrap();
    let copy = statement.clone_into(&source.duplicate().unwrap()).unwrap();
    assert_eq!(copy.assertions().len(), 1);
    assert_eq!(copy.assertions()[0].source().program(), copy.return_value().program());
    assert_eq!(statement.assertions()[0].source().program(), source.id());
}

#[test]
fn test_literal_same_and_equals_compare_values() {
    let a = account_program();
    let b = account_program();
    let seven_a = a.statement(0).unwrap();
    let seven_b = b.statement(0).unwrap();
    assert!(seven_a.same(seven_b));
    assert_ne!(seven_a, seven_b);

    let mut c = TestProgram::new();
    c.add_primitive(Literal::Int(8)).unwrap();
    assert!(!seven_a.same(c.statement(0).unwrap()));

    let mut nan = TestProgram::new();
    nan.add_primitive(Literal::Double(f64::NAN)).unwrap();
    let stmt = nan.statement(0).unwrap();
    assert_eq!(stmt, &stmt.clone());
    assert!(stmt.same(&stmt.clone()));

    let mut zeros = TestProgram::new();
    zeros.add_primitive(Literal::Double(0.0)).unwrap();
    let mut negative = TestProgram::with_id(zeros.id());
    negative.add_primitive(Literal::Double(-0.0)).unwrap();
    assert_ne!(zeros.statement(0).unwrap(), negative.statement(0).unwrap());
}

#[test]
fn test_equals_sees_execution_context() {
    let program = account_program();
    let mut rebound = program.statement(1).unwrap().clone();
    rebound.rebind(&account_catalog(ContextId(4))).unwrap();
    assert!(rebound.same(program.statement(1).unwrap()));
    assert_ne!(&rebound, program.statement(1).unwrap());
}

#[test]
fn test_equals_ignores_assertions() {
    let program = account_program();
    let mut with = program.statement(3).unwrap().clone();
    let own = with.return_value().clone();
    with.add_assertion(Assertion::primitive(own, Literal::Int(7))).unwrap();
    assert_eq!(&with, program.statement(3).unwrap());
}

#[test]
fn test_assertion_set_semantics() {
    let program = account_program();
    let mut statement = program.statement(3).unwrap().clone();
    let own = statement.return_value().clone();
    let assertion = Assertion::primitive(own.clone(), Literal::Int(7));

    assert!(statement.add_assertion(assertion.clone()).unwrap());
    assert!(!statement.add_assertion(assertion.clone()).unwrap());
    assert_eq!(statement.assertions().len(), 1);
    assert_eq!(statement.assertion_code(), "assertEquals(7, var3);");

    let forward = VariableReference::new(program.id(), 4, TypeDescriptor::Int);
    assert!(statement.add_assertion(Assertion::null(forward, true)).is_err());
    assert_eq!(statement.assertions().len(), 1);

    assert!(statement.remove_assertion(&assertion));
    assert!(!statement.has_assertions());

    statement
        .set_assertions(vec![assertion.clone(), Assertion::null(own, false)])
        .unwrap();
    assert_eq!(statement.assertions().len(), 2);
    statement.remove_assertions();
    assert!(!statement.has_assertions());
}

#[test]
fn test_mutate_primitive_and_null() {
    let mut program = account_program();
    program.add_null(account()).unwrap();
    let mut factory = first_candidate();

    let mut literal = program.statement(0).unwrap().clone();
    assert!(literal.mutate(&program, &mut factory));
    assert!(matches!(
        literal.kind(),
        StatementKind::Primitive(p) if *p.value() == Literal::Int(8)
    ));

    let mut null = program.statement(5).unwrap().clone();
    assert!(!null.mutate(&program, &mut factory));
}

#[test]
fn test_mutate_swaps_compatible_operation() {
    let program = account_program();
    let mut call = program.statement(2).unwrap().clone();
    let mut factory = first_candidate();
    assert!(call.mutate(&program, &mut factory));
    assert_eq!(call.operation().map(|op| op.name.as_str()), Some("withdraw"));
    assert_eq!(call.return_type(), &TypeDescriptor::Void);
    assert!(call.is_declared_fault(&FaultKind::IllegalArgument));
}

#[test]
fn test_mutate_ignores_forward_candidates() {
    let program = account_program();
    let forward = program.return_value(4).unwrap();
    let mut call = program.statement(2).unwrap().clone();
    let before = call.clone();
    assert!(!call.mutate(&program, &mut Proposing(forward)));
    assert_eq!(call, before);
}

#[test]
fn test_mutate_without_candidates_is_noop() {
    let mut program = TestProgram::new();
    program.add_primitive(Literal::Int(1)).unwrap();
    let amount = program.return_value(0).unwrap();
    program.add_constructor(account_ctor(), vec![amount]).unwrap();

    let mut ctor = program.statement(1).unwrap().clone();
    let before = ctor.clone();
    let mut factory = FirstCandidate {
        catalog: OperationCatalog::new(ContextId::default()),
    };
    assert!(!ctor.mutate(&program, &mut factory));
    assert_eq!(ctor, before);
}

#[test]
fn test_rebind_is_atomic() {
    let program = account_program();
    let mut statement = program.statement(3).unwrap().clone();
    let own = statement.return_value().clone();
    let account_ref = program.return_value(1).unwrap();
    statement
        .add_assertion(Assertion::primitive(own, Literal::Int(7)))
        .unwrap();
    statement
        .add_assertion(Assertion::field(account_ref, limit_field(), Literal::Int(0)))
        .unwrap();
    let before = statement.clone();

    let partial = OperationCatalog::with_operations(ContextId(2), vec![balance()]);
    assert!(matches!(
        statement.rebind(&partial),
        Err(Error::NoEquivalentOperation(_))
    ));
    assert_eq!(statement.operation(), before.operation());

    statement.rebind(&account_catalog(ContextId(2))).unwrap();
    assert_eq!(statement.operation().map(|op| op.context), Some(ContextId(2)));
    assert_eq!(
        statement.assertions()[1].operation().map(|op| op.context),
        Some(ContextId(2))
    );

    let mut literal = program.statement(0).unwrap().clone();
    assert!(literal.rebind(&partial).is_ok());
}

#[test]
fn test_renderings_follow_mutation() {
    let program = account_program();
    let mut call = program.statement(2).unwrap().clone();
    call.mutate(&program, &mut first_candidate());

    let source = call.code(None);
    assert!(source.contains("withdraw"));

    let mut emitter = BytecodeEmitter::new();
    for statement in &program.statements()[..2] {
        statement.emit_bytecode(&mut emitter, None).unwrap();
    }
    call.emit_bytecode(&mut emitter, None).unwrap();
    let last_import = emitter.imports().last().unwrap();
    assert_eq!(last_import.name, call.operation().unwrap().signature());
}

#[test]
fn test_serde_round_trip_preserves_equality() {
    let program = account_program();
    let statement = program.statement(2).unwrap();
    let json = serde_json::to_string(statement).unwrap();
    let restored: Statement = serde_json::from_str(&json).unwrap();
    assert_eq!(&restored, statement);
}

/// Positions named by `var<N>` tokens, in text order
fn named_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find("var") {
        let boundary = rest[..at]
            .chars()
            .last()
            .map_or(true, |c| !c.is_alphanumeric() && c != '_');
        let tail = &rest[at + 3..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        if boundary && !digits.is_empty() {
            positions.push(digits.parse().unwrap());
        }
        rest = tail;
    }
    positions
}

proptest! {
    #[test]
    fn prop_mutation_keeps_program_valid(seed in any::<u64>(), rounds in 1usize..20) {
        let mut program = account_program();
        let mut factory = RandomMutationFactory::new(
            MutationConfig::default(),
            account_catalog(ContextId::default()),
            seed,
        );
        for _ in 0..rounds {
            program.mutate(&mut factory).unwrap();
            prop_assert!(program.validate().is_ok());
        }
        for statement in program.statements() {
            for operand in statement.operands() {
                prop_assert!(operand.position() < statement.position());
            }
        }
    }

    #[test]
    fn prop_mutating_clone_leaves_original(seed in any::<u64>(), position in 0usize..5) {
        let program = account_program();
        let original = program.statement(position).unwrap().clone();
        let mut copy = original.clone();
        let mut factory = RandomMutationFactory::new(
            MutationConfig {
                operand_replacement_rate: 1.0,
                operation_swap_rate: 1.0,
                ..Default::default()
            },
            account_catalog(ContextId::default()),
            seed,
        );
        copy.mutate(&program, &mut factory);
        prop_assert_eq!(program.statement(position).unwrap(), &original);
    }

    #[test]
    fn prop_renderings_agree_on_operands(seed in any::<u64>(), rounds in 0usize..12, faulted in any::<bool>()) {
        use wasm_encoder::Instruction;

        let mut program = account_program();
        let mut factory = RandomMutationFactory::new(
            MutationConfig::default(),
            account_catalog(ContextId::default()),
            seed,
        );
        for _ in 0..rounds {
            program.mutate(&mut factory).unwrap();
        }
        let pending = faulted.then_some(&FaultKind::Arithmetic);

        let mut emitter = BytecodeEmitter::new();
        for statement in program.statements() {
            let lowered = statement.lower();
            let operands: Vec<usize> = lowered.operands.iter().map(|r| r.position()).collect();
            prop_assert_eq!(&lowered.result, &statement.return_value());

            let before = emitter.instructions().len();
            statement.emit_bytecode(&mut emitter, pending).unwrap();
            let added = &emitter.instructions()[before..];
            let loads: Vec<u32> = added
                .iter()
                .filter_map(|i| match i {
                    Instruction::LocalGet(slot) => Some(*slot),
                    _ => None,
                })
                .collect();
            let stores: Vec<u32> = added
                .iter()
                .filter_map(|i| match i {
                    Instruction::LocalSet(slot) => Some(*slot),
                    _ => None,
                })
                .collect();
            let slots: Vec<u32> = operands.iter().map(|p| emitter.slot(*p).unwrap()).collect();

            if matches!(lowered.op, LoweredOp::Copy) {
                prop_assert_eq!(&loads, &slots[1..].to_vec());
                prop_assert!(stores.contains(&slots[0]));
            } else if pending.is_some() {
                prop_assert_eq!(&loads[..slots.len()], &slots[..]);
            } else {
                prop_assert_eq!(&loads, &slots);
            }
            match emitter.slot(statement.position()) {
                Some(slot) => {
                    prop_assert!(lowered.binds_result());
                    prop_assert!(stores.contains(&slot));
                }
                None => prop_assert!(!lowered.binds_result()),
            }

            if !matches!(lowered.op, LoweredOp::Literal(_)) {
                let mut expected = Vec::new();
                if lowered.binds_result() {
                    expected.push(statement.position());
                    if pending.is_some() {
                        expected.push(statement.position());
                    }
                }
                expected.extend(&operands);
                prop_assert_eq!(named_positions(&statement.code(pending)), expected);
            }
        }
    }

    #[test]
    fn prop_copy_offsets_operands(prefix in 0usize..6) {
        let source = account_program();
        let mut destination = TestProgram::new();
        for i in 0..prefix {
            destination.add_primitive(Literal::Long(i as i64)).unwrap();
        }
        destination.append(&source).unwrap();
        prop_assert!(destination.validate().is_ok());
        for statement in source.statements() {
            let copied = destination.statement(statement.position() + prefix).unwrap();
            let expected: Vec<usize> = statement.operands().iter().map(|r| r.position() + prefix).collect();
            let actual: Vec<usize> = copied.operands().iter().map(|r| r.position()).collect();
            prop_assert_eq!(expected, actual);
            prop_assert_eq!(statement.same(copied), prefix == 0);
        }
    }
}
