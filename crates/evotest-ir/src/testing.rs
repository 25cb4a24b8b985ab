//! Shared fixtures for unit tests.

use crate::operation::{OperationCatalog, OperationDescriptor};
use crate::program::TestProgram;
use crate::value::Literal;
use evotest_core::{ContextId, FaultKind, TypeDescriptor};

pub fn account() -> TypeDescriptor {
    TypeDescriptor::object("Account")
}

pub fn account_ctor() -> OperationDescriptor {
    OperationDescriptor::constructor(account(), vec![TypeDescriptor::Int])
}

pub fn deposit() -> OperationDescriptor {
    OperationDescriptor::method(account(), "deposit", vec![TypeDescriptor::Int], TypeDescriptor::Void)
}

pub fn withdraw() -> OperationDescriptor {
    OperationDescriptor::method(account(), "withdraw", vec![TypeDescriptor::Int], TypeDescriptor::Void)
        .with_faults([FaultKind::IllegalArgument])
}

pub fn balance() -> OperationDescriptor {
    OperationDescriptor::method(account(), "balance", vec![], TypeDescriptor::Int)
}

pub fn limit_field() -> OperationDescriptor {
    OperationDescriptor::field(account(), "limit", TypeDescriptor::Int)
}

pub fn account_catalog(context: ContextId) -> OperationCatalog {
    OperationCatalog::with_operations(
        context,
        vec![account_ctor(), deposit(), withdraw(), balance(), limit_field()],
    )
}

/// ```text
/// 0: int var0 = 7;
/// 1: Account var1 = new Account(var0);
/// 2: var1.deposit(var0);
/// 3: int var3 = var1.balance();
/// 4: int var4 = 3;
/// ```
pub fn account_program() -> TestProgram {
    let mut program = TestProgram::new();
    let amount = program.add_primitive(Literal::Int(7)).unwrap();
    let account = program.add_constructor(account_ctor(), vec![amount.clone()]).unwrap();
    program.add_method(deposit(), Some(account.clone()), vec![amount]).unwrap();
    program.add_method(balance(), Some(account), vec![]).unwrap();
    program.add_primitive(Literal::Int(3)).unwrap();
    program
}
