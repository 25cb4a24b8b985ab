//! A small bank domain used by the runtime tests.

use crate::native::NativeSubject;
use crate::subject::Invocation;
use evotest_core::{ContextId, FaultKind, TypeDescriptor};
use evotest_ir::{Literal, OperationDescriptor, TestProgram, Value};

pub fn account() -> TypeDescriptor {
    TypeDescriptor::object("Account")
}

pub fn ledger() -> TypeDescriptor {
    TypeDescriptor::object("Ledger")
}

pub fn account_ctor() -> OperationDescriptor {
    OperationDescriptor::constructor(account(), vec![TypeDescriptor::Int])
}

pub fn ledger_ctor() -> OperationDescriptor {
    OperationDescriptor::constructor(ledger(), vec![])
}

pub fn shape_ctor() -> OperationDescriptor {
    OperationDescriptor::constructor(TypeDescriptor::object("Shape"), vec![])
}

pub fn balance() -> OperationDescriptor {
    OperationDescriptor::method(account(), "balance", vec![], TypeDescriptor::Int)
}

/// `balance / parts`
pub fn split() -> OperationDescriptor {
    OperationDescriptor::method(account(), "split", vec![TypeDescriptor::Int], TypeDescriptor::Int)
        .with_faults([FaultKind::Arithmetic])
}

pub fn audit() -> OperationDescriptor {
    OperationDescriptor::method(account(), "audit", vec![], TypeDescriptor::Void)
}

pub fn balance_field() -> OperationDescriptor {
    OperationDescriptor::field(account(), "balance", TypeDescriptor::Int)
}

pub fn rate_field() -> OperationDescriptor {
    OperationDescriptor::field(account(), "rate", TypeDescriptor::Int).with_static(true)
}

fn balance_of(heap: &crate::native::Heap, this: Option<&Value>) -> i32 {
    match heap.field_of(this, "balance") {
        Some(Value::Int(balance)) => *balance,
        _ => 0,
    }
}

pub fn bank_subject(context: ContextId) -> NativeSubject {
    NativeSubject::builder(context)
        .abstract_class(TypeDescriptor::object("Shape"))
        .field(balance_field(), Value::Int(0))
        .field(rate_field(), Value::Int(2))
        .operation(account_ctor(), |heap, this, args| {
            heap.set_field_of(this, "balance", args[0].clone());
            Invocation::Returned(Value::Void)
        })
        .operation(ledger_ctor(), |_, _, _| Invocation::Returned(Value::Void))
        .operation(shape_ctor(), |_, _, _| Invocation::Returned(Value::Void))
        .operation(balance(), |heap, this, _| {
            Invocation::Returned(Value::Int(balance_of(heap, this)))
        })
        .operation(split(), |heap, this, args| {
            let balance = balance_of(heap, this);
            match args[0] {
                Value::Int(0) => Invocation::raise(FaultKind::Arithmetic, "/ by zero"),
                Value::Int(parts) => Invocation::Returned(Value::Int(balance.wrapping_div(parts))),
                _ => Invocation::raise(FaultKind::IllegalArgument, "parts"),
            }
        })
        .private_operation(audit(), |_, _, _| Invocation::Returned(Value::Void))
        .build()
}

/// ```text
/// 0: int var0 = 10;
/// 1: Account var1 = new Account(var0);
/// 2: int var2 = <parts>;
/// 3: int var3 = var1.split(var2);
/// ```
pub fn split_program(parts: i32) -> TestProgram {
    let mut program = TestProgram::new();
    let amount = program.add_primitive(Literal::Int(10)).unwrap();
    let account = program.add_constructor(account_ctor(), vec![amount]).unwrap();
    let parts = program.add_primitive(Literal::Int(parts)).unwrap();
    program.add_method(split(), Some(account), vec![parts]).unwrap();
    program
}
