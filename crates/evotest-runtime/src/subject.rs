//! The invocation boundary to the program under test.

use evotest_core::{FaultKind, InfrastructureFault, Result, SubjectFault};
use evotest_ir::{ExecutionContext, OperationDescriptor, Value};

/// Outcome of one call into the subject
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Normal completion; `Value::Void` for void operations
    Returned(Value),
    /// The subject raised a fault
    Raised(SubjectFault),
}

impl Invocation {
    pub fn raise(kind: FaultKind, message: impl Into<String>) -> Self {
        Invocation::Raised(SubjectFault::new(kind, message))
    }

    pub fn is_raised(&self) -> bool {
        matches!(self, Invocation::Raised(_))
    }
}

pub type InvocationResult = std::result::Result<Invocation, InfrastructureFault>;

/// A program statements can be executed against.
///
/// Constructors and methods go through [`Subject::invoke`]; constructors get
/// no receiver. An `Err` means the call could not be set up at all.
pub trait Subject {
    /// Operations this subject can resolve
    fn context(&self) -> &dyn ExecutionContext;

    fn invoke(
        &mut self,
        op: &OperationDescriptor,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> InvocationResult;

    fn read_field(&mut self, op: &OperationDescriptor, receiver: Option<&Value>) -> InvocationResult;

    fn write_field(
        &mut self,
        op: &OperationDescriptor,
        receiver: Option<&Value>,
        value: Value,
    ) -> InvocationResult;

    /// Subject-level equality, used by equality assertions
    fn equals(&mut self, a: &Value, b: &Value) -> std::result::Result<bool, InfrastructureFault> {
        Ok(a == b)
    }

    /// Discard all state, as if freshly loaded
    fn reset(&mut self) -> Result<()>;
}
