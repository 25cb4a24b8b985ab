//! Core type definitions shared by the IR and the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a test program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub Uuid);

impl ProgramId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProgramId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the execution context an operation was resolved under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ContextId(pub u32);

/// Declared type of a value in a test program
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Void,
    Bool,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Str,
    Object(String),
}

impl TypeDescriptor {
    pub fn object(name: impl Into<String>) -> Self {
        TypeDescriptor::Object(name.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            TypeDescriptor::Void | TypeDescriptor::Str | TypeDescriptor::Object(_)
        )
    }

    /// Reference types may hold `null`
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeDescriptor::Str | TypeDescriptor::Object(_))
    }

    /// Returns true if a value of type `other` may be stored where `self` is expected.
    ///
    /// Primitives never widen. `Object` is the root of all reference types.
    pub fn is_assignable_from(&self, other: &TypeDescriptor) -> bool {
        if self == other {
            return !self.is_void();
        }
        match self {
            TypeDescriptor::Object(name) if name == "Object" => other.is_reference(),
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Void => "void",
            TypeDescriptor::Bool => "boolean",
            TypeDescriptor::Char => "char",
            TypeDescriptor::Byte => "byte",
            TypeDescriptor::Short => "short",
            TypeDescriptor::Int => "int",
            TypeDescriptor::Long => "long",
            TypeDescriptor::Float => "float",
            TypeDescriptor::Double => "double",
            TypeDescriptor::Str => "String",
            TypeDescriptor::Object(name) => name,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of fault the subject program can raise
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FaultKind {
    Arithmetic,
    NullPointer,
    IndexOutOfBounds,
    IllegalArgument,
    IllegalState,
    StackOverflow,
    Unreachable,
    Custom(String),
}

impl FaultKind {
    /// Name used when rendering catch clauses
    pub fn name(&self) -> &str {
        match self {
            FaultKind::Arithmetic => "ArithmeticException",
            FaultKind::NullPointer => "NullPointerException",
            FaultKind::IndexOutOfBounds => "IndexOutOfBoundsException",
            FaultKind::IllegalArgument => "IllegalArgumentException",
            FaultKind::IllegalState => "IllegalStateException",
            FaultKind::StackOverflow => "StackOverflowError",
            FaultKind::Unreachable => "UnreachableError",
            FaultKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault raised by the code under test, captured as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFault {
    pub kind: FaultKind,
    pub message: String,
    /// Whether the invoked operation declares this fault kind
    pub declared: bool,
}

impl SubjectFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            declared: false,
        }
    }

    pub fn declared(mut self, declared: bool) -> Self {
        self.declared = declared;
        self
    }
}

impl fmt::Display for SubjectFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
