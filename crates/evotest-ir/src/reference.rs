//! Position-addressed handles to values produced by statements.

use evotest_core::{ProgramId, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Symbolic handle to the value produced by the statement at `position`.
///
/// Equality and hashing are structural: position and declared type. The owning
/// program only takes part in [`VariableReference::identical`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableReference {
    position: usize,
    ty: TypeDescriptor,
    program: ProgramId,
}

impl VariableReference {
    pub fn new(program: ProgramId, position: usize, ty: TypeDescriptor) -> Self {
        Self {
            position,
            ty,
            program,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Same position and declared type, regardless of the owning program
    pub fn same(&self, other: &VariableReference) -> bool {
        self.position == other.position && self.ty == other.ty
    }

    /// Same position, type and owning program
    pub fn identical(&self, other: &VariableReference) -> bool {
        self.same(other) && self.program == other.program
    }

    /// Renumber for an insertion (`delta > 0`) or removal (`delta < 0`) at `from`.
    pub fn shifted(&self, from: usize, delta: isize) -> Self {
        let mut shifted = self.clone();
        if self.position >= from {
            shifted.position = (self.position as isize + delta) as usize;
        }
        shifted
    }

    pub fn with_position(&self, position: usize) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn retarget(&self, program: ProgramId) -> Self {
        Self {
            program,
            ..self.clone()
        }
    }

    /// Variable name used by the source back end
    pub fn name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.position)
    }
}

impl PartialEq for VariableReference {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for VariableReference {}

impl Hash for VariableReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
        self.ty.hash(state);
    }
}

impl fmt::Display for VariableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var{}: {}", self.position, self.ty)
    }
}
