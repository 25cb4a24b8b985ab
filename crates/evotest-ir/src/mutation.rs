//! Mutation operators and the factory supplying their candidates.

use crate::operation::{OperationCatalog, OperationDescriptor};
use crate::program::TestProgram;
use crate::reference::VariableReference;
use crate::value::Literal;
use evotest_core::{MutationConfig, TypeDescriptor};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Decision points at which a factory may decline to mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Mutate one statement of a program with `program_len` statements
    Statement { program_len: usize },
    /// Swap the invoked operation for a compatible one
    SwapOperation,
    /// Rewire one operand
    ReplaceOperand,
}

/// Supplies replacement operands, literals and operations during mutation.
///
/// Returning `None` means no candidate; the mutation is then a no-op.
pub trait MutationFactory {
    fn attempt(&mut self, kind: MutationKind) -> bool;

    /// A value before `position` assignable to `required`, other than `current`
    fn candidate_operand(
        &mut self,
        program: &TestProgram,
        position: usize,
        required: &TypeDescriptor,
        current: &VariableReference,
    ) -> Option<VariableReference>;

    /// A different constant of the same type
    fn regenerate_literal(&mut self, current: &Literal) -> Option<Literal>;

    /// An operation with the same owner, parameters and return type
    fn compatible_operation(&mut self, current: &OperationDescriptor) -> Option<OperationDescriptor>;
}

/// Seeded random factory drawing operations from a catalog
pub struct RandomMutationFactory {
    config: MutationConfig,
    catalog: OperationCatalog,
    rng: ChaCha8Rng,
}

impl RandomMutationFactory {
    pub fn new(config: MutationConfig, catalog: OperationCatalog, seed: u64) -> Self {
        Self {
            config,
            catalog,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    fn integral_delta(&mut self) -> i64 {
        let max = self.config.max_int_delta.max(1);
        let delta = self.rng.gen_range(1..=max);
        if self.rng.gen::<bool>() {
            delta
        } else {
            -delta
        }
    }

    fn float_delta(&mut self) -> f64 {
        let max = self.config.max_float_delta.abs().max(f64::EPSILON);
        let delta = self.rng.gen_range(f64::EPSILON..=max);
        if self.rng.gen::<bool>() {
            delta
        } else {
            -delta
        }
    }

    fn random_char(&mut self) -> char {
        self.rng.gen_range(b' '..=b'~') as char
    }

    fn mutate_string(&mut self, current: &str) -> String {
        let mut chars: Vec<char> = current.chars().collect();
        let max_len = self.config.max_string_length;
        match self.rng.gen_range(0..3) {
            0 if chars.len() < max_len => {
                let at = self.rng.gen_range(0..=chars.len());
                let c = self.random_char();
                chars.insert(at, c);
            }
            1 if !chars.is_empty() => {
                let at = self.rng.gen_range(0..chars.len());
                chars.remove(at);
            }
            _ if !chars.is_empty() => {
                let at = self.rng.gen_range(0..chars.len());
                chars[at] = self.random_char();
            }
            _ => chars.push(self.random_char()),
        }
        chars.truncate(max_len);
        chars.into_iter().collect()
    }
}

impl MutationFactory for RandomMutationFactory {
    fn attempt(&mut self, kind: MutationKind) -> bool {
        let probability = match kind {
            MutationKind::Statement { program_len } => 1.0 / program_len.max(1) as f64,
            MutationKind::SwapOperation => self.config.operation_swap_rate,
            MutationKind::ReplaceOperand => self.config.operand_replacement_rate,
        };
        self.rng.gen::<f64>() < probability
    }

    fn candidate_operand(
        &mut self,
        program: &TestProgram,
        position: usize,
        required: &TypeDescriptor,
        current: &VariableReference,
    ) -> Option<VariableReference> {
        let candidates: Vec<VariableReference> = program
            .candidates(position, required)
            .into_iter()
            .filter(|candidate| candidate != current)
            .collect();
        candidates.choose(&mut self.rng).cloned()
    }

    fn regenerate_literal(&mut self, current: &Literal) -> Option<Literal> {
        let regenerated = match current {
            Literal::Bool(v) => Literal::Bool(!v),
            Literal::Char(c) => {
                let replacement = self.random_char();
                if replacement == *c {
                    return None;
                }
                Literal::Char(replacement)
            }
            Literal::Byte(v) => {
                Literal::Byte((*v as i64 + self.integral_delta()).clamp(i8::MIN as i64, i8::MAX as i64) as i8)
            }
            Literal::Short(v) => Literal::Short(
                (*v as i64 + self.integral_delta()).clamp(i16::MIN as i64, i16::MAX as i64) as i16,
            ),
            Literal::Int(v) => Literal::Int(
                (*v as i64 + self.integral_delta()).clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            ),
            Literal::Long(v) => Literal::Long(v.saturating_add(self.integral_delta())),
            Literal::Float(v) => Literal::Float((*v as f64 + self.float_delta()) as f32),
            Literal::Double(v) => Literal::Double(v + self.float_delta()),
            Literal::Str(s) => Literal::Str(self.mutate_string(s)),
        };
        if regenerated == *current {
            None
        } else {
            Some(regenerated)
        }
    }

    fn compatible_operation(&mut self, current: &OperationDescriptor) -> Option<OperationDescriptor> {
        let replacements: Vec<&OperationDescriptor> = self.catalog.replacements_for(current).collect();
        replacements.choose(&mut self.rng).map(|op| (*op).clone())
    }
}
