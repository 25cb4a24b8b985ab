//! Whole-program execution.

use crate::execute::{Evaluate, Execute};
use crate::scope::Scope;
use crate::subject::Subject;
use evotest_core::{ExecutionConfig, FaultKind, Result, SubjectFault};
use evotest_ir::{Assertion, TestProgram};
use std::collections::{BTreeMap, BTreeSet};

/// An attached assertion that did not hold
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAssertion {
    pub position: usize,
    pub assertion: Assertion,
}

/// Outcome of running one program
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Captured subject faults by statement position
    pub faults: BTreeMap<usize, SubjectFault>,
    /// Positions of the statements that ran to completion
    pub executed: Vec<usize>,
    /// Positions skipped because an operand was never bound
    pub skipped: Vec<usize>,
    pub failed_assertions: Vec<FailedAssertion>,
    /// Bindings at the end of the run
    pub scope: Scope,
}

impl ExecutionResult {
    pub fn first_fault(&self) -> Option<(usize, &SubjectFault)> {
        self.faults.iter().next().map(|(position, fault)| (*position, fault))
    }

    pub fn has_undeclared_fault(&self) -> bool {
        self.faults.values().any(|fault| !fault.declared)
    }

    /// Expected faults in the form taken by the code generators
    pub fn fault_kinds(&self) -> BTreeMap<usize, FaultKind> {
        self.faults
            .iter()
            .map(|(position, fault)| (*position, fault.kind.clone()))
            .collect()
    }

    pub fn passed(&self) -> bool {
        self.faults.is_empty() && self.failed_assertions.is_empty()
    }
}

pub struct Executor {
    config: ExecutionConfig,
}

impl Executor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run `program` from an empty scope against a freshly reset `subject`.
    ///
    /// Structural and infrastructure errors abort this program only.
    pub fn run(&self, program: &TestProgram, subject: &mut dyn Subject) -> Result<ExecutionResult> {
        subject.reset()?;
        let mut result = ExecutionResult {
            faults: BTreeMap::new(),
            executed: Vec::new(),
            skipped: Vec::new(),
            failed_assertions: Vec::new(),
            scope: Scope::new(),
        };
        let mut unbound: BTreeSet<usize> = BTreeSet::new();

        for statement in program.statements() {
            let position = statement.position();
            let blocked = statement
                .operands()
                .iter()
                .any(|operand| unbound.contains(&operand.position()));
            if blocked {
                tracing::trace!(position, "skipping statement with unbound operand");
                unbound.insert(position);
                result.skipped.push(position);
                continue;
            }

            if let Some(fault) = statement.execute(&mut result.scope, subject)? {
                if !fault.declared {
                    tracing::warn!(position, %fault, "undeclared subject fault");
                }
                result.faults.insert(position, fault);
                unbound.insert(position);
                if self.config.stop_on_fault {
                    break;
                }
                continue;
            }
            result.executed.push(position);

            if self.config.evaluate_assertions {
                for assertion in statement.assertions() {
                    // Values lost to a captured fault cannot be judged
                    let judgeable = assertion
                        .references()
                        .into_iter()
                        .all(|var| result.scope.is_bound(var));
                    if !judgeable {
                        tracing::debug!(position, assertion = %assertion.code(), "assertion on unbound value skipped");
                        continue;
                    }
                    if !assertion.evaluate(&result.scope, subject)? {
                        tracing::debug!(position, assertion = %assertion.code(), "assertion failed");
                        result.failed_assertions.push(FailedAssertion {
                            position,
                            assertion: assertion.clone(),
                        });
                    }
                }
            }
        }

        tracing::debug!(
            program = %program.id(),
            executed = result.executed.len(),
            faults = result.faults.len(),
            failed_assertions = result.failed_assertions.len(),
            "program executed"
        );
        Ok(result)
    }

    /// Run a copy of `program` rebound to the subject's execution context
    pub fn run_rebound(&self, program: &TestProgram, subject: &mut dyn Subject) -> Result<ExecutionResult> {
        let mut rebound = program.clone();
        rebound.rebind(subject.context())?;
        self.run(&rebound, subject)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutionConfig::default())
    }
}
