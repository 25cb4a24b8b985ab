//! Human-readable test source.

use super::{Lowered, LoweredOp};
use crate::assertion::Assertion;
use crate::operation::OperationDescriptor;
use crate::program::TestProgram;
use crate::reference::VariableReference;
use crate::statement::Statement;
use crate::value::Literal;
use evotest_core::{CodegenConfig, FaultKind, TypeDescriptor};
use std::collections::BTreeMap;

/// Renders statements, assertions and whole programs as Java-like source
#[derive(Debug, Clone, Default)]
pub struct SourceWriter {
    config: CodegenConfig,
}

impl SourceWriter {
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    fn var(&self, reference: &VariableReference) -> String {
        reference.name(&self.config.variable_prefix)
    }

    fn args(&self, args: &[&VariableReference]) -> String {
        args.iter()
            .map(|arg| self.var(arg))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `Owner` for static members, the receiver variable otherwise
    fn target(&self, op: &OperationDescriptor, operands: &[&VariableReference]) -> (String, usize) {
        if op.has_receiver() {
            match operands.first() {
                Some(receiver) => (self.var(receiver), 1),
                None => (op.owner.name().to_string(), 0),
            }
        } else {
            (op.owner.name().to_string(), 0)
        }
    }

    /// Right-hand side of the statement, or the full text for void statements
    fn expression(&self, lowered: &Lowered<'_>) -> String {
        let operands = &lowered.operands;
        match lowered.op {
            LoweredOp::Construct(op) => format!("new {}({})", op.owner, self.args(operands)),
            LoweredOp::Invoke(op) => {
                let (target, skip) = self.target(op, operands);
                format!("{}.{}({})", target, op.name, self.args(&operands[skip..]))
            }
            LoweredOp::ReadField(op) => {
                let (target, _) = self.target(op, operands);
                format!("{}.{}", target, op.name)
            }
            LoweredOp::WriteField(op) => {
                let (target, skip) = self.target(op, operands);
                let value = operands.get(skip).map(|v| self.var(v)).unwrap_or_default();
                format!("{}.{} = {}", target, op.name, value)
            }
            LoweredOp::Copy => match operands.as_slice() {
                [target, value] => format!("{} = {}", self.var(target), self.var(value)),
                _ => String::new(),
            },
            LoweredOp::Literal(literal) => literal.to_source(),
            LoweredOp::Null => "null".to_string(),
        }
    }

    /// Source text of one statement.
    ///
    /// With a pending fault the statement is wrapped in a block expecting
    /// that fault; its variable is declared ahead of the block so later
    /// statements can still read it.
    pub fn statement(&self, statement: &Statement, pending: Option<&FaultKind>) -> String {
        let lowered = statement.lower();
        let expression = self.expression(&lowered);
        let result = lowered.result;

        let Some(fault) = pending else {
            return if lowered.binds_result() {
                format!("{} {} = {};", result.ty(), self.var(result), expression)
            } else {
                format!("{};", expression)
            };
        };

        let indent = &self.config.indent;
        let mut lines = Vec::new();
        let body = if lowered.binds_result() {
            lines.push(format!(
                "{} {} = {};",
                result.ty(),
                self.var(result),
                default_value(result.ty())
            ));
            format!("{} = {};", self.var(result), expression)
        } else {
            format!("{};", expression)
        };
        lines.push("try {".to_string());
        lines.push(format!("{}{}", indent, body));
        lines.push(format!("{}fail(\"Expecting exception: {}\");", indent, fault.name()));
        lines.push(format!("}} catch({} e) {{", fault.name()));
        lines.push(format!("{}// expected", indent));
        lines.push("}".to_string());
        lines.join("\n")
    }

    pub fn assertion(&self, assertion: &Assertion) -> String {
        match assertion {
            Assertion::Primitive { source, expected } => self.expect(expected, &self.var(source)),
            Assertion::Null { source, is_null } => {
                let check = if *is_null { "assertNull" } else { "assertNotNull" };
                format!("{}({});", check, self.var(source))
            }
            Assertion::Equals {
                source,
                other,
                equal,
            } => {
                let check = if *equal { "assertTrue" } else { "assertFalse" };
                let comparison = if source.ty().is_primitive() {
                    format!("{} == {}", self.var(source), self.var(other))
                } else {
                    format!("{}.equals({})", self.var(source), self.var(other))
                };
                format!("{}({});", check, comparison)
            }
            Assertion::Inspector {
                source,
                inspector,
                expected,
            } => self.expect(expected, &format!("{}.{}()", self.var(source), inspector.name)),
            Assertion::Field {
                source,
                field,
                expected,
            } => {
                let target = if field.is_static {
                    field.owner.name().to_string()
                } else {
                    self.var(source)
                };
                self.expect(expected, &format!("{}.{}", target, field.name))
            }
        }
    }

    fn expect(&self, expected: &Literal, actual: &str) -> String {
        match expected {
            Literal::Bool(true) => format!("assertTrue({});", actual),
            Literal::Bool(false) => format!("assertFalse({});", actual),
            Literal::Float(_) | Literal::Double(_) => format!(
                "assertEquals({}, {}, {});",
                expected.to_source(),
                actual,
                self.config.float_delta
            ),
            _ => format!("assertEquals({}, {});", expected.to_source(), actual),
        }
    }

    /// A complete test method; `faults` holds the fault expected at each position
    pub fn program(&self, program: &TestProgram, faults: &BTreeMap<usize, FaultKind>) -> String {
        let indent = &self.config.indent;
        let mut out = String::from("public void test() throws Throwable {\n");
        for statement in program.statements() {
            let pending = faults.get(&statement.position());
            let mut chunk = vec![self.statement(statement, pending)];
            if self.config.emit_assertions && pending.is_none() {
                chunk.extend(statement.assertions().iter().map(|a| self.assertion(a)));
            }
            for line in chunk.iter().flat_map(|c| c.lines()) {
                out.push_str(indent);
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('}');
        out
    }
}

fn default_value(ty: &TypeDescriptor) -> String {
    Literal::default_for(ty)
        .map(|literal| literal.to_source())
        .unwrap_or_else(|| "null".to_string())
}
