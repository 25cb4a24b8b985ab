//! WebAssembly instruction stream.

use super::{Lowered, LoweredOp};
use crate::operation::OperationDescriptor;
use crate::reference::VariableReference;
use crate::value::Literal;
use evotest_core::{Error, FaultKind, Result, StructuralError, TypeDescriptor};
use std::collections::BTreeMap;
use wasm_encoder::{BlockType, Function, Instruction, ValType};

/// Import that turns a string pool index into a subject string handle
pub const STRING_IMPORT: &str = "$string";

/// Import reporting that an expected fault was not raised; takes the pool
/// index of the fault name
pub const FAIL_IMPORT: &str = "$fail";

/// Suffix of the guarded variant of an operation import.
///
/// A guarded import returns the normal results followed by an `i32` that is
/// non-zero when the subject raised. The normal results are then ignored.
pub const GUARDED_SUFFIX: &str = "?";

/// Value type of a slot holding `ty`; void has no slot
pub fn wasm_type(ty: &TypeDescriptor) -> Option<ValType> {
    match ty {
        TypeDescriptor::Void => None,
        TypeDescriptor::Bool
        | TypeDescriptor::Char
        | TypeDescriptor::Byte
        | TypeDescriptor::Short
        | TypeDescriptor::Int => Some(ValType::I32),
        TypeDescriptor::Long => Some(ValType::I64),
        TypeDescriptor::Float => Some(ValType::F32),
        TypeDescriptor::Double => Some(ValType::F64),
        TypeDescriptor::Str | TypeDescriptor::Object(_) => Some(ValType::I32),
    }
}

/// A function the emitted code calls through the `subject` import module
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFunction {
    pub name: String,
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

/// Accumulates the body of the test function.
///
/// Holds the position to local-slot map shared by all statements of one
/// program, the imports referenced so far and the string pool.
#[derive(Debug, Default)]
pub struct BytecodeEmitter {
    slots: BTreeMap<usize, u32>,
    local_types: Vec<ValType>,
    imports: Vec<ImportedFunction>,
    strings: Vec<String>,
    instructions: Vec<Instruction<'static>>,
    /// Local holding the raised flag of the last guarded call
    raised_flag: Option<u32>,
}

impl BytecodeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local slot bound to the value at `position`
    pub fn slot(&self, position: usize) -> Option<u32> {
        self.slots.get(&position).copied()
    }

    fn operand_slot(&self, operand: &VariableReference) -> Result<u32> {
        self.slot(operand.position()).ok_or_else(|| {
            StructuralError::UnboundReference {
                position: operand.position(),
            }
            .into()
        })
    }

    /// Slot for the value at `reference`, allocated on first use
    pub fn bind_slot(&mut self, reference: &VariableReference) -> Option<u32> {
        let ty = wasm_type(reference.ty())?;
        if let Some(slot) = self.slot(reference.position()) {
            return Some(slot);
        }
        let slot = self.local_types.len() as u32;
        self.local_types.push(ty);
        self.slots.insert(reference.position(), slot);
        Some(slot)
    }

    /// Index of the import called `name`, registered on first use
    pub fn import(&mut self, name: &str, params: Vec<ValType>, results: Vec<ValType>) -> Result<u32> {
        if let Some(index) = self.imports.iter().position(|i| i.name == name) {
            let known = &self.imports[index];
            if known.params != params || known.results != results {
                return Err(Error::Codegen(format!(
                    "import {} used with two different signatures",
                    name
                )));
            }
            return Ok(index as u32);
        }
        self.imports.push(ImportedFunction {
            name: name.to_string(),
            params,
            results,
        });
        Ok(self.imports.len() as u32 - 1)
    }

    fn import_operation(
        &mut self,
        name: String,
        op: &OperationDescriptor,
        lowered: &Lowered<'_>,
        guarded: bool,
    ) -> Result<u32> {
        let params = lowered
            .operands
            .iter()
            .map(|operand| value_type(operand))
            .collect::<Result<Vec<_>>>()?;
        let mut results: Vec<ValType> = match lowered.op {
            LoweredOp::WriteField(_) => Vec::new(),
            _ => wasm_type(&op.returns).into_iter().collect(),
        };
        if guarded {
            results.push(ValType::I32);
            return self.import(&format!("{}{}", name, GUARDED_SUFFIX), params, results);
        }
        self.import(&name, params, results)
    }

    fn raised_flag(&mut self) -> u32 {
        match self.raised_flag {
            Some(local) => local,
            None => {
                let local = self.local_types.len() as u32;
                self.local_types.push(ValType::I32);
                self.raised_flag = Some(local);
                local
            }
        }
    }

    fn intern(&mut self, s: &str) -> i32 {
        match self.strings.iter().position(|known| known == s) {
            Some(index) => index as i32,
            None => {
                self.strings.push(s.to_string());
                self.strings.len() as i32 - 1
            }
        }
    }

    fn push_literal(&mut self, literal: &Literal) -> Result<()> {
        let instruction = match literal {
            Literal::Bool(v) => Instruction::I32Const(*v as i32),
            Literal::Char(c) => Instruction::I32Const(*c as i32),
            Literal::Byte(v) => Instruction::I32Const(*v as i32),
            Literal::Short(v) => Instruction::I32Const(*v as i32),
            Literal::Int(v) => Instruction::I32Const(*v),
            Literal::Long(v) => Instruction::I64Const(*v),
            Literal::Float(v) => Instruction::F32Const(*v),
            Literal::Double(v) => Instruction::F64Const(*v),
            Literal::Str(s) => {
                let index = self.intern(s);
                let import = self.import(STRING_IMPORT, vec![ValType::I32], vec![ValType::I32])?;
                self.instructions.push(Instruction::I32Const(index));
                Instruction::Call(import)
            }
        };
        self.instructions.push(instruction);
        Ok(())
    }

    /// Append the instructions for one lowered statement.
    ///
    /// With a pending fault the statement runs inside a block: operations go
    /// through their guarded import, a raised fault leaves the block with the
    /// result slot at its zero default, and falling through reports the
    /// missing fault through [`FAIL_IMPORT`].
    pub fn emit(&mut self, lowered: &Lowered<'_>, pending: Option<&FaultKind>) -> Result<()> {
        let Some(fault) = pending else {
            return self.emit_plain(lowered);
        };

        self.instructions.push(Instruction::Block(BlockType::Empty));
        match lowered.op {
            LoweredOp::Construct(op) | LoweredOp::Invoke(op) | LoweredOp::ReadField(op) => {
                let call = self.import_operation(op.signature(), op, lowered, true)?;
                self.guarded_call(call, lowered, Some(&op.returns))?;
            }
            LoweredOp::WriteField(op) => {
                let call = self.import_operation(format!("{}=", op.signature()), op, lowered, true)?;
                self.guarded_call(call, lowered, None)?;
            }
            _ => self.emit_plain(lowered)?,
        }
        let name = self.intern(fault.name());
        let fail = self.import(FAIL_IMPORT, vec![ValType::I32], Vec::new())?;
        self.instructions.push(Instruction::I32Const(name));
        self.instructions.push(Instruction::Call(fail));
        self.instructions.push(Instruction::End);
        Ok(())
    }

    /// Call a guarded import inside the protective block opened by `emit`
    fn guarded_call(&mut self, call: u32, lowered: &Lowered<'_>, produced: Option<&TypeDescriptor>) -> Result<()> {
        self.load(&lowered.operands)?;
        self.instructions.push(Instruction::Call(call));
        let flag = self.raised_flag();
        self.instructions.push(Instruction::LocalSet(flag));

        let result = produced
            .and_then(wasm_type)
            .map(|ty| (ty, self.bind_slot(lowered.result)));
        match result {
            Some((ty, Some(slot))) => {
                self.instructions.push(Instruction::LocalSet(slot));
                self.instructions.push(Instruction::LocalGet(flag));
                self.instructions.push(Instruction::If(BlockType::Empty));
                self.instructions.push(zero(ty));
                self.instructions.push(Instruction::LocalSet(slot));
                self.instructions.push(Instruction::Br(1));
                self.instructions.push(Instruction::End);
            }
            Some((_, None)) => {
                self.instructions.push(Instruction::Drop);
                self.instructions.push(Instruction::LocalGet(flag));
                self.instructions.push(Instruction::BrIf(0));
            }
            None => {
                self.instructions.push(Instruction::LocalGet(flag));
                self.instructions.push(Instruction::BrIf(0));
            }
        }
        Ok(())
    }

    fn emit_plain(&mut self, lowered: &Lowered<'_>) -> Result<()> {
        match lowered.op {
            LoweredOp::Construct(op) | LoweredOp::Invoke(op) | LoweredOp::ReadField(op) => {
                let call = self.import_operation(op.signature(), op, lowered, false)?;
                self.load(&lowered.operands)?;
                self.instructions.push(Instruction::Call(call));
                self.store_result(lowered.result, &op.returns);
            }
            LoweredOp::WriteField(op) => {
                let call = self.import_operation(format!("{}=", op.signature()), op, lowered, false)?;
                self.load(&lowered.operands)?;
                self.instructions.push(Instruction::Call(call));
            }
            LoweredOp::Copy => {
                let [target, value] = lowered.operands.as_slice() else {
                    return Err(Error::Codegen(format!(
                        "assignment at {} needs a target and a value",
                        lowered.result.position()
                    )));
                };
                let source = self.operand_slot(value)?;
                let destination = self.operand_slot(target)?;
                self.instructions.push(Instruction::LocalGet(source));
                self.instructions.push(Instruction::LocalSet(destination));
            }
            LoweredOp::Literal(literal) => {
                self.push_literal(literal)?;
                self.store_result(lowered.result, &literal.ty());
            }
            LoweredOp::Null => {
                self.instructions.push(Instruction::I32Const(0));
                self.store_result(lowered.result, lowered.result.ty());
            }
        }
        Ok(())
    }

    fn load(&mut self, operands: &[&VariableReference]) -> Result<()> {
        for operand in operands {
            let slot = self.operand_slot(operand)?;
            self.instructions.push(Instruction::LocalGet(slot));
        }
        Ok(())
    }

    /// Pop the value just produced into the result slot, if it has one
    fn store_result(&mut self, result: &VariableReference, produced: &TypeDescriptor) {
        if wasm_type(produced).is_none() {
            return;
        }
        match self.bind_slot(result) {
            Some(slot) => self.instructions.push(Instruction::LocalSet(slot)),
            None => self.instructions.push(Instruction::Drop),
        }
    }

    pub fn instructions(&self) -> &[Instruction<'static>] {
        &self.instructions
    }

    /// Imports in call-index order
    pub fn imports(&self) -> &[ImportedFunction] {
        &self.imports
    }

    pub fn locals(&self) -> &[ValType] {
        &self.local_types
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Close the body and build the test function
    pub fn finish(&self) -> Function {
        let mut function = Function::new(self.local_types.iter().map(|ty| (1, *ty)));
        for instruction in &self.instructions {
            function.instruction(instruction);
        }
        function.instruction(&Instruction::End);
        function
    }
}

fn zero(ty: ValType) -> Instruction<'static> {
    match ty {
        ValType::I64 => Instruction::I64Const(0),
        ValType::F32 => Instruction::F32Const(0.0),
        ValType::F64 => Instruction::F64Const(0.0),
        _ => Instruction::I32Const(0),
    }
}

fn value_type(reference: &VariableReference) -> Result<ValType> {
    wasm_type(reference.ty()).ok_or_else(|| {
        Error::Codegen(format!(
            "void value at position {} used as an operand",
            reference.position()
        ))
    })
}
