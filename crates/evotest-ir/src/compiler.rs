//! Compiler from test programs to WebAssembly modules.

use crate::codegen::BytecodeEmitter;
use crate::program::TestProgram;
use evotest_core::{FaultKind, Result};
use std::collections::BTreeMap;
use wasm_encoder::{
    CodeSection, CustomSection, EntityType, ExportKind, ExportSection, FunctionSection,
    ImportSection, Module, TypeSection, ValType,
};

pub struct Compiler {
    config: CompilerConfig,
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Module name of every subject import
    pub import_module: String,
    /// Export name of the test function
    pub export_name: String,
    /// Emit the string pool as a custom section
    pub embed_strings: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            import_module: "subject".to_string(),
            export_name: "test".to_string(),
            embed_strings: true,
        }
    }
}

/// Name of the custom section holding the JSON string pool
pub const STRING_POOL_SECTION: &str = "evotest.strings";

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Assemble a module whose exported test function runs `program`.
    ///
    /// Statements listed in `faults` are wrapped in protective blocks.
    pub fn compile(&self, program: &TestProgram, faults: &BTreeMap<usize, FaultKind>) -> Result<Vec<u8>> {
        let mut emitter = BytecodeEmitter::new();
        for statement in program.statements() {
            statement.emit_bytecode(&mut emitter, faults.get(&statement.position()))?;
        }

        let mut module = Module::new();

        // One signature per import, then the test function: () -> ()
        let mut types = TypeSection::new();
        for import in emitter.imports() {
            types.function(import.params.iter().copied(), import.results.iter().copied());
        }
        types.function(Vec::<ValType>::new(), Vec::<ValType>::new());
        module.section(&types);

        let mut imports = ImportSection::new();
        for (index, import) in emitter.imports().iter().enumerate() {
            imports.import(
                &self.config.import_module,
                &import.name,
                EntityType::Function(index as u32),
            );
        }
        module.section(&imports);

        let test_index = emitter.imports().len() as u32;
        let mut functions = FunctionSection::new();
        functions.function(test_index);
        module.section(&functions);

        let mut exports = ExportSection::new();
        exports.export(&self.config.export_name, ExportKind::Func, test_index);
        module.section(&exports);

        let mut code = CodeSection::new();
        code.function(&emitter.finish());
        module.section(&code);

        if self.config.embed_strings && !emitter.strings().is_empty() {
            let pool = serde_json::to_vec(emitter.strings())?;
            module.section(&CustomSection {
                name: STRING_POOL_SECTION.into(),
                data: pool.into(),
            });
        }

        tracing::debug!(
            program = %program.id(),
            imports = emitter.imports().len(),
            locals = emitter.locals().len(),
            "compiled test program"
        );
        Ok(module.finish())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}
