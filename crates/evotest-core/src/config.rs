//! Configuration types for mutation, code generation and execution.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Mutation parameters consumed by the random mutation factory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability of replacing each operand of a mutated statement
    pub operand_replacement_rate: f64,
    /// Probability of swapping the invoked operation for a compatible one
    pub operation_swap_rate: f64,
    /// Largest absolute delta applied to integral literals
    pub max_int_delta: i64,
    /// Largest absolute delta applied to floating point literals
    pub max_float_delta: f64,
    /// Maximum length of regenerated string literals
    pub max_string_length: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            operand_replacement_rate: 0.5,
            operation_swap_rate: 0.2,
            max_int_delta: 20,
            max_float_delta: 1.0,
            max_string_length: 16,
        }
    }
}

/// Source text rendering options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Indentation for the body of protective blocks
    pub indent: String,
    /// Prefix of generated variable names (`var0`, `var1`, ...)
    pub variable_prefix: String,
    /// Render attached assertions after each statement
    pub emit_assertions: bool,
    /// Tolerance used in floating point assertions
    pub float_delta: f64,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            variable_prefix: "var".to_string(),
            emit_assertions: true,
            float_delta: 0.01,
        }
    }
}

/// Program execution options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Evaluate attached assertions after each executed statement
    pub evaluate_assertions: bool,
    /// Stop executing a program at the first captured subject fault
    pub stop_on_fault: bool,
    /// Maximum WASM stack for module-backed subjects (bytes)
    pub max_wasm_stack: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            evaluate_assertions: true,
            stop_on_fault: true,
            max_wasm_stack: 512 * 1024,
        }
    }
}

/// All engine-level configuration in one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed for every random choice made by the mutation factory
    pub seed: u64,
    pub mutation: MutationConfig,
    pub codegen: CodegenConfig,
    pub execution: ExecutionConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let mutation = MutationConfig::default();
        assert_eq!(mutation.max_int_delta, 20);

        let codegen = CodegenConfig::default();
        assert_eq!(codegen.variable_prefix, "var");
        assert!(codegen.emit_assertions);

        let execution = ExecutionConfig::default();
        assert!(execution.stop_on_fault);

        let engine = EngineConfig::default();
        assert_eq!(engine.seed, 0);
    }

    #[test]
    fn test_engine_config_json() {
        let mut config = EngineConfig::default();
        config.seed = 7;
        config.mutation.operation_swap_rate = 0.75;

        let json = config.to_json().unwrap();
        let parsed = EngineConfig::from_json(&json).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.mutation.operation_swap_rate, 0.75);
    }

    #[test]
    fn test_malformed_config_is_rejected() {
        assert!(EngineConfig::from_json("{\"seed\": \"seven\"}").is_err());
    }
}
