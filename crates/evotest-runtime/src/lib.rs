//! Execution of test programs against a subject.
//!
//! This crate provides:
//! - The `Subject` invocation boundary and its fault taxonomy
//! - Per-statement execution into a fresh `Scope`
//! - Whole-program runs with assertion evaluation
//! - Native (closure) and WASM (wasmtime) subjects

pub mod execute;
pub mod executor;
pub mod native;
pub mod scope;
pub mod subject;
pub mod wasm;

#[cfg(test)]
mod testing;

pub use execute::{Evaluate, Execute};
pub use executor::{ExecutionResult, Executor, FailedAssertion};
pub use native::{Heap, NativeFn, NativeSubject, NativeSubjectBuilder};
pub use scope::Scope;
pub use subject::{Invocation, InvocationResult, Subject};
pub use wasm::WasmSubject;
