//! Core types and utilities for the evotest test-generation engine.

pub mod types;
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::{Error, InfrastructureFault, Result, StructuralError};
pub use types::*;
pub use config::*;
