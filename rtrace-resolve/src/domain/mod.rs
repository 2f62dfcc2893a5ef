//! Domain model for rtrace-resolve
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - A single configuration object handed to the resolver
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ModuleId, OperationMode, ResolveMethod, ResolveOptions};

pub use errors::{ElfError, ResolveError, TraceError};
