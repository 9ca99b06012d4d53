//! Troupe SDK
//!
//! Shared capability surface between the troupe engine and external tool
//! authors. The engine consumes tools exclusively through the [`tool::Tool`]
//! trait, resolves dynamically loaded tools through [`tool::ModuleLoader`],
//! and reports failures with [`errors::EngineError`].

/// Error types and handling
pub mod errors;

/// Tool capability traits
pub mod tool;

/// Shared structured-output types
pub mod types;

pub use errors::EngineError;
pub use tool::{ModuleLoader, Tool};
pub use types::{Action, StructuredOutput};
