//! Runtime for loading custom tools
//!
//! The engine resolves custom tools through the abstract
//! [`sdk::tool::ModuleLoader`] capability; this module provides the
//! production implementation backed by native shared libraries.

pub mod native;

pub use native::NativeModuleLoader;
