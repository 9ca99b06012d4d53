//! Troupe Engine Library
//!
//! Multi-agent workflow orchestration: members and squads sequenced along a
//! directed graph, with shared conversational memory, an observability log,
//! and a self-contained regression-test harness. This library holds all of
//! the semantics; the `troupe` binary is a thin front end.

/// Configuration management module
pub mod config;

/// Workflow orchestration and test harness
pub mod engine;

/// LLM capability abstraction layer
pub mod llm;

/// Shared conversation memory module
pub mod memory;

/// Observability event sink and report rendering
pub mod observer;

/// Member turn execution module
pub mod runner;

/// Native runtime for loading custom tools
pub mod runtime;

/// Telemetry and structured logging setup
pub mod telemetry;

/// Built-in tools and the tool capability registry
pub mod tools;

/// CLI interface module
pub mod cli;
