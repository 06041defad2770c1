//! # Morphline - record-transformation pipelines for log and event ETL
//!
//! A morphline is a chain of commands compiled from a JSON or TOML
//! configuration. Records (ordered multimaps of field name to values) are
//! pushed in at the head; each command transforms, filters, splits or
//! routes them and hands the survivors to its downstream continuation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ JSON / TOML │────▶│  Compiler   │────▶│    Pipe     │────▶│    Sink     │
//! │  (${VARS})  │     │ (registry)  │     │ (commands)  │     │ (collector) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use morphline::{compile, Collector, MorphlineContext, Record};
//!
//! let config = serde_json::json!({
//!     "commands": [{ "addValues": { "source": "syslog" } }]
//! });
//! let sink = Collector::new();
//! let mut morphline = compile(&config, None, Box::new(sink.clone()), Arc::new(MorphlineContext::new()))?;
//!
//! let mut record = Record::new();
//! record.put("message", "hello");
//! morphline.process(record)?;
//! assert_eq!(sink.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types (config, compile, runtime, CLI)
//! - [`record`] - Records and values
//! - [`config`] - Configuration nodes, loading and `${VAR}` substitution
//! - [`command`] - The command contract, sinks and notifications
//! - [`registry`] - Command builder registry and import patterns
//! - [`compiler`] - Configuration to command tree
//! - [`morphline`] - A compiled, runnable morphline
//! - [`flow`] - Control flow: pipe, if, tryRules, forEach, not
//! - [`stdlib`] - Standard commands (fields, grok, readers, ...)
//! - [`metrics`] - Counters and timers

// Core modules
pub mod error;
pub mod record;

// Configuration
pub mod config;

// Engine
pub mod command;
pub mod compiler;
pub mod context;
pub mod metrics;
pub mod morphline;
pub mod registry;

// Commands
pub mod flow;
pub mod stdlib;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CliError, CliResult, CompileError, CompileResult, ConfigError, ConfigResult, RuntimeError, RuntimeResult,
};

// =============================================================================
// Re-exports - Records
// =============================================================================

pub use record::{fields, Record, Value};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{load_document, parse_json, parse_toml, resolve_variables, ConfigNode, Variables};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use command::{Collector, Command, Discard, Downstream, Notification, Sink};
pub use compiler::{compile, compile_file, Compiler, DEFAULT_MORPHLINE_ID};
pub use context::{FaultPolicy, MorphlineContext};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use morphline::Morphline;
pub use registry::{BuildScope, CommandBuilder, ImportPattern, Registry};
