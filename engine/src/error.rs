//! Error types for the morphline engine.
//!
//! Three layers, matching the three moments something can go wrong:
//!
//! - [`ConfigError`] - reading and resolving a configuration document
//! - [`CompileError`] - turning a configuration into a command tree
//! - [`RuntimeError`] - processing a record or a notification
//!
//! A boolean `false` returned from `process` is *not* an error: it is the
//! normal "did not match" outcome. Only unrecoverable conditions become
//! [`RuntimeError`]s.
//!
//! [`CliError`] wraps everything for the `morphline` binary.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or reading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML.
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// `${NAME}` without a value.
    #[error("Unresolved substitution: ${{{0}}}")]
    UnresolvedSubstitution(String),

    /// Required key absent.
    #[error("Missing required key '{key}' at {path}")]
    MissingKey { path: String, key: String },

    /// Key present with the wrong shape.
    #[error("Invalid value for '{key}' at {path}: expected {expected}")]
    WrongType {
        path: String,
        key: String,
        expected: &'static str,
    },

    /// Keys no builder understands.
    #[error("Unrecognized key(s) at {path}: {}. Allowed: {}", .keys.join(", "), .allowed.join(", "))]
    UnknownKeys {
        path: String,
        keys: Vec<String>,
        allowed: Vec<String>,
    },

    /// Unsupported file extension.
    #[error("Unsupported config format: {0} (expected .json or .toml)")]
    UnsupportedFormat(String),
}

// =============================================================================
// Compilation Errors
// =============================================================================

/// Errors raised while building a command tree.
///
/// A compilation fault is always fatal to the whole compile call: a
/// morphline is never partially built.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No builder registered under this name for the import specs in use.
    #[error("No command builder registered for name '{name}' (importCommands: {imports:?})")]
    UnknownCommand { name: String, imports: Vec<String> },

    /// A command node is not shaped like `{ name: { options } }`.
    #[error("Invalid command definition at {path}: {message}")]
    InvalidCommand { path: String, message: String },

    /// An option value was present and well-typed but unusable.
    #[error("{message} (command '{command}')")]
    InvalidArgument { command: String, message: String },

    /// No morphline with this id in the document.
    #[error("Morphline not found: {0}")]
    MorphlineNotFound(String),

    /// The document declares no morphline at all.
    #[error("Config document contains no morphline")]
    EmptyDocument,
}

impl CompileError {
    /// Shorthand for [`CompileError::InvalidArgument`].
    pub fn invalid(command: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::InvalidArgument {
            command: command.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Runtime Errors
// =============================================================================

/// An unrecoverable fault while processing a record or a notification.
///
/// It unwinds the current `process` call and reaches the host unmodified.
/// The only place the engine turns one back into a `false` is `tryRules`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct RuntimeError {
    /// Name of the command that raised the fault.
    pub command: String,
    /// Human-readable description.
    pub message: String,
}

impl RuntimeError {
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// CLI Errors (top-level)
// =============================================================================

/// Errors surfaced by the `morphline` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error in '{}': {}", .0.command, .0.message)]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for record processing.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Result type for the CLI.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let config_err = ConfigError::UnresolvedSubstitution("ZK_HOST".into());
        let compile_err: CompileError = config_err.into();
        assert!(compile_err.to_string().contains("${ZK_HOST}"));

        let cli_err: CliError = compile_err.into();
        assert!(cli_err.to_string().starts_with("Compile error"));
    }

    #[test]
    fn test_invalid_argument_starts_with_message() {
        let err = CompileError::invalid("convertTimestamp", "Unknown timezone: Mars/Olympus");
        assert!(err.to_string().starts_with("Unknown timezone"));
    }

    #[test]
    fn test_unknown_keys_format() {
        let err = ConfigError::UnknownKeys {
            path: "commands[0].split".into(),
            keys: vec!["sepparator".into()],
            allowed: vec!["inputField".into(), "separator".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Unrecognized key(s)"));
        assert!(msg.contains("sepparator"));
        assert!(msg.contains("separator"));
    }

    #[test]
    fn test_runtime_error_display_is_message() {
        let err = RuntimeError::new("tryRules", "tryRules command found no successful rule for record");
        assert_eq!(err.to_string(), "tryRules command found no successful rule for record");
        let cli: CliError = err.into();
        assert!(cli.to_string().contains("'tryRules'"));
    }
}
