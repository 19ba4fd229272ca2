//! Error types for catalog loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced while loading a catalog file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Catalog file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a well-formed catalog document.
    #[error("failed to parse YAML in {}: {source}", path.display())]
    Parse {
        /// Catalog file path.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The catalog parsed but violates a structural rule.
    #[error("configuration validation failed for {}: {source}", path.display())]
    Invalid {
        /// Catalog file path.
        path: PathBuf,
        /// Violated rule.
        #[source]
        source: ValidationError,
    },
}

/// Structural rules a catalog must satisfy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// `metadata.name` is empty.
    #[error("metadata.name is required")]
    MissingName,

    /// `settings.command` is empty.
    #[error("settings.command is required")]
    MissingCommand,

    /// The catalog declares no tools.
    #[error("at least one tool must be defined")]
    NoTools,

    /// A tool has an empty name.
    #[error("tool name is required")]
    MissingToolName,

    /// A tool has an empty description.
    #[error("tool {tool}: description is required")]
    MissingDescription {
        /// Tool name.
        tool: String,
    },

    /// A regex output declares no pattern.
    #[error("tool {tool}: pattern is required for regex output")]
    MissingPattern {
        /// Tool name.
        tool: String,
    },

    /// An argument has an empty name.
    #[error("tool {tool}: argument name is required")]
    MissingArgumentName {
        /// Tool name.
        tool: String,
    },

    /// Two arguments of one tool share a name.
    #[error("tool {tool}: duplicate argument {argument}")]
    DuplicateArgument {
        /// Tool name.
        tool: String,
        /// Argument name.
        argument: String,
    },

    /// A required argument declares a default.
    #[error("tool {tool}, argument {argument}: required arguments cannot have defaults")]
    RequiredWithDefault {
        /// Tool name.
        tool: String,
        /// Argument name.
        argument: String,
    },
}
