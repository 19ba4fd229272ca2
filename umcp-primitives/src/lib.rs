//! Core shared types for umcp tool catalogs.
//!
//! A [`Catalog`] is one loaded tool definition set: a base command, the
//! security policy applied to every call, and the tools it exposes. Every type
//! here is immutable once loaded and deserializes straight from the catalog
//! file format.

#![warn(missing_docs, clippy::pedantic)]

mod catalog;
mod condition;
pub mod duration;
mod error;
mod output;
mod tool;

/// Catalog, settings, and security policy types.
pub use catalog::{
    Catalog, CatalogMetadata, CatalogSettings, DEFAULT_MAX_OUTPUT_SIZE, DEFAULT_TIMEOUT,
    SecurityPolicy, qualified_name,
};
/// Typed conditional-argument expressions.
pub use condition::{Condition, ConditionOp};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Output interpretation specs.
pub use output::{CoercionType, Group, OutputSpec, OutputType};
/// Tool, argument, and chain definitions.
pub use tool::{ArgType, ArgumentSpec, ChainStep, ToolDefinition};
