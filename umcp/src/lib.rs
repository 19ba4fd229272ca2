//! Expose command-line tools to MCP clients.
//!
//! Tools are declared in YAML catalogs, marshaled into argument vectors,
//! validated against a per-catalog security policy, executed as child
//! processes, and answered over line-delimited JSON-RPC on stdio. This crate
//! bundles the component crates and ships the `umcp` binary.

#![warn(missing_docs, clippy::pedantic)]

/// Catalog, tool, argument, and output data model.
pub use umcp_primitives as primitives;

/// Command building, output parsing, and the tool registry.
pub use umcp_tools as tools;

/// Command validation against security policies.
pub use umcp_policy as policy;

/// Message tracing and replay.
pub use umcp_telemetry as telemetry;

/// YAML catalog loading and validation.
pub use umcp_config as config;

/// Process execution and the JSON-RPC server loop.
pub use umcp_kernel as kernel;
