//! Catalog file loading for umcp.
//!
//! Catalogs are YAML documents deserialized straight into
//! [`umcp_primitives::Catalog`] and validated before the server starts. Any
//! error here is fatal at startup.

#![warn(missing_docs, clippy::pedantic)]

pub mod client;
mod error;
pub mod loader;

pub use client::generate_client_config;
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use loader::{load_catalog, parse_catalog, validate_catalog};
