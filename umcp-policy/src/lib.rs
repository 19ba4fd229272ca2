//! Security checks applied to a built command line before it runs.
//!
//! The [`Sandbox`] is a heuristic filter: it rejects blocked binaries, shell
//! metacharacters, and paths outside the allowed prefixes. It inspects tokens
//! by position and substring only and does not understand quoting.

#![warn(missing_docs, clippy::pedantic)]

pub mod sandbox;

pub use sandbox::{CommandValidator, INJECTION_PATTERNS, Sandbox, SandboxError, SandboxResult};
