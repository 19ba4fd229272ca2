//! Tool-call plumbing shared by the umcp executor and dispatcher.
//!
//! [`builder`] turns typed argument values into a command line, [`parser`]
//! reinterprets captured output, [`registry`] indexes every loaded tool by its
//! fully qualified name, and [`schema`] renders the input schema advertised to
//! clients.

#![warn(missing_docs, clippy::pedantic)]

pub mod builder;
pub mod parser;
pub mod registry;
pub mod schema;

pub use builder::{BuildError, BuildResult, CommandBuilder};
pub use parser::{ParseError, ParseResult, parse_output};
pub use registry::{RegisteredTool, RegistryError, RegistryResult, ToolRegistry};
pub use schema::input_schema;
