//! Request pipeline for umcp.
//!
//! The [`Server`] reads newline-delimited JSON-RPC requests, routes them to an
//! [`McpHandler`], and writes one response per request. [`ToolHandler`] answers
//! `tools/call` by running the [`Executor`]: build the command line, validate
//! it against the catalog's policy, run it, and normalize the output.

#![warn(missing_docs, clippy::pedantic)]

pub mod executor;
pub mod handlers;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod types;

pub use executor::{ChainError, ChainResult, ExecError, ExecResult, Executor, TRUNCATION_MARKER};
pub use handlers::{HandlerError, HandlerResult, McpHandler, Method, dispatch_request};
pub use lifecycle::{DispatchError, DispatchEvent, DispatchLifecycle, DispatchState};
pub use protocol::{Protocol, ProtocolError, ProtocolResult};
pub use server::{Server, ServerError, ServerResult, ToolHandler};
pub use types::{CallToolParams, CallToolResult, ErrorCode, Request, Response, RpcError};
