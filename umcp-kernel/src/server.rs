//! Sequential request loop and the tool-backed handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info, warn};
use umcp_telemetry::{EventKind, TraceError, Tracer};
use umcp_tools::{RegisteredTool, ToolRegistry};

use crate::executor::Executor;
use crate::handlers::{HandlerError, HandlerResult, McpHandler, Method, dispatch_request};
use crate::lifecycle::{DispatchError, DispatchEvent, DispatchLifecycle, DispatchState};
use crate::protocol::{Protocol, ProtocolError};
use crate::types::{CallToolParams, CallToolResult, ErrorCode, Request, Response, RpcError};

/// Errors that end the request loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The dispatch state machine was driven out of order.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The trace file could not be finalized.
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Result alias for the request loop.
pub type ServerResult<T> = Result<T, ServerError>;

/// Handler answering tool methods from a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolHandler {
    registry: Arc<ToolRegistry>,
    executor: Executor,
}

impl ToolHandler {
    /// Creates a handler over `registry`, running tools with `executor`.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, executor: Executor) -> Self {
        Self { registry, executor }
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    async fn call(&self, tool: &RegisteredTool, params: &CallToolParams) -> CallToolResult {
        let catalog = tool.catalog();
        let definition = tool.definition();

        if definition.chain().is_empty() {
            match self.executor.execute(catalog, definition, &params.arguments).await {
                Ok(output) => CallToolResult::success(output),
                Err(err) => failure(&err, err.captured_output()),
            }
        } else {
            match self
                .executor
                .execute_chain(catalog, definition, &params.arguments)
                .await
            {
                Ok(output) => CallToolResult::success(output),
                Err(err) => failure(&err, Some(err.output())),
            }
        }
    }
}

fn failure(err: &dyn std::error::Error, output: Option<&str>) -> CallToolResult {
    let mut text = format!("Command failed: {err}");
    if let Some(output) = output.filter(|output| !output.is_empty()) {
        text.push_str("\n\n");
        text.push_str(output);
    }
    CallToolResult::failure(text)
}

#[async_trait]
impl McpHandler for ToolHandler {
    async fn handle_tools_list(&self) -> HandlerResult {
        let tools: Vec<Value> = self
            .registry
            .tools()
            .iter()
            .map(RegisteredTool::descriptor)
            .collect();
        Ok(json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, params: CallToolParams) -> HandlerResult {
        let Some(tool) = self.registry.get(&params.name) else {
            return Err(HandlerError::invalid_params(format!(
                "Tool not found: {}",
                params.name
            )));
        };
        debug!(tool = %params.name, "calling tool");

        let result = self.call(tool, &params).await;
        if result.is_error {
            warn!(tool = %params.name, "tool call failed");
        }
        serde_json::to_value(result).map_err(|err| HandlerError::internal(err.to_string()))
    }
}

/// Sequential JSON-RPC server.
///
/// Each request is read, handled to completion, and answered before the
/// next one is read, so responses always follow request order.
#[derive(Debug)]
pub struct Server<H> {
    handler: H,
    tracer: Arc<Tracer>,
    lifecycle: DispatchLifecycle,
}

impl<H> Server<H>
where
    H: McpHandler,
{
    /// Creates a server dispatching to `handler` and reporting to `tracer`.
    #[must_use]
    pub fn new(handler: H, tracer: Arc<Tracer>) -> Self {
        Self {
            handler,
            tracer,
            lifecycle: DispatchLifecycle::new(),
        }
    }

    /// Returns the current dispatch state.
    #[must_use]
    pub const fn state(&self) -> DispatchState {
        self.lifecycle.state()
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serves requests until the input stream ends, then finalizes the trace.
    ///
    /// Read and parse failures are logged and the loop keeps reading. A
    /// persistently failing input stream therefore keeps logging.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Dispatch`] on an internal sequencing fault and
    /// [`ServerError::Trace`] if the trace file cannot be finalized.
    pub async fn run<R, W>(&mut self, mut protocol: Protocol<R, W>) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("MCP server started");
        loop {
            match protocol.read_request().await {
                Ok(Some(request)) => self.serve(&mut protocol, request).await?,
                Ok(None) => {
                    self.lifecycle.transition(DispatchEvent::Disconnected)?;
                    info!("client disconnected");
                    break;
                }
                Err(ProtocolError::Parse(err)) => {
                    error!(error = %err, data = %protocol.last_line(), "failed to parse request");
                    self.lifecycle.transition(DispatchEvent::Malformed)?;
                    let response = Response::error(
                        None,
                        RpcError::new(ErrorCode::ParseError, "Parse error")
                            .with_data(Value::String(err.to_string())),
                    );
                    self.respond(&mut protocol, &response).await?;
                }
                Err(err) => error!(error = %err, "failed to read request"),
            }
        }

        self.tracer.log_summary().await;
        self.tracer.close().await?;
        Ok(())
    }

    async fn serve<R, W>(&mut self, protocol: &mut Protocol<R, W>, request: Request) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.lifecycle.transition(DispatchEvent::Received)?;
        let kind = if request.is_notification() {
            EventKind::Notification
        } else {
            EventKind::Request
        };
        self.tracer
            .trace_incoming(kind, serde_json::to_value(&request).unwrap_or(Value::Null))
            .await;

        let method = Method::parse(&request.method);
        let event = if method.is_known() {
            DispatchEvent::Routed
        } else {
            DispatchEvent::Rejected
        };
        self.lifecycle.transition(event)?;

        let Request { id, params, .. } = request;
        let outcome = dispatch_request(&self.handler, &method, params).await;
        if self.lifecycle.state() == DispatchState::Handling {
            let event = if matches!(outcome, Ok(None)) {
                DispatchEvent::Acknowledged
            } else {
                DispatchEvent::Handled
            };
            self.lifecycle.transition(event)?;
        }

        let response = match outcome {
            Ok(Some(result)) => Response::result(id, result),
            Ok(None) => return Ok(()),
            Err(err) => {
                if matches!(err, HandlerError::Internal(_)) {
                    error!(error = %err, "failed to handle request");
                }
                Response::error(id, err.into_rpc_error())
            }
        };
        self.respond(protocol, &response).await
    }

    async fn respond<R, W>(&mut self, protocol: &mut Protocol<R, W>, response: &Response) -> ServerResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.tracer
            .trace_outgoing(
                EventKind::Response,
                serde_json::to_value(response).unwrap_or(Value::Null),
            )
            .await;
        if let Err(err) = protocol.write_response(response).await {
            error!(error = %err, "failed to write response");
        }
        self.lifecycle.transition(DispatchEvent::Sent)?;
        Ok(())
    }
}
