//! Method routing for MCP requests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use crate::types::{
    CallToolParams, ErrorCode, InitializeParams, PROTOCOL_VERSION, RpcError, SERVER_NAME,
};

/// Methods understood by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `tools/list`
    ToolsList,
    /// `tools/call`
    ToolsCall,
    /// `prompts/list`
    PromptsList,
    /// `resources/list`
    ResourcesList,
    /// `notifications/initialized`; never answered.
    Initialized,
    /// Anything else.
    Unknown(String),
}

impl Method {
    /// Resolves a method name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "initialize" => Self::Initialize,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "prompts/list" => Self::PromptsList,
            "resources/list" => Self::ResourcesList,
            "notifications/initialized" => Self::Initialized,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Returns `true` unless the method is unknown.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

/// Errors handlers report as JSON-RPC error objects.
#[derive(Debug, Error, PartialEq)]
pub enum HandlerError {
    /// Parameters were missing, malformed, or referenced an unknown tool.
    #[error("{message}")]
    InvalidParams {
        /// Error message sent to the client.
        message: String,
        /// Decoder detail, if any.
        data: Option<Value>,
    },

    /// The method is not supported.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The handler failed unexpectedly.
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// Creates an invalid-params error without data.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error from a displayable reason.
    #[must_use]
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Converts the error into its wire form.
    #[must_use]
    pub fn into_rpc_error(self) -> RpcError {
        match self {
            Self::InvalidParams { message, data } => {
                let error = RpcError::new(ErrorCode::InvalidParams, message);
                match data {
                    Some(data) => error.with_data(data),
                    None => error,
                }
            }
            Self::MethodNotFound(method) => {
                RpcError::new(ErrorCode::MethodNotFound, format!("Method not found: {method}"))
            }
            Self::Internal(reason) => RpcError::new(ErrorCode::InternalError, reason),
        }
    }
}

/// Result alias for handler operations.
pub type HandlerResult<T = Value> = Result<T, HandlerError>;

/// Builds the `initialize` result.
#[must_use]
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// Trait implemented by MCP method handlers.
///
/// Only the tool methods must be provided; the rest default to the
/// capabilities this server advertises.
#[async_trait]
pub trait McpHandler: Send + Sync {
    /// Called for `initialize`.
    async fn handle_initialize(&self, params: Option<InitializeParams>) -> HandlerResult {
        let _ = params;
        Ok(initialize_result())
    }

    /// Called for `tools/list`.
    async fn handle_tools_list(&self) -> HandlerResult;

    /// Called for `tools/call`.
    async fn handle_tools_call(&self, params: CallToolParams) -> HandlerResult;

    /// Called for `prompts/list`.
    async fn handle_prompts_list(&self) -> HandlerResult {
        Ok(json!({ "prompts": [] }))
    }

    /// Called for `resources/list`.
    async fn handle_resources_list(&self) -> HandlerResult {
        Ok(json!({ "resources": [] }))
    }

    /// Called for `notifications/initialized`.
    async fn handle_initialized(&self) -> HandlerResult<()> {
        Ok(())
    }

    /// Fallback invoked for unknown methods.
    async fn handle_unhandled(&self, method: &str) -> HandlerResult {
        Err(HandlerError::MethodNotFound(method.to_owned()))
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> HandlerResult<T> {
    serde_json::from_value(params).map_err(|err| HandlerError::InvalidParams {
        message: "Invalid parameters".into(),
        data: Some(Value::String(err.to_string())),
    })
}

/// Dispatches a method to the appropriate handler.
///
/// Returns `Ok(None)` for `notifications/initialized`, which is never answered.
///
/// # Errors
///
/// Propagates errors returned by the handler, and returns
/// [`HandlerError::InvalidParams`] when parameters fail to decode.
pub async fn dispatch_request<H>(
    handler: &H,
    method: &Method,
    params: Option<Value>,
) -> HandlerResult<Option<Value>>
where
    H: McpHandler + ?Sized,
{
    let params = params.filter(|value| !value.is_null());
    let result = match method {
        Method::Initialize => {
            let params = params.map(decode::<InitializeParams>).transpose()?;
            handler.handle_initialize(params).await?
        }
        Method::ToolsList => handler.handle_tools_list().await?,
        Method::ToolsCall => {
            let params = params.ok_or_else(|| HandlerError::InvalidParams {
                message: "Invalid parameters".into(),
                data: Some(Value::String("missing params".into())),
            })?;
            handler.handle_tools_call(decode(params)?).await?
        }
        Method::PromptsList => handler.handle_prompts_list().await?,
        Method::ResourcesList => handler.handle_resources_list().await?,
        Method::Initialized => {
            handler.handle_initialized().await?;
            return Ok(None);
        }
        Method::Unknown(name) => handler.handle_unhandled(name).await?,
    };
    Ok(Some(result))
}
