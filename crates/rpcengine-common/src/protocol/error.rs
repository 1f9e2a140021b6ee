//! Error taxonomy
//!
//! Two error types live here:
//!
//! - [`RpcError`] is the wire-level `{message, code?, data?}` triple. It is what
//!   a caller receives when a call fails and what a handler returns to fail a
//!   request.
//! - [`EngineError`] covers local plumbing failures (codec, transport,
//!   configuration). It converts into an [`RpcError`] with code `-32603` when it
//!   has to be reported as the outcome of a call.
//!
//! # Reserved Codes
//!
//! - `-32700`: Parse error (inbound unit could not be decoded)
//! - `-32600`: Invalid request (decoded value is neither a request nor a response)
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error (transmission failure, timeout, handler panic)
//! - `-32001`: Feed not found (subscription bridge)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Invalid data was received and could not be decoded
pub const PARSE_ERROR: i64 = -32700;
/// The decoded value is not a valid request or response
pub const INVALID_REQUEST: i64 = -32600;
/// The method path does not resolve
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The handler could not interpret its parameters
pub const INVALID_PARAMS: i64 = -32602;
/// Transmission failed, the call timed out, or a handler panicked
pub const INTERNAL_ERROR: i64 = -32603;
/// A subscription named a feed path that is not mounted
pub const FEED_NOT_FOUND: i64 = -32001;

/// Wire-level RPC error.
///
/// Serializes as the `error` member of a response. `Display` renders only the
/// message, so `err.to_string()` matches what the peer sent.
///
/// # Example
///
/// ```
/// use rpcengine_common::{RpcError, METHOD_NOT_FOUND};
///
/// let err = RpcError::method_not_found("math.sqrt");
/// assert_eq!(err.code, Some(METHOD_NOT_FOUND));
/// assert_eq!(err.to_string(), "method not found");
///
/// let app = RpcError::new("insufficient funds").with_code(42);
/// assert_eq!(app.code, Some(42));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct RpcError {
    /// Short description of the error
    pub message: String,
    /// Error code, absent for plain application errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an application error with no code and no data.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Parse error (-32700), carrying the undecodable unit as `data`.
    pub fn parse_error(raw: Option<Value>) -> Self {
        Self {
            message: "parse error".into(),
            code: Some(PARSE_ERROR),
            data: raw,
        }
    }

    /// Invalid request (-32600), carrying the offending message as `data`.
    pub fn invalid_request(raw: Value) -> Self {
        Self {
            message: "invalid request".into(),
            code: Some(INVALID_REQUEST),
            data: Some(raw),
        }
    }

    /// Method not found (-32601), carrying the requested path as `data`.
    pub fn method_not_found(path: &str) -> Self {
        Self {
            message: "method not found".into(),
            code: Some(METHOD_NOT_FOUND),
            data: Some(Value::String(path.to_string())),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(INVALID_PARAMS),
            data: None,
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(INTERNAL_ERROR),
            data: None,
        }
    }

    /// The deadline of a pending call elapsed before its response arrived.
    pub fn timed_out() -> Self {
        Self::internal_error("call timed out")
    }

    /// Default reason used to reject pending calls when the engine closes.
    pub fn connection_closed() -> Self {
        Self::new("connection closed")
    }

    /// Feed not found (-32001), carrying the subscription name as `data`.
    pub fn feed_not_found(name: &str) -> Self {
        Self {
            message: "feed not found".into(),
            code: Some(FEED_NOT_FOUND),
            data: Some(Value::String(name.to_string())),
        }
    }

    /// Returns `true` if this error carries the given code.
    pub fn is(&self, code: i64) -> bool {
        self.code == Some(code)
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        RpcError::new(err.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::invalid_params(err.to_string())
    }
}

/// Local plumbing failures.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Engine closed")]
    Closed,
}

impl From<EngineError> for RpcError {
    /// Codec and transport failures keep the collaborator's own message so the
    /// caller sees exactly what `transmit` or `encode` reported.
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Codec(msg) | EngineError::Transport(msg) => RpcError::internal_error(msg),
            EngineError::Closed => RpcError::connection_closed(),
            other => RpcError::internal_error(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
