//! Message model
//!
//! A message is one of three shapes:
//!
//! - **Request**: carries `method` and an `id`; the peer must answer it
//! - **Notification**: carries `method` and no `id`; fire-and-forget
//! - **Response**: carries `id` and at most one of `result` / `error`
//!
//! [`Message::classify`] turns a decoded structured value into one of these,
//! or into an [`InvalidMessage`] that keeps the raw value for reporting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RpcError;

/// Protocol version tag written on every outbound message
pub const JSONRPC_VERSION: &str = "2.0";

/// Call identifier.
///
/// Echoed verbatim by the peer. A JSON `null` id is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
}

impl Id {
    /// Parses an id from a JSON value. Returns `None` for anything that is not
    /// an integer or a string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Id::Number),
            Value::String(s) => Some(Id::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

/// A method invocation. Without an `id` it is a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub method: String,
    /// Array or object; absent when the call has no arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a request that expects a response.
    pub fn call(id: Id, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.into()),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Creates a notification (no id, no response).
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.into()),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Normalizes `params` to a positional list: an array is used as-is, an
    /// object becomes a one-element list, and absent params give an empty list.
    pub fn positional_params(&self) -> Vec<Value> {
        match &self.params {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The answer to a request, correlated by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub id: Id,
    /// Present only when the handler produced a non-null value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Creates a success response. A `null` result is omitted from the wire.
    pub fn success(id: Id, result: Value) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.into()),
            id,
            result: if result.is_null() { None } else { Some(result) },
            error: None,
        }
    }

    /// Creates an error response.
    pub fn error(id: Id, error: RpcError) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.into()),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Converts the response into the outcome seen by the caller.
    pub fn into_outcome(self) -> std::result::Result<Value, RpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A decoded, classified message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

/// A decoded value that is neither a valid request nor a valid response.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidMessage {
    /// The offending value, attached as `data` when reported
    pub raw: Value,
    /// The id, when one could still be read from the value
    pub id: Option<Id>,
    /// Whether the value carried a `method` key
    pub request_shaped: bool,
    pub reason: &'static str,
}

impl InvalidMessage {
    fn new(raw: Value, id: Option<Id>, request_shaped: bool, reason: &'static str) -> Self {
        Self {
            raw,
            id,
            request_shaped,
            reason,
        }
    }

    pub fn to_error(&self) -> RpcError {
        RpcError::invalid_request(self.raw.clone())
    }
}

impl Message {
    /// Classifies a decoded value.
    ///
    /// A value with a `method` key is a request; otherwise it must carry a
    /// usable `id` to be a response. If a response carries both `result` and
    /// `error`, the error wins. A non-null `error` that is not a well-formed
    /// error object still fails the call.
    pub fn classify(value: Value) -> std::result::Result<Message, InvalidMessage> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(InvalidMessage::new(other, None, false, "not an object")),
        };

        let id = match map.get("id") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => Id::from_value(raw).map(Some).ok_or(()),
        };

        if map.contains_key("method") {
            return Self::classify_request(map, id);
        }

        let id = match id {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(InvalidMessage::new(Value::Object(map), None, false, "response without id"))
            }
            Err(()) => {
                return Err(InvalidMessage::new(Value::Object(map), None, false, "unusable id"))
            }
        };

        let error = match map.get("error") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<RpcError>(raw.clone())
                    .unwrap_or_else(|_| salvage_error(raw)),
            ),
        };
        let result = match (&error, map.get("result")) {
            (None, Some(v)) if !v.is_null() => Some(v.clone()),
            _ => None,
        };

        Ok(Message::Response(Response {
            jsonrpc: version_of(&map),
            id,
            result,
            error,
        }))
    }

    fn classify_request(
        map: Map<String, Value>,
        id: std::result::Result<Option<Id>, ()>,
    ) -> std::result::Result<Message, InvalidMessage> {
        let id = match id {
            Ok(id) => id,
            Err(()) => return Err(InvalidMessage::new(Value::Object(map), None, true, "unusable id")),
        };

        let method = match map.get("method") {
            Some(Value::String(m)) => m.clone(),
            _ => {
                return Err(InvalidMessage::new(Value::Object(map), id, true, "method is not a string"))
            }
        };

        let params = match map.get("params") {
            None | Some(Value::Null) => None,
            Some(p @ (Value::Array(_) | Value::Object(_))) => Some(p.clone()),
            Some(_) => {
                return Err(InvalidMessage::new(
                    Value::Object(map),
                    id,
                    true,
                    "params must be an array or an object",
                ))
            }
        };

        Ok(Message::Request(Request {
            jsonrpc: version_of(&map),
            id,
            method,
            params,
        }))
    }

    pub fn id(&self) -> Option<&Id> {
        match self {
            Message::Request(req) => req.id.as_ref(),
            Message::Response(res) => Some(&res.id),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Message::Request(req) => req.to_value(),
            Message::Response(res) => res.to_value(),
        }
    }
}

/// Builds a rejection from an `error` member that is not a well-formed error
/// object. A bare string becomes the message; anything else is reported as an
/// invalid request carrying the raw member.
fn salvage_error(raw: &Value) -> RpcError {
    match raw {
        Value::String(message) => RpcError::new(message.clone()),
        other => RpcError::invalid_request(other.clone()),
    }
}

fn version_of(map: &Map<String, Value>) -> Option<String> {
    map.get("jsonrpc").and_then(Value::as_str).map(str::to_string)
}
