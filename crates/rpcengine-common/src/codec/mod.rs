//! rpcengine Codec Layer
//!
//! Codecs turn the structured message model into the unit a transport carries
//! and back. The engine works without a codec (structured-clone style
//! transports hand values across directly); installing one switches outbound
//! traffic to encoded bytes.
//!
//! # Components
//!
//! - **[`Frame`]**: the unit passed to `transmit` and to `receive`
//! - **[`Codec`]**: encode/decode contract, plus best-effort id recovery from
//!   undecodable input
//! - **[`JsonCodec`]**: the bundled JSON implementation

pub mod json;


use serde_json::Value;

use crate::protocol::error::Result;
use crate::protocol::message::Id;

pub use json::JsonCodec;

/// One unit crossing the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A structured message, used when no codec is installed
    Value(Value),
    /// An encoded message, used when a codec is installed
    Bytes(Vec<u8>),
}

impl From<Value> for Frame {
    fn from(value: Value) -> Self {
        Frame::Value(value)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Frame::Bytes(bytes)
    }
}

/// Serialization contract between the engine and the wire.
///
/// Both directions may fail; the engine reports encode failures as the outcome
/// of the call being sent, and decode failures as parse errors.
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "custom"
    }

    fn encode(&self, message: &Value) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> Result<Value>;

    /// Tries to read the call identifier out of input that failed to decode,
    /// so the parse error can be addressed to the caller.
    fn recover_id(&self, _data: &[u8]) -> Option<Id> {
        None
    }
}
