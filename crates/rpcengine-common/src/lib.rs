//! rpcengine Common Types and Codecs
//!
//! This crate provides the protocol definitions and codec layer shared by every
//! part of the rpcengine workspace.
//!
//! # Overview
//!
//! rpcengine is a transport-agnostic, bidirectional remote-call engine. Two
//! peers exchange calls, notifications and results over a duplex channel the
//! engine does not own. This crate contains the pieces both peers agree on:
//!
//! - **Protocol Layer**: [`Message`], [`Request`], [`Response`], [`Id`] and the
//!   [`RpcError`] taxonomy with its reserved codes
//! - **Codec Layer**: the [`Codec`] trait, the bundled [`JsonCodec`], and the
//!   [`Frame`] unit handed to and received from a transport
//!
//! # Wire Shapes
//!
//! - Request: `{"jsonrpc": "2.0", "id"?: ..., "method": "...", "params"?: [...] | {...}}`
//! - Response: `{"jsonrpc": "2.0", "id": ..., "result"?: ...}` or
//!   `{"jsonrpc": "2.0", "id": ..., "error": {"message": "...", "code"?: ..., "data"?: ...}}`
//!
//! A message is a request iff it carries `method`; otherwise it must be a
//! response carrying `id`.
//!
//! # Example
//!
//! ```
//! use rpcengine_common::{Codec, Id, JsonCodec, Message, Request};
//! use serde_json::json;
//!
//! let request = Request::call(Id::Number(7), "add", Some(json!([1, 2])));
//! let bytes = JsonCodec.encode(&request.to_value()).unwrap();
//!
//! let decoded = JsonCodec.decode(&bytes).unwrap();
//! match Message::classify(decoded).unwrap() {
//!     Message::Request(req) => assert_eq!(req.method, "add"),
//!     Message::Response(_) => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod protocol;

pub use codec::{Codec, Frame, JsonCodec};
pub use protocol::*;
