//! rpcengine - Bidirectional Remote-Call Engine
//!
//! A transport-agnostic engine that lets two peers call each other's methods,
//! send one-way notifications, and subscribe to each other's events over any
//! duplex channel.
//!
//! # Overview
//!
//! An [`Engine`] sits between application code and a [`Transport`]:
//!
//! - **Outbound**: [`Engine::call`] assigns an id, records the call as
//!   pending, and resolves when the matching response arrives, the timeout
//!   elapses, or the engine is closed. [`Engine::notify`] sends without
//!   expecting an answer.
//! - **Inbound**: the embedding code passes every received frame to
//!   [`Engine::receive`]. Requests are dispatched to [`Interface`]s mounted
//!   at dotted paths; responses complete pending calls.
//! - **Events**: local [`Feed`]s can be exposed to the peer, which subscribes
//!   with [`Engine::subscribe`].
//!
//! # Example
//!
//! ```no_run
//! use rpcengine::{handler_fn, loopback, parse_params, EngineConfig, Interface};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, server) = loopback::pair(EngineConfig::default(), EngineConfig::default());
//!
//!     server.mount("math", Interface::new().method("add", handler_fn(|params| async move {
//!         let (a, b): (i64, i64) = parse_params(params)?;
//!         Ok(json!(a + b))
//!     })));
//!
//!     let sum: i64 = client.call_as("math.add", vec![json!(1), json!(1336)]).await.unwrap();
//!     assert_eq!(sum, 1337);
//! }
//! ```

pub mod config;
mod dispatcher;
pub mod engine;
pub mod event;
pub mod handler;
pub mod interface;
pub mod loopback;
mod pending;
pub mod stats;
pub mod subscription;
pub mod transport;
pub mod tree;

pub use config::EngineConfig;
pub use engine::{Engine, WeakEngine};
pub use event::EngineEvent;
pub use handler::{callback_fn, handler_fn, parse_params, Handler, HandlerResult, Reply};
pub use interface::Interface;
pub use stats::EngineStats;
pub use subscription::{Feed, ListenerId, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD};
pub use transport::Transport;
pub use tree::MountChange;

pub use rpcengine_common::{
    Codec, EngineError, Frame, Id, JsonCodec, RpcError, FEED_NOT_FOUND, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
