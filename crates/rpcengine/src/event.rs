//! Local observation channel.
//!
//! Engines publish lifecycle changes and every locally observed failure on a
//! broadcast channel; see [`Engine::events`](crate::Engine::events).

use rpcengine_common::RpcError;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    InterfaceAdded { path: String },
    InterfaceRemoved { path: String },
    FeedAdded { path: String },
    FeedRemoved { path: String },
    /// Emitted once, when the engine shuts down
    Closed { reason: RpcError },
    /// A failure the engine could not hand to a caller: undecodable or
    /// invalid input, stray error responses, handler failures, transmit
    /// failures of notifications and responses
    Error(RpcError),
}

impl EngineEvent {
    pub fn as_error(&self) -> Option<&RpcError> {
        match self {
            EngineEvent::Error(err) => Some(err),
            _ => None,
        }
    }
}
