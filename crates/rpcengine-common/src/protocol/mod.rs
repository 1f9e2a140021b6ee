pub mod error;
pub mod message;

#[cfg(test)]
mod tests;

pub use error::{
    EngineError, Result, RpcError, FEED_NOT_FOUND, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use message::{Id, InvalidMessage, Message, Request, Response, JSONRPC_VERSION};
