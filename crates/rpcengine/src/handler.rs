//! Method handlers
//!
//! A handler receives the positional arguments of an inbound call and
//! eventually produces a result or an [`RpcError`]. Two adapters cover the
//! usual shapes:
//!
//! - [`handler_fn`] wraps an async closure
//! - [`callback_fn`] wraps a closure that is handed a [`Reply`] continuation
//!   and may complete it from anywhere, including another thread

use std::future::Future;

use futures::future::BoxFuture;
use rpcengine_common::RpcError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

/// Outcome of a handler invocation. `Ok(Value::Null)` means "no result".
pub type HandlerResult = Result<Value, RpcError>;

/// Contract for anything that can serve an inbound call.
pub trait Handler: Send + Sync {
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, HandlerResult>;
}

/// Handler backed by an async closure. Built with [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.0)(params))
    }
}

/// Wraps an async closure as a [`Handler`].
///
/// # Example
///
/// ```
/// use rpcengine::{handler_fn, parse_params, Handler};
/// use serde_json::json;
///
/// let add = handler_fn(|params| async move {
///     let (a, b): (i64, i64) = parse_params(params)?;
///     Ok(json!(a + b))
/// });
/// # let _ = add.call(vec![json!(1), json!(2)]);
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler(f)
}

/// One-shot continuation handed to callback-style handlers.
///
/// Dropping a `Reply` without completing it fails the call with an internal
/// error instead of leaving the caller waiting.
#[derive(Debug)]
pub struct Reply {
    tx: oneshot::Sender<HandlerResult>,
}

impl Reply {
    pub fn send(self, outcome: HandlerResult) {
        // the invocation may already be gone (engine shut down)
        let _ = self.tx.send(outcome);
    }

    pub fn ok(self, value: Value) {
        self.send(Ok(value));
    }

    pub fn err(self, error: RpcError) {
        self.send(Err(error));
    }

    /// Completes without a result.
    pub fn done(self) {
        self.send(Ok(Value::Null));
    }
}

/// Handler backed by a continuation-passing closure. Built with [`callback_fn`].
pub struct CallbackHandler<F>(F);

impl<F> Handler for CallbackHandler<F>
where
    F: Fn(Vec<Value>, Reply) + Send + Sync,
{
    fn call(&self, params: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        let (tx, rx) = oneshot::channel();
        (self.0)(params, Reply { tx });
        Box::pin(async move {
            rx.await
                .unwrap_or_else(|_| Err(RpcError::internal_error("handler dropped its reply")))
        })
    }
}

/// Wraps a closure that completes through a [`Reply`].
pub fn callback_fn<F>(f: F) -> CallbackHandler<F>
where
    F: Fn(Vec<Value>, Reply) + Send + Sync,
{
    CallbackHandler(f)
}

/// Deserializes positional arguments into a typed value, usually a tuple.
///
/// Mismatches are reported as invalid-params errors.
pub fn parse_params<T: DeserializeOwned>(params: Vec<Value>) -> Result<T, RpcError> {
    serde_json::from_value(Value::Array(params)).map_err(RpcError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcengine_common::INVALID_PARAMS;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_fn_resolves() {
        let double = handler_fn(|params: Vec<Value>| async move {
            let n = params.first().and_then(Value::as_i64).unwrap_or_default();
            Ok(json!(n * 2))
        });
        assert_eq!(double.call(vec![json!(21)]).await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn test_callback_fn_from_another_thread() {
        let handler = callback_fn(|params: Vec<Value>, reply: Reply| {
            std::thread::spawn(move || reply.ok(json!(params.len())));
        });
        assert_eq!(handler.call(vec![json!(1), json!(2)]).await, Ok(json!(2)));
    }

    #[tokio::test]
    async fn test_dropped_reply_fails() {
        let handler = callback_fn(|_params: Vec<Value>, reply: Reply| drop(reply));
        let err = handler.call(vec![]).await.unwrap_err();
        assert_eq!(err.message, "handler dropped its reply");
    }

    #[tokio::test]
    async fn test_reply_done_is_void() {
        let handler = callback_fn(|_params: Vec<Value>, reply: Reply| reply.done());
        assert_eq!(handler.call(vec![]).await, Ok(Value::Null));
    }

    #[test]
    fn test_parse_params() {
        let (a, b): (i64, String) = parse_params(vec![json!(1), json!("x")]).unwrap();
        assert_eq!((a, b.as_str()), (1, "x"));

        let err = parse_params::<(i64, i64)>(vec![json!("nope")]).unwrap_err();
        assert_eq!(err.code, Some(INVALID_PARAMS));
    }
}
