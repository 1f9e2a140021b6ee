//! Inbound dispatch
//!
//! Every frame handed to [`Engine::receive`](crate::Engine::receive) goes
//! through the same pipeline:
//!
//! 1. decode (byte frames only), answering with a parse error when an id can
//!    still be recovered
//! 2. classify into a request or a response, rejecting anything else as an
//!    invalid request
//! 3. requests are resolved against the mounted interfaces, the builtin
//!    subscription methods, the subscription listeners (notifications only),
//!    and finally the default method; handlers run on their own task so the
//!    caller of `receive` is never blocked
//! 4. responses complete the matching pending call; unknown ids are ignored,
//!    apart from publishing any error they carry

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError};

use futures::FutureExt;
use rpcengine_common::{
    Frame, Id, InvalidMessage, Message, Request, Response, RpcError, PARSE_ERROR,
};
use serde_json::Value;

use crate::engine::EngineInner;
use crate::handler::{Handler, HandlerResult};
use crate::stats::Stats;
use crate::subscription::{SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD};

/// Hands inbound params to handlers as positional arguments.
///
/// Arrays are spread and objects become a single argument; in object mode
/// the params value is always passed through as the single argument.
pub(crate) fn inbound_args(params: Option<Value>, object_mode: bool) -> Vec<Value> {
    match params {
        None => Vec::new(),
        Some(params) if object_mode => vec![params],
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    }
}

enum Target {
    Handler(Arc<dyn Handler>),
    Builtin,
    Listeners,
    Default(Arc<dyn Handler>),
}

impl EngineInner {
    pub(crate) fn dispatch(self: &Arc<Self>, frame: Frame) {
        if self.pending.is_closed() {
            tracing::debug!("Dropping inbound frame: engine closed");
            return;
        }

        let value = match frame {
            Frame::Value(value) => value,
            Frame::Bytes(bytes) => match self.decode(&bytes) {
                Some(value) => value,
                None => return,
            },
        };

        match Message::classify(value) {
            Ok(Message::Request(request)) => self.handle_request(request),
            Ok(Message::Response(response)) => self.handle_response(response),
            Err(invalid) => self.handle_invalid(invalid),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<Value> {
        let result = match &self.codec {
            Some(codec) => codec.decode(bytes),
            None => Err(rpcengine_common::EngineError::Codec(
                "received bytes but no codec is installed".into(),
            )),
        };

        match result {
            Ok(value) => Some(value),
            Err(err) => {
                Stats::bump(&self.stats.decode_failures);
                tracing::warn!("Failed to decode inbound frame: {}", err);

                let raw = Value::String(String::from_utf8_lossy(bytes).into_owned());
                let id = self.codec.as_ref().and_then(|codec| codec.recover_id(bytes));
                if let Some(id) = id {
                    self.respond(Response::error(id, RpcError::parse_error(Some(raw.clone()))));
                }
                self.observe(RpcError::new(err.to_string()).with_code(PARSE_ERROR).with_data(raw));
                None
            }
        }
    }

    fn handle_invalid(&self, invalid: InvalidMessage) {
        Stats::bump(&self.stats.invalid_messages);
        tracing::warn!("Invalid inbound message: {}", invalid.reason);

        let error = invalid.to_error();
        if invalid.request_shaped {
            if let Some(id) = invalid.id.clone() {
                self.respond(Response::error(id, error.clone()));
            }
        }
        self.observe(error);
    }

    fn handle_response(&self, response: Response) {
        match self.pending.take(&response.id) {
            Some(call) => {
                tracing::debug!(
                    "Response for '{}' ({}) after {:?}",
                    call.method(),
                    response.id,
                    call.elapsed()
                );
                call.complete(response.into_outcome());
            }
            None => {
                Stats::bump(&self.stats.stray_responses);
                match response.error {
                    Some(error) => {
                        tracing::warn!("Error response for unknown call {}: {}", response.id, error);
                        self.observe(error);
                    }
                    None => tracing::debug!("Ignoring response for unknown call {}", response.id),
                }
            }
        }
    }

    fn resolve(&self, method: &str, is_notification: bool) -> Option<Target> {
        if let Some(handler) = self.interfaces.resolve(method, &self.config.path_delimiter) {
            return Some(Target::Handler(handler));
        }
        if self.bridge.is_enabled() && (method == SUBSCRIBE_METHOD || method == UNSUBSCRIBE_METHOD) {
            return Some(Target::Builtin);
        }
        if is_notification && self.remote.has(method) {
            return Some(Target::Listeners);
        }
        self.default_method
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map(Target::Default)
    }

    fn handle_request(self: &Arc<Self>, request: Request) {
        let Request {
            id, method, params, ..
        } = request;
        let object_mode = self.config.object_mode;

        // the subscription protocol is positional in both modes
        match self.resolve(&method, id.is_none()) {
            Some(Target::Handler(handler)) => {
                let args = inbound_args(params, object_mode);
                self.invoke(handler, id, method, args);
            }
            Some(Target::Default(handler)) => {
                let mut args = inbound_args(params, object_mode);
                args.insert(0, Value::String(method.clone()));
                self.invoke(handler, id, method, args);
            }
            Some(Target::Builtin) => {
                let outcome = self.run_builtin(&method, inbound_args(params, false));
                self.finish(id, &method, outcome);
            }
            Some(Target::Listeners) => {
                let payload = inbound_args(params, false)
                    .into_iter()
                    .next()
                    .unwrap_or(Value::Null);
                let delivered = self.remote.deliver(&method, &payload);
                Stats::bump(&self.stats.notifications_handled);
                tracing::debug!("Delivered '{}' to {} listener(s)", method, delivered);
            }
            None => match id {
                Some(id) => {
                    tracing::debug!("No handler for '{}'", method);
                    let error = RpcError::method_not_found(&method);
                    self.respond(Response::error(id, error.clone()));
                    self.observe(error);
                }
                None => tracing::debug!("Dropping notification for unknown method '{}'", method),
            },
        }
    }

    fn invoke(self: &Arc<Self>, handler: Arc<dyn Handler>, id: Option<Id>, method: String, args: Vec<Value>) {
        let inner = Arc::clone(self);
        inner.handler_started();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { handler.call(args).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!("Handler for '{}' panicked", method);
                    Err(RpcError::internal_error("internal error"))
                });
            inner.finish(id, &method, outcome);
            inner.handler_finished();
        });
    }

    fn run_builtin(self: &Arc<Self>, method: &str, args: Vec<Value>) -> HandlerResult {
        let name = match args.first() {
            Some(Value::String(name)) => name.clone(),
            _ => {
                return Err(RpcError::invalid_params(format!(
                    "{} expects an event name",
                    method
                )))
            }
        };

        if method == UNSUBSCRIBE_METHOD {
            let removed = self.bridge.unsubscribe(&name);
            tracing::debug!("Peer unsubscribed from '{}' (was active: {})", name, removed);
            return Ok(Value::Null);
        }

        let weak = Arc::downgrade(self);
        let event = name.clone();
        self.bridge
            .subscribe(&name, &self.config.path_delimiter, move |payload| {
                if let Some(inner) = weak.upgrade() {
                    // failures are already published by notify
                    let _ = inner.notify_positional(&event, vec![payload.clone()]);
                }
            })?;
        tracing::debug!("Peer subscribed to '{}'", name);
        Ok(Value::Null)
    }

    fn finish(&self, id: Option<Id>, method: &str, outcome: HandlerResult) {
        match (id, outcome) {
            (None, Ok(_)) => Stats::bump(&self.stats.notifications_handled),
            (None, Err(error)) => {
                Stats::bump(&self.stats.handler_errors);
                tracing::warn!("Notification handler for '{}' failed: {}", method, error);
                self.observe(error);
            }
            (Some(id), Ok(value)) => {
                Stats::bump(&self.stats.requests_handled);
                self.respond(Response::success(id, value));
            }
            (Some(id), Err(error)) => {
                Stats::bump(&self.stats.requests_handled);
                Stats::bump(&self.stats.handler_errors);
                tracing::debug!("Handler for '{}' failed: {}", method, error);
                self.observe(error.clone());
                self.respond(Response::error(id, self.redact(error)));
            }
        }
    }

    /// Uncoded errors are application failures whose message may be
    /// sensitive; coded ones are part of the protocol and pass through.
    fn redact(&self, error: RpcError) -> RpcError {
        if self.config.redact_internal_errors && error.code.is_none() {
            RpcError::internal_error("internal error")
        } else {
            error
        }
    }

    fn respond(&self, response: Response) {
        if self.pending.is_closed() {
            tracing::debug!("Dropping response {}: engine closed", response.id);
            return;
        }
        if let Err(err) = self.send(response.to_value()) {
            Stats::bump(&self.stats.transmit_failures);
            tracing::warn!("Failed to send response {}: {}", response.id, err);
            self.observe(err.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_args_positional() {
        assert_eq!(inbound_args(Some(json!([1, 2])), false), vec![json!(1), json!(2)]);
        assert_eq!(inbound_args(Some(json!({"a": 1})), false), vec![json!({"a": 1})]);
        assert!(inbound_args(None, false).is_empty());
    }

    #[test]
    fn test_inbound_args_object_mode() {
        assert_eq!(inbound_args(Some(json!({"a": 1})), true), vec![json!({"a": 1})]);
        assert_eq!(inbound_args(Some(json!([1, 2])), true), vec![json!([1, 2])]);
        assert!(inbound_args(None, true).is_empty());
    }
}
