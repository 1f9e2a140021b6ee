//! The service both subcommands expose.
//!
//! Root methods:
//!
//! | Method | Behavior |
//! |--------|----------|
//! | `add` | sums every number in its arguments (arrays and objects are searched one level deep) |
//! | `echo` | returns its single argument, or all arguments as an array |
//! | `sleep` | waits the given number of milliseconds, then returns it |
//! | `fail` | fails with the given message and no error code |
//!
//! Object-mode callers pass the arguments of `sleep` and `fail` as a single
//! array. A `clock` feed emits `tick` events carrying an increasing counter.

use std::sync::Arc;
use std::time::Duration;

use rpcengine::{handler_fn, Feed, Interface, RpcError};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const CLOCK_FEED: &str = "clock";
pub const TICK_EVENT: &str = "tick";

fn numbers_in(param: &Value) -> Vec<f64> {
    match param {
        Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
        Value::Object(map) => map.values().filter_map(Value::as_f64).collect(),
        other => other.as_f64().into_iter().collect(),
    }
}

fn numbers(params: &[Value]) -> Vec<f64> {
    params.iter().flat_map(numbers_in).collect()
}

/// Spreads a lone array argument, the shape object-mode peers send.
fn arguments(mut params: Vec<Value>) -> Vec<Value> {
    if let [Value::Array(_)] = params.as_slice() {
        if let Some(Value::Array(items)) = params.pop() {
            return items;
        }
    }
    params
}

/// Sums as an integer when every input is one.
fn sum(params: &[Value]) -> Value {
    let numbers = numbers(params);
    let all_integers = numbers
        .iter()
        .all(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64);
    let total: f64 = numbers.iter().sum();
    if all_integers {
        json!(total as i64)
    } else {
        json!(total)
    }
}

pub fn demo_interface() -> Interface {
    Interface::new()
        .method(
            "add",
            handler_fn(|params: Vec<Value>| async move { Ok(sum(&params)) }),
        )
        .method(
            "echo",
            handler_fn(|mut params: Vec<Value>| async move {
                Ok(match params.len() {
                    1 => params.remove(0),
                    _ => Value::Array(params),
                })
            }),
        )
        .method(
            "sleep",
            handler_fn(|params: Vec<Value>| async move {
                let ms = arguments(params)
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| RpcError::invalid_params("sleep expects milliseconds"))?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(ms))
            }),
        )
        .method(
            "fail",
            handler_fn(|params: Vec<Value>| async move {
                let params = arguments(params);
                let message = params
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or("failed on request");
                Err(RpcError::new(message))
            }),
        )
}

pub fn clock_feed() -> Arc<Feed> {
    Arc::new(Feed::new())
}

/// Emits a `tick` on `feed` every `period` until aborted.
pub fn spawn_ticker(feed: Arc<Feed>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut count: u64 = 0;
        loop {
            interval.tick().await;
            count += 1;
            feed.emit(TICK_EVENT, &json!(count));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcengine::Handler;

    #[test]
    fn test_sum() {
        assert_eq!(sum(&[json!(1), json!(1336)]), json!(1337));
        assert_eq!(sum(&[json!({"x": 1, "y": 2})]), json!(3));
        assert_eq!(sum(&[json!([1, 2.5])]), json!(3.5));
        assert_eq!(sum(&[json!("nope")]), json!(0));
    }

    #[tokio::test]
    async fn test_echo_and_fail() {
        let iface = demo_interface();

        let echo = iface.get("echo").unwrap();
        assert_eq!(echo.call(vec![json!("hi")]).await, Ok(json!("hi")));
        assert_eq!(echo.call(vec![json!(1), json!(2)]).await, Ok(json!([1, 2])));

        let fail = iface.get("fail").unwrap();
        let err = fail.call(vec![json!("boom")]).await.unwrap_err();
        assert_eq!(err.message, "boom");
        assert_eq!(err.code, None);
    }

    #[tokio::test]
    async fn test_sleep_requires_milliseconds() {
        let sleep = demo_interface().get("sleep").unwrap();
        assert!(sleep.call(vec![json!("soon")]).await.is_err());
        assert_eq!(sleep.call(vec![json!(1)]).await, Ok(json!(1)));
        assert_eq!(sleep.call(vec![json!([2])]).await, Ok(json!(2)));
    }

    #[test]
    fn test_arguments_spread_lone_array() {
        assert_eq!(arguments(vec![json!(["a", 1])]), vec![json!("a"), json!(1)]);
        assert_eq!(arguments(vec![json!("a"), json!([1])]), vec![json!("a"), json!([1])]);
        assert_eq!(arguments(vec![json!({"a": 1})]), vec![json!({"a": 1})]);
    }
}
