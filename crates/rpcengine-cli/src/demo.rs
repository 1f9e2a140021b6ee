//! `demo` subcommand: two engines wired in memory.

use std::time::Duration;

use anyhow::Result;
use rpcengine::loopback::{pair, pair_with_codec};
use rpcengine::{Engine, EngineConfig, RpcError};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::service::{clock_feed, demo_interface, CLOCK_FEED, TICK_EVENT};

fn describe(outcome: &Result<Value, RpcError>) -> String {
    match outcome {
        Ok(value) => value.to_string(),
        Err(err) => match err.code {
            Some(code) => format!("error {}: {}", code, err),
            None => format!("error: {}", err),
        },
    }
}

/// Object mode sends one structured params value, so plain arguments travel
/// as a single array.
fn args(client: &Engine, values: Vec<Value>) -> Vec<Value> {
    if client.config().object_mode {
        vec![Value::Array(values)]
    } else {
        values
    }
}

/// Runs the walkthrough and returns the lines it printed.
pub async fn run(config: EngineConfig, use_codec: bool) -> Result<Vec<String>> {
    let (client, server) = if use_codec {
        pair_with_codec(config.clone(), config)
    } else {
        pair(config.clone(), config)
    };
    server.mount("", demo_interface());
    let clock = clock_feed();
    server.set_feed(CLOCK_FEED, Some(clock.clone()));

    let mut lines = Vec::new();
    let mut report = |line: String| {
        println!("{}", line);
        lines.push(line);
    };

    let add_args = if client.config().object_mode {
        vec![json!({"x": 1, "y": 1336})]
    } else {
        vec![json!(1), json!(1336)]
    };
    report(format!("add -> {}", describe(&client.call("add", add_args).await)));
    report(format!("bogus -> {}", describe(&client.call("bogus", vec![]).await)));
    report(format!(
        "fail -> {}",
        describe(&client.call("fail", args(&client, vec![json!("disk on fire")])).await)
    ));
    report(format!(
        "sleep(200) with 50ms deadline -> {}",
        describe(
            &client
                .call_with_timeout(
                    "sleep",
                    args(&client, vec![json!(200)]),
                    Duration::from_millis(50),
                )
                .await
        )
    ));

    let ticks = subscribe_ticks(&client).await?;
    for n in 1..=3 {
        clock.emit(TICK_EVENT, &json!(n));
    }
    let mut ticks = ticks;
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(1), ticks.recv()).await {
            Ok(Some(tick)) => report(format!("{}.{} <- {}", CLOCK_FEED, TICK_EVENT, tick)),
            _ => {
                tracing::warn!("Tick did not arrive in time");
                break;
            }
        }
    }

    client.close(None);
    server.close(None);
    report(serde_json::to_string(&client.stats())?);
    Ok(lines)
}

async fn subscribe_ticks(client: &Engine) -> Result<mpsc::UnboundedReceiver<Value>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let name = format!("{}.{}", CLOCK_FEED, TICK_EVENT);
    client
        .subscribe(&name, move |payload| {
            let _ = tx.send(payload.clone());
        })
        .await?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_walkthrough() {
        let lines = run(EngineConfig::default(), false).await.unwrap();
        assert_eq!(lines[0], "add -> 1337");
        assert_eq!(lines[1], "bogus -> error -32601: method not found");
        assert_eq!(lines[2], "fail -> error: disk on fire");
        assert_eq!(lines[3], "sleep(200) with 50ms deadline -> error -32603: call timed out");
        assert_eq!(&lines[4..7], ["clock.tick <- 1", "clock.tick <- 2", "clock.tick <- 3"]);
    }

    #[tokio::test]
    async fn test_demo_over_codec_in_object_mode() {
        let config = EngineConfig::default()
            .with_object_mode(true)
            .with_redact_internal_errors(true);
        let lines = run(config, true).await.unwrap();
        assert_eq!(lines[0], "add -> 1337");
        assert_eq!(lines[2], "fail -> error -32603: internal error");
        assert_eq!(lines[3], "sleep(200) with 50ms deadline -> error -32603: call timed out");
    }
}
