//! `stdio` subcommand: one JSON message per line.
//!
//! Every non-empty input line is handed to the engine as encoded bytes, and
//! every outbound message is written as one line. At end of input the engine
//! lets running handlers answer, then closes.

use std::time::Duration;

use anyhow::Result;
use rpcengine::{Engine, EngineConfig, EngineStats, Frame, JsonCodec};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::service::{clock_feed, demo_interface, spawn_ticker, CLOCK_FEED};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Serves the demo service on the process's stdin and stdout.
pub async fn run(config: EngineConfig) -> Result<EngineStats> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let (stats, _) = serve(config, stdin, tokio::io::stdout()).await?;
    Ok(stats)
}

/// Serves the demo service until `reader` is exhausted, returning the final
/// stats and the writer.
pub async fn serve<R, W>(config: EngineConfig, reader: R, writer: W) -> Result<(EngineStats, W)>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(rx, writer));

    let engine = Engine::with_codec(config, tx, JsonCodec);
    engine.mount("", demo_interface());
    let clock = clock_feed();
    engine.set_feed(CLOCK_FEED, Some(clock.clone()));
    let ticker = spawn_ticker(clock, TICK_PERIOD);
    tracing::info!("Serving on stdio");

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        engine.receive(line.into_bytes());
    }

    tracing::info!("End of input, waiting for {} handler(s)", engine.active_handlers());
    engine.wait_idle().await;
    ticker.abort();
    engine.close(None);
    let stats = engine.stats();

    // the writer finishes once the engine's sender is gone
    drop(engine);
    let writer = writer_task.await??;
    Ok((stats, writer))
}

async fn write_frames<W>(mut rx: mpsc::UnboundedReceiver<Frame>, mut writer: W) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let bytes = match frame {
            Frame::Bytes(bytes) => bytes,
            Frame::Value(value) => serde_json::to_vec(&value)?,
        };
        writer.write_all(&bytes).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(writer)
}
