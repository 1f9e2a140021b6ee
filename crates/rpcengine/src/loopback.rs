//! In-process transport connecting two engines.
//!
//! Each direction is an unbounded channel drained by a pump task that feeds
//! frames into the receiving engine. Pumps hold only weak handles, so they
//! stop once both engines are dropped.

use rpcengine_common::{Frame, JsonCodec};
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::engine::{Engine, WeakEngine};

/// Two engines wired to each other, exchanging structured values.
///
/// Must be called from within a Tokio runtime.
pub fn pair(left: EngineConfig, right: EngineConfig) -> (Engine, Engine) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();

    // left sends into the channel the right engine drains, and vice versa
    let a = Engine::new(left, right_tx);
    let b = Engine::new(right, left_tx);
    start_pump(b.downgrade(), right_rx);
    start_pump(a.downgrade(), left_rx);
    (a, b)
}

/// Like [`pair`], but both engines encode to JSON bytes, exercising the
/// codec path end to end.
pub fn pair_with_codec(left: EngineConfig, right: EngineConfig) -> (Engine, Engine) {
    let (left_tx, left_rx) = mpsc::unbounded_channel();
    let (right_tx, right_rx) = mpsc::unbounded_channel();

    let a = Engine::with_codec(left, right_tx, JsonCodec);
    let b = Engine::with_codec(right, left_tx, JsonCodec);
    start_pump(b.downgrade(), right_rx);
    start_pump(a.downgrade(), left_rx);
    (a, b)
}

fn start_pump(target: WeakEngine, mut rx: mpsc::UnboundedReceiver<Frame>) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match target.upgrade() {
                Some(engine) => engine.receive(frame),
                None => break,
            }
        }
        tracing::debug!("Loopback pump stopped");
    });
}
