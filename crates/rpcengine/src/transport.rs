//! Transport contract
//!
//! The engine never owns a connection. It hands each outbound [`Frame`] to a
//! [`Transport`] and expects the embedding code to feed inbound frames back
//! through [`Engine::receive`](crate::Engine::receive).

use rpcengine_common::{EngineError, Frame, Result};
use tokio::sync::mpsc;

/// Outbound half of a duplex channel.
///
/// `transmit` must not block for long; it runs on whatever task produced the
/// message. A failure is reported back as the outcome of the affected call.
pub trait Transport: Send + Sync {
    fn transmit(&self, frame: Frame) -> Result<()>;
}

impl<F> Transport for F
where
    F: Fn(Frame) -> Result<()> + Send + Sync,
{
    fn transmit(&self, frame: Frame) -> Result<()> {
        self(frame)
    }
}

impl Transport for mpsc::UnboundedSender<Frame> {
    fn transmit(&self, frame: Frame) -> Result<()> {
        self.send(frame)
            .map_err(|_| EngineError::Transport("peer channel closed".into()))
    }
}
