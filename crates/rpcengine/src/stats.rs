//! Engine counters
//!
//! Lock-free counters bumped on the hot paths, exposed as a serializable
//! snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Point-in-time view of an engine's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub calls_sent: u64,
    pub notifications_sent: u64,
    pub calls_succeeded: u64,
    pub calls_failed: u64,
    pub calls_timed_out: u64,
    pub requests_handled: u64,
    pub notifications_handled: u64,
    pub handler_errors: u64,
    pub stray_responses: u64,
    pub invalid_messages: u64,
    pub decode_failures: u64,
    pub transmit_failures: u64,
    pub pending_calls: u64,
    pub uptime_ms: u64,
}

#[derive(Debug)]
pub(crate) struct Stats {
    pub(crate) calls_sent: AtomicU64,
    pub(crate) notifications_sent: AtomicU64,
    pub(crate) calls_succeeded: AtomicU64,
    pub(crate) calls_failed: AtomicU64,
    pub(crate) calls_timed_out: AtomicU64,
    pub(crate) requests_handled: AtomicU64,
    pub(crate) notifications_handled: AtomicU64,
    pub(crate) handler_errors: AtomicU64,
    pub(crate) stray_responses: AtomicU64,
    pub(crate) invalid_messages: AtomicU64,
    pub(crate) decode_failures: AtomicU64,
    pub(crate) transmit_failures: AtomicU64,
    started: Instant,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            calls_sent: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            calls_succeeded: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
            calls_timed_out: AtomicU64::new(0),
            requests_handled: AtomicU64::new(0),
            notifications_handled: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            stray_responses: AtomicU64::new(0),
            invalid_messages: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            transmit_failures: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, pending_calls: usize) -> EngineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineStats {
            calls_sent: load(&self.calls_sent),
            notifications_sent: load(&self.notifications_sent),
            calls_succeeded: load(&self.calls_succeeded),
            calls_failed: load(&self.calls_failed),
            calls_timed_out: load(&self.calls_timed_out),
            requests_handled: load(&self.requests_handled),
            notifications_handled: load(&self.notifications_handled),
            handler_errors: load(&self.handler_errors),
            stray_responses: load(&self.stray_responses),
            invalid_messages: load(&self.invalid_messages),
            decode_failures: load(&self.decode_failures),
            transmit_failures: load(&self.transmit_failures),
            pending_calls: pending_calls as u64,
            uptime_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_bumps() {
        let stats = Stats::new();
        Stats::bump(&stats.calls_sent);
        Stats::bump(&stats.calls_sent);
        Stats::bump(&stats.decode_failures);

        let snapshot = stats.snapshot(3);
        assert_eq!(snapshot.calls_sent, 2);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.calls_timed_out, 0);
        assert_eq!(snapshot.pending_calls, 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(Stats::new().snapshot(0)).unwrap();
        assert_eq!(json["calls_sent"], 0);
        assert!(json.get("uptime_ms").is_some());
    }
}
