//! Instrumentation sinks for connection activity.
//!
//! Every connection marks the same eight meters. The sink is injected
//! through the [`ConnectionContext`](crate::ConnectionContext) so a node can
//! choose between in-process totals ([`MeterCounts`]) and the `metrics`
//! facade ([`MetricsInstrumentation`]).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A meter marked by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meter {
    /// Frames successfully read.
    MessageRead,
    /// Frames successfully written.
    MessageWrite,
    /// Bytes read, headers included.
    ByteRead,
    /// Bytes written, headers included.
    ByteWrite,
    /// Unexpected read failures, oversized frames and corrupt payloads.
    ErrorRead,
    /// Unexpected write failures.
    ErrorWrite,
    /// Connections dropped for read inactivity.
    TimeoutRead,
    /// Connections dropped for write inactivity.
    TimeoutWrite,
}

impl Meter {
    /// All meters, in a stable order.
    pub const ALL: [Meter; 8] = [
        Meter::MessageRead,
        Meter::MessageWrite,
        Meter::ByteRead,
        Meter::ByteWrite,
        Meter::ErrorRead,
        Meter::ErrorWrite,
        Meter::TimeoutRead,
        Meter::TimeoutWrite,
    ];

    /// Metric name reported to the `metrics` facade.
    pub fn name(self) -> &'static str {
        match self {
            Meter::MessageRead => "overlay_message_read_total",
            Meter::MessageWrite => "overlay_message_write_total",
            Meter::ByteRead => "overlay_byte_read_total",
            Meter::ByteWrite => "overlay_byte_write_total",
            Meter::ErrorRead => "overlay_error_read_total",
            Meter::ErrorWrite => "overlay_error_write_total",
            Meter::TimeoutRead => "overlay_timeout_read_total",
            Meter::TimeoutWrite => "overlay_timeout_write_total",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives meter marks from connections.
pub trait Instrumentation: Send + Sync {
    /// Add `count` to `meter`.
    fn mark(&self, meter: Meter, count: u64);
}

/// In-process meter totals.
///
/// Shared between all connections that hold the same `Arc`.
#[derive(Debug, Default)]
pub struct MeterCounts {
    counts: [AtomicU64; 8],
}

impl MeterCounts {
    /// Create a sink with every meter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total for `meter`.
    pub fn get(&self, meter: Meter) -> u64 {
        self.counts[meter.index()].load(Ordering::Relaxed)
    }
}

impl Instrumentation for MeterCounts {
    fn mark(&self, meter: Meter, count: u64) {
        self.counts[meter.index()].fetch_add(count, Ordering::Relaxed);
    }
}

impl fmt::Display for MeterCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals: Vec<String> = Meter::ALL
            .iter()
            .map(|meter| format!("{meter}={}", self.get(*meter)))
            .collect();
        write!(f, "[meters] {}", totals.join(", "))
    }
}

/// Forwards meter marks to the global `metrics` recorder as counters.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsInstrumentation;

#[cfg(feature = "metrics")]
impl Instrumentation for MetricsInstrumentation {
    fn mark(&self, meter: Meter, count: u64) {
        metrics::counter!(meter.name()).increment(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_counts_accumulate() {
        let counts = MeterCounts::new();
        counts.mark(Meter::ByteRead, 4);
        counts.mark(Meter::ByteRead, 10);
        counts.mark(Meter::MessageRead, 1);

        assert_eq!(counts.get(Meter::ByteRead), 14);
        assert_eq!(counts.get(Meter::MessageRead), 1);
        assert_eq!(counts.get(Meter::ErrorRead), 0);
    }

    #[test]
    fn test_meter_indices_are_distinct() {
        let counts = MeterCounts::new();
        for (i, meter) in Meter::ALL.iter().enumerate() {
            counts.mark(*meter, i as u64 + 1);
        }
        for (i, meter) in Meter::ALL.iter().enumerate() {
            assert_eq!(counts.get(*meter), i as u64 + 1);
        }
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_metrics_facade_counter() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder};

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, || {
            MetricsInstrumentation.mark(Meter::TimeoutRead, 1);
            MetricsInstrumentation.mark(Meter::TimeoutRead, 2);
        });

        let metrics = snapshotter.snapshot().into_vec();
        let found = metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == Meter::TimeoutRead.name()
                && matches!(value, DebugValue::Counter(c) if *c == 3)
        });
        assert!(found, "read timeout counter not recorded: {metrics:#?}");
    }
}
