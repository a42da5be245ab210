//! Metrics collection for frame statistics.
//!
//! Provides thread-safe counters for tracking frame processing metrics
//! at both the node and per-port level.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-port statistics.
#[derive(Debug, Default)]
pub struct InterfaceStats {
    /// Frames delivered to the upper layer (master only).
    pub rx_packets: Counter,
    /// Bytes delivered to the upper layer, without the Ethernet header.
    pub rx_bytes: Counter,
    /// Multicast frames delivered.
    pub multicast: Counter,
    /// Deliveries refused by the upper layer.
    pub rx_dropped: Counter,
    /// Frames handed to the device queue.
    pub tx_packets: Counter,
    /// Bytes handed to the device queue.
    pub tx_bytes: Counter,
    /// Device transmit failures.
    pub tx_errors: Counter,
    /// Frames received on this port and dropped before forwarding.
    pub tx_dropped: Counter,
}

impl InterfaceStats {
    /// Creates new interface statistics initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame delivered upstream.
    pub fn record_rx(&self, bytes: usize, multicast: bool) {
        self.rx_packets.inc();
        self.rx_bytes.add(bytes as u64);
        if multicast {
            self.multicast.inc();
        }
    }

    /// Records a transmitted frame.
    pub fn record_tx(&self, bytes: usize) {
        self.tx_packets.inc();
        self.tx_bytes.add(bytes as u64);
    }

    pub fn record_rx_drop(&self) {
        self.rx_dropped.inc();
    }

    pub fn record_tx_error(&self) {
        self.tx_errors.inc();
    }

    pub fn record_tx_drop(&self) {
        self.tx_dropped.inc();
    }
}

/// Node-wide metrics registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Per-port statistics, by port name.
    interfaces: RwLock<BTreeMap<String, Arc<InterfaceStats>>>,

    /// Frames entering the forwarding engine.
    pub frames_received: Counter,
    /// Replicas handed to a slave or interlink port.
    pub frames_transmitted: Counter,
    /// Frames delivered to the upper layer.
    pub frames_delivered: Counter,
    /// Port replicas skipped as duplicates.
    pub duplicates_discarded: Counter,
    /// Supervision frames consumed by the registry.
    pub supervision_consumed: Counter,
    /// Frames dropped as a whole (malformed, VLAN, unknown peer, ...).
    pub frames_dropped: Counter,
    /// Single replicas lost (allocation failure, non-slave tagging).
    pub replicas_dropped: Counter,
    /// Slave-to-slave replicas left to the hardware.
    pub offload_skipped: Counter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a port for statistics tracking and returns its counters.
    pub fn register_interface(&self, name: &str) -> Arc<InterfaceStats> {
        let mut interfaces = self
            .interfaces
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        interfaces.entry(name.to_string()).or_default().clone()
    }

    /// Counters of a registered port.
    pub fn interface(&self, name: &str) -> Option<Arc<InterfaceStats>> {
        self.interfaces
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("frames_received".into(), self.frames_received.get()),
            ("frames_transmitted".into(), self.frames_transmitted.get()),
            ("frames_delivered".into(), self.frames_delivered.get()),
            (
                "duplicates_discarded".into(),
                self.duplicates_discarded.get(),
            ),
            (
                "supervision_consumed".into(),
                self.supervision_consumed.get(),
            ),
            ("frames_dropped".into(), self.frames_dropped.get()),
            ("replicas_dropped".into(), self.replicas_dropped.get()),
            ("offload_skipped".into(), self.offload_skipped.get()),
        ];

        let interfaces = self
            .interfaces
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (name, stats) in interfaces.iter() {
            result.extend([
                (format!("{}_rx_packets", name), stats.rx_packets.get()),
                (format!("{}_rx_bytes", name), stats.rx_bytes.get()),
                (format!("{}_multicast", name), stats.multicast.get()),
                (format!("{}_rx_dropped", name), stats.rx_dropped.get()),
                (format!("{}_tx_packets", name), stats.tx_packets.get()),
                (format!("{}_tx_bytes", name), stats.tx_bytes.get()),
                (format!("{}_tx_errors", name), stats.tx_errors.get()),
                (format!("{}_tx_dropped", name), stats.tx_dropped.get()),
            ]);
        }

        result
    }
}
