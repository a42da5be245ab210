//! Redundancy node: ports plus the state they share
//!
//! A `Node` is built once and then shared across receive threads through an
//! `Arc`. Everything mutable lives behind its own synchronization: the
//! outgoing sequence counter, the registry and the counters.

use super::{AddressPolicy, NodeRegistry, NodeTable, Port, PortId, PortRole};
use crate::capture::{Transmit, UpperLayer};
use crate::protocol::hsr::{ProtocolVersion, SUPERVISION_MULTICAST};
use crate::protocol::MacAddr;
use crate::telemetry::{MetricsRegistry, WarnOnce};
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Sequence numbers for frames this node tags itself
#[derive(Debug, Default)]
pub struct SequenceCounter(Mutex<u16>);

impl SequenceCounter {
    pub fn new(initial: u16) -> Self {
        Self(Mutex::new(initial))
    }

    /// Take the current value and advance, wrapping at 16 bits
    pub fn next(&self) -> u16 {
        let mut seq = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *seq;
        *seq = current.wrapping_add(1);
        current
    }

    /// Value the next untagged frame will get
    pub fn peek(&self) -> u16 {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Node-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    pub name: String,
    /// Primary address (MacAddressA)
    pub mac_addr: MacAddr,
    /// Address used on lane B, if different
    pub mac_addr_b: Option<MacAddr>,
    pub protocol_version: ProtocolVersion,
    pub supervision_multicast: MacAddr,
    /// Hardware removes duplicates and handles supervision on receive
    pub rx_offloaded: bool,
    /// Hardware forwards between the two slave ports
    pub l2_forward_offloaded: bool,
}

impl NodeSettings {
    pub fn new(name: impl Into<String>, mac_addr: MacAddr) -> Self {
        Self {
            name: name.into(),
            mac_addr,
            mac_addr_b: None,
            protocol_version: ProtocolVersion::default(),
            supervision_multicast: SUPERVISION_MULTICAST,
            rx_offloaded: false,
            l2_forward_offloaded: false,
        }
    }

    /// Whether `mac` is one of this node's own addresses
    pub fn is_self(&self, mac: MacAddr) -> bool {
        mac == self.mac_addr || self.mac_addr_b == Some(mac)
    }
}

/// Once-per-node diagnostics for per-frame failures
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    pub malformed: WarnOnce,
    pub vlan: WarnOnce,
    pub protocol_violation: WarnOnce,
}

/// A link redundancy entity with its ports
pub struct Node {
    settings: NodeSettings,
    /// Sorted by role; `PortId` is the index
    ports: Vec<Port>,
    sequence: SequenceCounter,
    registry: Arc<dyn NodeRegistry>,
    addresses: Arc<dyn AddressPolicy>,
    upper: Arc<dyn UpperLayer>,
    metrics: Arc<MetricsRegistry>,
    pub(crate) diagnostics: Diagnostics,
}

impl Node {
    pub fn builder(settings: NodeSettings, upper: Arc<dyn UpperLayer>) -> NodeBuilder {
        NodeBuilder::new(settings, upper)
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id)
    }

    pub fn port_by_role(&self, role: PortRole) -> Option<&Port> {
        self.ports.iter().find(|port| port.role() == role)
    }

    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|port| port.name() == name)
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    pub fn registry(&self) -> &dyn NodeRegistry {
        self.registry.as_ref()
    }

    pub fn addresses(&self) -> &dyn AddressPolicy {
        self.addresses.as_ref()
    }

    pub fn upper(&self) -> &dyn UpperLayer {
        self.upper.as_ref()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }
}

struct PortSpec {
    role: PortRole,
    name: String,
    mac_addr: MacAddr,
    device: Arc<dyn Transmit>,
}

/// Builder for [`Node`]
///
/// Without an explicit registry the node uses a default [`NodeTable`] as
/// both registry and address policy.
pub struct NodeBuilder {
    settings: NodeSettings,
    upper: Arc<dyn UpperLayer>,
    ports: Vec<PortSpec>,
    registry: Option<(Arc<dyn NodeRegistry>, Arc<dyn AddressPolicy>)>,
    metrics: Option<Arc<MetricsRegistry>>,
    initial_sequence: u16,
}

impl NodeBuilder {
    pub fn new(settings: NodeSettings, upper: Arc<dyn UpperLayer>) -> Self {
        Self {
            settings,
            upper,
            ports: Vec::new(),
            registry: None,
            metrics: None,
            initial_sequence: 0,
        }
    }

    pub fn port(
        mut self,
        role: PortRole,
        name: impl Into<String>,
        mac_addr: MacAddr,
        device: Arc<dyn Transmit>,
    ) -> Self {
        self.ports.push(PortSpec {
            role,
            name: name.into(),
            mac_addr,
            device,
        });
        self
    }

    pub fn registry(
        mut self,
        registry: Arc<dyn NodeRegistry>,
        addresses: Arc<dyn AddressPolicy>,
    ) -> Self {
        self.registry = Some((registry, addresses));
        self
    }

    /// Use a [`NodeTable`] for both peer registry and address policy
    pub fn node_table(self, table: Arc<NodeTable>) -> Self {
        self.registry(table.clone(), table)
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn initial_sequence(mut self, seq: u16) -> Self {
        self.initial_sequence = seq;
        self
    }

    /// Validate the port set and build the node.
    ///
    /// Exactly one master is required and no role may appear twice.
    pub fn build(self) -> Result<Node> {
        let mut specs = self.ports;
        specs.sort_by_key(|spec| spec.role);

        if !specs.iter().any(|spec| spec.role.is_master()) {
            return Err(Error::Config(format!(
                "node {} has no master port",
                self.settings.name
            )));
        }
        for pair in specs.windows(2) {
            if pair[0].role == pair[1].role {
                return Err(Error::Config(format!(
                    "ports {} and {} both have role {}",
                    pair[0].name, pair[1].name, pair[0].role
                )));
            }
        }

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsRegistry::new()));
        let (registry, addresses) = self.registry.unwrap_or_else(|| {
            let table = Arc::new(NodeTable::default());
            (
                table.clone() as Arc<dyn NodeRegistry>,
                table as Arc<dyn AddressPolicy>,
            )
        });

        let ports = specs
            .into_iter()
            .enumerate()
            .map(|(id, spec)| {
                let stats = metrics.register_interface(&spec.name);
                debug!(node = %self.settings.name, port = %spec.name, role = %spec.role, id, "Port added");
                Port::new(id, spec.role, spec.name, spec.mac_addr, spec.device, stats)
            })
            .collect();

        Ok(Node {
            settings: self.settings,
            ports,
            sequence: SequenceCounter::new(self.initial_sequence),
            registry,
            addresses,
            upper: self.upper,
            metrics,
            diagnostics: Diagnostics::default(),
        })
    }
}
