//! Ports of a redundancy node

use crate::capture::Transmit;
use crate::protocol::MacAddr;
use crate::telemetry::InterfaceStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Index of a port within its node
pub type PortId = usize;

/// Role of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortRole {
    /// Logical upstream attachment to the local protocol stack
    Master,
    SlaveA,
    SlaveB,
    Interlink,
}

impl PortRole {
    /// All roles in port enumeration order
    pub const ALL: [PortRole; 4] = [
        PortRole::Master,
        PortRole::SlaveA,
        PortRole::SlaveB,
        PortRole::Interlink,
    ];

    /// Dense index for per-role tables
    pub fn index(self) -> usize {
        match self {
            PortRole::Master => 0,
            PortRole::SlaveA => 1,
            PortRole::SlaveB => 2,
            PortRole::Interlink => 3,
        }
    }

    pub fn is_master(self) -> bool {
        self == PortRole::Master
    }

    pub fn is_slave(self) -> bool {
        matches!(self, PortRole::SlaveA | PortRole::SlaveB)
    }

    /// Lane a slave port sends on; other roles never tag frames
    pub fn lane(self) -> Option<Lane> {
        match self {
            PortRole::SlaveA => Some(Lane::A),
            PortRole::SlaveB => Some(Lane::B),
            PortRole::Master | PortRole::Interlink => None,
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortRole::Master => "master",
            PortRole::SlaveA => "slave-a",
            PortRole::SlaveB => "slave-b",
            PortRole::Interlink => "interlink",
        };
        f.write_str(name)
    }
}

/// Redundant lane, carried in the path field of the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    A,
    B,
}

impl Lane {
    pub fn path_id(self) -> u8 {
        match self {
            Lane::A => 0,
            Lane::B => 1,
        }
    }
}

/// One attachment point of the node
pub struct Port {
    id: PortId,
    role: PortRole,
    name: String,
    mac_addr: MacAddr,
    device: Arc<dyn Transmit>,
    stats: Arc<InterfaceStats>,
}

impl Port {
    pub(crate) fn new(
        id: PortId,
        role: PortRole,
        name: String,
        mac_addr: MacAddr,
        device: Arc<dyn Transmit>,
        stats: Arc<InterfaceStats>,
    ) -> Self {
        Self {
            id,
            role,
            name,
            mac_addr,
            device,
            stats,
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn role(&self) -> PortRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac_addr(&self) -> MacAddr {
        self.mac_addr
    }

    pub fn device(&self) -> &dyn Transmit {
        self.device.as_ref()
    }

    pub fn stats(&self) -> &InterfaceStats {
        &self.stats
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("name", &self.name)
            .field("mac_addr", &self.mac_addr)
            .finish()
    }
}
