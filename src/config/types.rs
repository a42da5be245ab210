//! Configuration types

use crate::dataplane::{NodeSettings, NodeTable, PortRole, DEFAULT_MAX_PEERS};
use crate::protocol::hsr::SUPERVISION_MULTICAST;
use crate::protocol::{MacAddr, ProtocolVersion};
use crate::telemetry::LogConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// User-defined configuration (config.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub ports: BTreeMap<String, PortConfig>,
    #[serde(default)]
    pub logging: Option<LogConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub mac: String,
    /// Address used on lane B, if the node has a second one
    pub mac_b: Option<String>,
    pub protocol_version: Option<ProtocolVersion>,
    /// Last byte of the supervision multicast address
    pub supervision_lsb: Option<u8>,
    pub rx_offloaded: Option<bool>,
    pub l2_forward_offloaded: Option<bool>,
    pub max_peers: Option<usize>,
    pub learn_data_senders: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortConfig {
    pub role: PortRole,
    /// Defaults to the node address
    pub mac: Option<String>,
}

// ============================================================================
// Lock file types (generated, includes all defaults)
// ============================================================================

/// Generated lock file with all defaults filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLock {
    pub generated_at: String,
    pub source_hash: String,
    pub node: NodeLock,
    pub ports: BTreeMap<String, PortLock>,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLock {
    pub name: String,
    pub mac: String,
    pub mac_b: Option<String>,
    pub protocol_version: ProtocolVersion,
    pub supervision_multicast: String,
    pub rx_offloaded: bool,
    pub l2_forward_offloaded: bool,
    pub max_peers: usize,
    pub learn_data_senders: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortLock {
    pub role: PortRole,
    pub mac: String,
}

/// Parse addresses as written and print them in canonical form
fn normalize_mac(mac: &str) -> String {
    mac.parse::<MacAddr>()
        .map(|mac| mac.to_string())
        .unwrap_or_else(|_| mac.to_string())
}

fn parse_mac(field: &str, mac: &str) -> Result<MacAddr> {
    mac.parse()
        .map_err(|e| Error::Config(format!("{}: invalid MAC address '{}': {}", field, mac, e)))
}

/// SHA-256 of the config source, printed in hex
pub fn source_hash(source: &str) -> String {
    Sha256::digest(source.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl ConfigLock {
    pub fn from_config(config: &Config, source: &str) -> Self {
        let node = &config.node;
        let mut supervision = SUPERVISION_MULTICAST;
        if let Some(lsb) = node.supervision_lsb {
            supervision.0[5] = lsb;
        }

        let ports = config
            .ports
            .iter()
            .map(|(name, port)| {
                (
                    name.clone(),
                    PortLock {
                        role: port.role,
                        mac: normalize_mac(port.mac.as_deref().unwrap_or(&node.mac)),
                    },
                )
            })
            .collect();

        ConfigLock {
            generated_at: chrono::Utc::now().to_rfc3339(),
            source_hash: source_hash(source),
            node: NodeLock {
                name: node.name.clone(),
                mac: normalize_mac(&node.mac),
                mac_b: node.mac_b.as_deref().map(normalize_mac),
                protocol_version: node.protocol_version.unwrap_or_default(),
                supervision_multicast: supervision.to_string(),
                rx_offloaded: node.rx_offloaded.unwrap_or(false),
                l2_forward_offloaded: node.l2_forward_offloaded.unwrap_or(false),
                max_peers: node.max_peers.unwrap_or(DEFAULT_MAX_PEERS),
                learn_data_senders: node.learn_data_senders.unwrap_or(true),
            },
            ports,
            logging: config.logging.clone().unwrap_or_default(),
        }
    }

    /// Node settings with every address parsed
    pub fn node_settings(&self) -> Result<NodeSettings> {
        let node = &self.node;
        let mut settings = NodeSettings::new(&node.name, parse_mac("node.mac", &node.mac)?);
        settings.mac_addr_b = node
            .mac_b
            .as_deref()
            .map(|mac| parse_mac("node.mac_b", mac))
            .transpose()?;
        settings.protocol_version = node.protocol_version;
        settings.supervision_multicast =
            parse_mac("node.supervision_multicast", &node.supervision_multicast)?;
        settings.rx_offloaded = node.rx_offloaded;
        settings.l2_forward_offloaded = node.l2_forward_offloaded;
        Ok(settings)
    }

    /// Ports as (name, role, address), master first
    pub fn port_specs(&self) -> Result<Vec<(String, PortRole, MacAddr)>> {
        let mut specs = self
            .ports
            .iter()
            .map(|(name, port)| {
                let mac = parse_mac(&format!("ports.{}.mac", name), &port.mac)?;
                Ok((name.clone(), port.role, mac))
            })
            .collect::<Result<Vec<_>>>()?;
        specs.sort_by_key(|(_, role, _)| *role);
        Ok(specs)
    }

    pub fn node_table(&self) -> NodeTable {
        NodeTable::new(self.node.max_peers, self.node.learn_data_senders)
    }
}
