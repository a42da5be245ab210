//! Configuration validation

use super::Config;
use crate::dataplane::PortRole;
use crate::protocol::MacAddr;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_node(config, &mut result);
    validate_ports(config, &mut result);
    validate_logging(config, &mut result);

    result
}

fn check_mac(field: &str, value: &str, result: &mut ValidationResult) -> Option<MacAddr> {
    match value.parse::<MacAddr>() {
        Ok(mac) => Some(mac),
        Err(e) => {
            result.error(format!("{}: '{}' is not a MAC address ({})", field, value, e));
            None
        }
    }
}

fn validate_node(config: &Config, result: &mut ValidationResult) {
    let node = &config.node;

    if node.name.is_empty() {
        result.error("node.name: must not be empty");
    }

    let mac = check_mac("node.mac", &node.mac, result);
    if let Some(mac) = mac {
        if !mac.is_unicast() || mac.is_zero() {
            result.error(format!("node.mac: {} is not a unicast address", mac));
        }
    }

    if let Some(mac_b) = &node.mac_b {
        if let Some(mac_b) = check_mac("node.mac_b", mac_b, result) {
            if Some(mac_b) == mac {
                result.warn("node.mac_b: same as node.mac, no address substitution needed");
            }
        }
    }

    if node.protocol_version.is_none() {
        result.warn("node.protocol_version: not specified, using default v1");
    }

    if node.max_peers == Some(0) {
        result.error("node.max_peers: must be at least 1");
    }

    if node.rx_offloaded == Some(true) && node.learn_data_senders == Some(false) {
        result.warn("node.learn_data_senders: ignored while receive is offloaded");
    }
}

fn validate_ports(config: &Config, result: &mut ValidationResult) {
    if config.ports.is_empty() {
        result.error("ports: no ports defined");
        return;
    }

    for role in PortRole::ALL {
        let names: Vec<&str> = config
            .ports
            .iter()
            .filter(|(_, port)| port.role == role)
            .map(|(name, _)| name.as_str())
            .collect();

        match (role, names.len()) {
            (PortRole::Master, 0) => result.error("ports: a master port is required"),
            (PortRole::SlaveA | PortRole::SlaveB, 0) => result.warn(format!(
                "ports: no {} port, frames will not be redundant",
                role
            )),
            (_, 0 | 1) => {}
            _ => result.error(format!(
                "ports: role {} used by more than one port ({})",
                role,
                names.join(", ")
            )),
        }
    }

    for (name, port) in &config.ports {
        match &port.mac {
            Some(mac) => {
                check_mac(&format!("ports.{}.mac", name), mac, result);
            }
            None if port.role.is_slave() => result.warn(format!(
                "ports.{}.mac: not specified, using node address",
                name
            )),
            None => {}
        }
    }
}

fn validate_logging(config: &Config, result: &mut ValidationResult) {
    let Some(logging) = &config.logging else {
        return;
    };

    if !matches!(
        logging.level.to_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        result.warn(format!(
            "logging.level: unknown level '{}', using info",
            logging.level
        ));
    }
    if !matches!(logging.format.as_str(), "pretty" | "compact" | "json") {
        result.warn(format!(
            "logging.format: unknown format '{}', using pretty",
            logging.format
        ));
    }
}
