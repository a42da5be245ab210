//! Helpers for driving whole nodes with in-memory ports

use hsr_lre::capture::{MemoryPort, MemoryUpperLayer};
use hsr_lre::dataplane::{ForwardOutcome, FrameBuf, Node, NodeSettings, NodeTable, PortId, PortRole};
use hsr_lre::protocol::ethernet::FrameBuilder;
use hsr_lre::protocol::hsr::{
    HsrTag, SupervisionTag, ETH_HLEN, SUPERVISION_MULTICAST, SUP_PAYLOAD_LEN, TLV_ANNOUNCE,
};
use hsr_lre::protocol::{EtherType, MacAddr, ProtocolVersion};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PAYLOAD: [u8; 46] = [0x5a; 46];

/// Node with master, slave-a and slave-b backed by recording ports
pub struct TestNode {
    pub node: Arc<Node>,
    pub upper: Arc<MemoryUpperLayer>,
    pub table: Arc<NodeTable>,
    devices: BTreeMap<PortRole, Arc<MemoryPort>>,
}

impl TestNode {
    /// All ports share the node address
    pub fn new(settings: NodeSettings) -> Self {
        let mac = settings.mac_addr;
        Self::with_port_macs(settings, [mac, mac])
    }

    pub fn with_port_macs(settings: NodeSettings, slave_macs: [MacAddr; 2]) -> Self {
        Self::build(settings, slave_macs, 0)
    }

    pub fn with_sequence(settings: NodeSettings, initial: u16) -> Self {
        let mac = settings.mac_addr;
        Self::build(settings, [mac, mac], initial)
    }

    fn build(settings: NodeSettings, slave_macs: [MacAddr; 2], initial: u16) -> Self {
        let upper = Arc::new(MemoryUpperLayer::new());
        let table = Arc::new(NodeTable::default());
        let mut devices = BTreeMap::new();

        let name = settings.name.clone();
        let master_mac = settings.mac_addr;
        let mut builder = Node::builder(settings, upper.clone())
            .node_table(table.clone())
            .initial_sequence(initial);
        for (role, port_name, mac) in [
            (PortRole::Master, format!("{}-master", name), master_mac),
            (PortRole::SlaveA, format!("{}-a", name), slave_macs[0]),
            (PortRole::SlaveB, format!("{}-b", name), slave_macs[1]),
        ] {
            let device = Arc::new(MemoryPort::new(port_name.clone()));
            devices.insert(role, device.clone());
            builder = builder.port(role, port_name, mac, device);
        }

        Self {
            node: Arc::new(builder.build().expect("valid port set")),
            upper,
            table,
            devices,
        }
    }

    pub fn id(&self, role: PortRole) -> PortId {
        self.node
            .port_by_role(role)
            .map(|port| port.id())
            .expect("port exists")
    }

    pub fn receive(&self, role: PortRole, frame: FrameBuf) -> ForwardOutcome {
        self.node.forward(frame, self.id(role))
    }

    /// Drain what was transmitted on `role`
    pub fn sent(&self, role: PortRole) -> Vec<FrameBuf> {
        self.devices[&role].take()
    }

    pub fn sent_count(&self, role: PortRole) -> usize {
        self.devices[&role].len()
    }

    pub fn delivered(&self) -> Vec<FrameBuf> {
        self.upper.take()
    }
}

pub fn mac(last: u8) -> MacAddr {
    MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, last])
}

pub fn untagged(src: MacAddr, dst: MacAddr) -> FrameBuf {
    FrameBuf::new(
        FrameBuilder::new()
            .dst_mac(dst)
            .src_mac(src)
            .ethertype(EtherType::Ipv4 as u16)
            .payload(&PAYLOAD)
            .build(),
    )
}

pub fn tagged(src: MacAddr, dst: MacAddr, seq: u16, path: u8) -> FrameBuf {
    let tag = HsrTag {
        path,
        lsdu_size: (6 + PAYLOAD.len()) as u16,
        sequence_nr: seq,
        encap_proto: EtherType::Ipv4 as u16,
    };
    FrameBuf::new(
        FrameBuilder::new()
            .dst_mac(dst)
            .src_mac(src)
            .hsr_tag(ProtocolVersion::V1, tag)
            .payload(&PAYLOAD)
            .build(),
    )
}

/// HSRv1 announce from `src` advertising `mac_a`
pub fn supervision(src: MacAddr, mac_a: MacAddr, seq: u16) -> FrameBuf {
    let tag = HsrTag {
        path: 1,
        lsdu_size: 18,
        sequence_nr: seq,
        encap_proto: EtherType::Prp as u16,
    };
    let sup = SupervisionTag {
        path_and_version: 1,
        sequence_nr: seq,
        tlv_type: TLV_ANNOUNCE,
        tlv_length: SUP_PAYLOAD_LEN,
    };
    FrameBuf::new(
        FrameBuilder::new()
            .dst_mac(SUPERVISION_MULTICAST)
            .src_mac(src)
            .hsr_tag(ProtocolVersion::V1, tag)
            .payload(&sup.to_bytes())
            .payload(&mac_a.0)
            .build(),
    )
}

pub fn tag_of(frame: &FrameBuf) -> HsrTag {
    HsrTag::read(frame.as_bytes(), ETH_HLEN).expect("tagged frame")
}
