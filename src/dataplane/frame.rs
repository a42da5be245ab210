//! Frame buffers passed through the forwarding pipeline
//!
//! A `FrameBuf` is cheap to clone: clones share the underlying bytes. Any
//! mutation goes through copy-on-write, so a replica handed to one port never
//! changes what another port transmits.

use crate::protocol::{MacAddr, PacketType};
use std::sync::Arc;

/// A received or constructed Ethernet frame plus its receive metadata
#[derive(Debug, Clone)]
pub struct FrameBuf {
    data: Arc<Vec<u8>>,
    /// Offset of the link-layer header from the start of `data`
    mac_offset: usize,
    pkt_type: PacketType,
    /// Start of the partially computed checksum, if any
    csum_start: Option<usize>,
}

impl FrameBuf {
    /// Wrap raw frame bytes; the delivery class is derived from the
    /// destination address alone (broadcast, multicast or other host)
    pub fn new(data: Vec<u8>) -> Self {
        let pkt_type = MacAddr::from_slice(&data)
            .map(PacketType::from_destination)
            .unwrap_or_default();
        Self {
            data: Arc::new(data),
            mac_offset: 0,
            pkt_type,
            csum_start: None,
        }
    }

    pub(crate) fn derived(data: Vec<u8>, pkt_type: PacketType, csum_start: Option<usize>) -> Self {
        Self {
            data: Arc::new(data),
            mac_offset: 0,
            pkt_type,
            csum_start,
        }
    }

    pub fn with_mac_offset(mut self, offset: usize) -> Self {
        self.mac_offset = offset;
        self
    }

    pub fn with_packet_type(mut self, pkt_type: PacketType) -> Self {
        self.pkt_type = pkt_type;
        self
    }

    pub fn with_csum_start(mut self, csum_start: usize) -> Self {
        self.csum_start = Some(csum_start);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mac_offset(&self) -> usize {
        self.mac_offset
    }

    pub fn pkt_type(&self) -> PacketType {
        self.pkt_type
    }

    pub fn set_pkt_type(&mut self, pkt_type: PacketType) {
        self.pkt_type = pkt_type;
    }

    pub fn csum_start(&self) -> Option<usize> {
        self.csum_start
    }

    pub fn dst_mac(&self) -> Option<MacAddr> {
        MacAddr::from_slice(&self.data)
    }

    pub fn src_mac(&self) -> Option<MacAddr> {
        MacAddr::from_slice(self.data.get(6..)?)
    }

    /// Outer ethertype
    pub fn ethertype(&self) -> Option<u16> {
        let bytes = self.data.get(12..14)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Whether two buffers share the same bytes
    pub fn shares_data(&self, other: &FrameBuf) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn set_dst_mac(&mut self, mac: MacAddr) {
        self.write_at(0, &mac.0);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.write_at(6, &mac.0);
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let data = Arc::make_mut(&mut self.data);
        if let Some(slot) = data.get_mut(offset..offset + bytes.len()) {
            slot.copy_from_slice(bytes);
        }
    }

    /// Take the bytes out, copying only if they are still shared
    pub fn into_vec(self) -> Vec<u8> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}
