//! Ethernet frame parsing and construction, aware of redundancy tags

use super::hsr::{HsrTag, ProtocolVersion, ETH_HLEN, HSR_HLEN, VLAN_HLEN};
use super::{EtherType, MacAddr, VlanTag};
use crate::{Error, Result};

/// Minimum Ethernet frame size (without FCS)
pub const MIN_FRAME_SIZE: usize = ETH_HLEN;
/// Maximum tagged frame size (without FCS)
pub const MAX_FRAME_SIZE: usize = 1514 + HSR_HLEN + VLAN_HLEN;

/// Parsed Ethernet frame (zero-copy reference)
#[derive(Debug)]
pub struct Frame<'a> {
    buffer: &'a [u8],
    vlan_tag: Option<VlanTag>,
    hsr_tag: Option<HsrTag>,
    payload_offset: usize,
}

impl<'a> Frame<'a> {
    /// Parse an Ethernet frame from a buffer
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_FRAME_SIZE {
            return Err(Error::Parse("frame too short".into()));
        }

        let outer = u16::from_be_bytes([buffer[12], buffer[13]]);

        if outer == EtherType::Vlan as u16 {
            if buffer.len() < ETH_HLEN + VLAN_HLEN {
                return Err(Error::Parse("VLAN frame too short".into()));
            }
            let tag = VlanTag::from_bytes([buffer[14], buffer[15]]);
            return Ok(Self {
                buffer,
                vlan_tag: Some(tag),
                hsr_tag: None,
                payload_offset: ETH_HLEN + VLAN_HLEN,
            });
        }

        if EtherType::is_redundancy(outer) {
            let tag = HsrTag::read(buffer, ETH_HLEN)
                .ok_or_else(|| Error::Parse("tagged frame too short".into()))?;
            return Ok(Self {
                buffer,
                vlan_tag: None,
                hsr_tag: Some(tag),
                payload_offset: ETH_HLEN + HSR_HLEN,
            });
        }

        Ok(Self {
            buffer,
            vlan_tag: None,
            hsr_tag: None,
            payload_offset: ETH_HLEN,
        })
    }

    pub fn dst_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buffer[0..6]);
        MacAddr(mac)
    }

    pub fn src_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buffer[6..12]);
        MacAddr(mac)
    }

    /// The ethertype field right after the addresses
    pub fn outer_ethertype(&self) -> u16 {
        u16::from_be_bytes([self.buffer[12], self.buffer[13]])
    }

    /// Ethertype of the payload, looking through VLAN and redundancy tags
    pub fn ethertype(&self) -> u16 {
        if let Some(tag) = self.hsr_tag {
            return tag.encap_proto;
        }
        let offset = self.payload_offset - 2;
        u16::from_be_bytes([self.buffer[offset], self.buffer[offset + 1]])
    }

    pub fn vlan_tag(&self) -> Option<VlanTag> {
        self.vlan_tag
    }

    pub fn hsr_tag(&self) -> Option<HsrTag> {
        self.hsr_tag
    }

    pub fn is_tagged(&self) -> bool {
        self.hsr_tag.is_some()
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.payload_offset..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer
    }
}

/// Builder for constructing Ethernet frames
pub struct FrameBuilder {
    buffer: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_SIZE),
        }
    }

    pub fn dst_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn src_mac(mut self, mac: MacAddr) -> Self {
        self.buffer.extend_from_slice(&mac.0);
        self
    }

    pub fn vlan_tag(mut self, tag: VlanTag) -> Self {
        self.buffer
            .extend_from_slice(&(EtherType::Vlan as u16).to_be_bytes());
        self.buffer.extend_from_slice(&tag.to_bytes());
        self
    }

    /// Outer redundancy ethertype followed by the tag; `tag.encap_proto`
    /// takes the place of the payload ethertype
    pub fn hsr_tag(mut self, version: ProtocolVersion, tag: HsrTag) -> Self {
        self.buffer
            .extend_from_slice(&version.ethertype().to_be_bytes());
        self.buffer.extend_from_slice(&tag.to_bytes());
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.buffer.extend_from_slice(&ethertype.to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.buffer.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}
