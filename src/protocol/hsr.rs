//! HSR/PRP redundancy tag and supervision frame layout (IEC 62439-3)
//!
//! Tagged frame:
//!
//! ```text
//! | dst (6) | src (6) | 0x892F/0x88FB (2) | path:4 lsdu:12 (2) | seq (2) | encap (2) | payload
//! ```
//!
//! HSRv1 supervision frames carry a regular tag with `encap = 0x88FB`
//! followed by the supervision tag. HSRv0 supervision frames put the
//! supervision tag directly behind the outer ethertype.

use super::{EtherType, MacAddr};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ETH_ALEN: usize = 6;
pub const ETH_HLEN: usize = 14;
pub const VLAN_HLEN: usize = 4;

/// Length of the redundancy tag
pub const HSR_HLEN: usize = 6;

/// Supervision TLV: node announcement after start-up
pub const TLV_ANNOUNCE: u8 = 22;
/// Supervision TLV: periodic life check
pub const TLV_LIFE_CHECK: u8 = 23;

/// Size of the supervision payload (MacAddressA)
pub const SUP_PAYLOAD_LEN: u8 = 6;
/// TLV length used by older firmware
pub const SUP_TLV_LEN_LEGACY: u8 = 12;

/// Default supervision multicast address; the last byte is configurable
pub const SUPERVISION_MULTICAST: MacAddr = MacAddr([0x01, 0x15, 0x4e, 0x00, 0x01, 0x00]);

/// Tagging variant used for frames this node tags itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// HSRv0, outer ethertype 0x88FB
    V0,
    /// HSRv1, outer ethertype 0x892F
    #[default]
    V1,
}

impl ProtocolVersion {
    pub fn ethertype(self) -> u16 {
        match self {
            ProtocolVersion::V0 => EtherType::Prp as u16,
            ProtocolVersion::V1 => EtherType::Hsr as u16,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V0 => write!(f, "v0"),
            ProtocolVersion::V1 => write!(f, "v1"),
        }
    }
}

/// The 6-byte redundancy tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsrTag {
    /// Path (lane) identifier, 4 bits
    pub path: u8,
    /// LSDU size, 12 bits
    pub lsdu_size: u16,
    pub sequence_nr: u16,
    /// Ethertype of the encapsulated payload
    pub encap_proto: u16,
}

impl HsrTag {
    pub fn from_bytes(bytes: [u8; HSR_HLEN]) -> Self {
        let path_and_size = u16::from_be_bytes([bytes[0], bytes[1]]);
        Self {
            path: (path_and_size >> 12) as u8,
            lsdu_size: path_and_size & 0x0FFF,
            sequence_nr: u16::from_be_bytes([bytes[2], bytes[3]]),
            encap_proto: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; HSR_HLEN] {
        let path_and_size = ((self.path as u16 & 0x0F) << 12) | (self.lsdu_size & 0x0FFF);
        let mut bytes = [0u8; HSR_HLEN];
        bytes[0..2].copy_from_slice(&path_and_size.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.sequence_nr.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.encap_proto.to_be_bytes());
        bytes
    }

    /// Read the tag at `offset` (the byte after the outer ethertype)
    pub fn read(frame: &[u8], offset: usize) -> Option<Self> {
        let bytes: [u8; HSR_HLEN] = frame.get(offset..offset + HSR_HLEN)?.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }
}

/// Sequence number carried in the tag of a tagged frame
pub fn sequence_nr(frame: &[u8]) -> Option<u16> {
    HsrTag::read(frame, ETH_HLEN).map(|tag| tag.sequence_nr)
}

/// Supervision tag following the outer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisionTag {
    pub path_and_version: u16,
    pub sequence_nr: u16,
    pub tlv_type: u8,
    pub tlv_length: u8,
}

impl SupervisionTag {
    const LEN: usize = 6;

    /// Locate the supervision tag according to the frame's outer ethertype.
    ///
    /// Returns the tag and the offset of the supervision payload, or `None`
    /// if the frame cannot be a supervision frame.
    pub fn locate(frame: &[u8]) -> Option<(Self, usize)> {
        let ethertype = u16::from_be_bytes(frame.get(12..14)?.try_into().ok()?);

        let offset = if ethertype == EtherType::Hsr as u16 {
            let tag = HsrTag::read(frame, ETH_HLEN)?;
            if tag.encap_proto != EtherType::Prp as u16 {
                return None;
            }
            ETH_HLEN + HSR_HLEN
        } else if ethertype == EtherType::Prp as u16 {
            ETH_HLEN
        } else {
            return None;
        };

        let bytes = frame.get(offset..offset + Self::LEN)?;
        let tag = Self {
            path_and_version: u16::from_be_bytes([bytes[0], bytes[1]]),
            sequence_nr: u16::from_be_bytes([bytes[2], bytes[3]]),
            tlv_type: bytes[4],
            tlv_length: bytes[5],
        };
        Some((tag, offset + Self::LEN))
    }

    /// Accepted TLV type and length
    pub fn is_valid(&self) -> bool {
        matches!(self.tlv_type, TLV_ANNOUNCE | TLV_LIFE_CHECK)
            && matches!(self.tlv_length, SUP_TLV_LEN_LEGACY | SUP_PAYLOAD_LEN)
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0u8; Self::LEN];
        bytes[0..2].copy_from_slice(&self.path_and_version.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.sequence_nr.to_be_bytes());
        bytes[4] = self.tlv_type;
        bytes[5] = self.tlv_length;
        bytes
    }
}

/// MacAddressA announced in a supervision frame
pub fn supervision_mac_a(frame: &[u8]) -> Option<MacAddr> {
    let (_, payload) = SupervisionTag::locate(frame)?;
    MacAddr::from_slice(frame.get(payload..)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_supervision(tlv_type: u8, tlv_length: u8) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&SUPERVISION_MULTICAST.0);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]);
        frame.extend_from_slice(&0x892Fu16.to_be_bytes());
        let tag = HsrTag {
            path: 0,
            lsdu_size: 52,
            sequence_nr: 7,
            encap_proto: 0x88FB,
        };
        frame.extend_from_slice(&tag.to_bytes());
        let sup = SupervisionTag {
            path_and_version: 0x0001,
            sequence_nr: 3,
            tlv_type,
            tlv_length,
        };
        frame.extend_from_slice(&sup.to_bytes());
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]);
        frame
    }

    #[test]
    fn test_tag_bit_layout() {
        let tag = HsrTag {
            path: 1,
            lsdu_size: 0x02e,
            sequence_nr: 0x1234,
            encap_proto: 0x0800,
        };
        assert_eq!(tag.to_bytes(), [0x10, 0x2e, 0x12, 0x34, 0x08, 0x00]);
        assert_eq!(HsrTag::from_bytes(tag.to_bytes()), tag);
    }

    #[test]
    fn test_tag_lsdu_truncated_to_12_bits() {
        let tag = HsrTag {
            path: 0,
            lsdu_size: 0xFFFF,
            sequence_nr: 0,
            encap_proto: 0,
        };
        assert_eq!(HsrTag::from_bytes(tag.to_bytes()).lsdu_size, 0x0FFF);
        assert_eq!(HsrTag::from_bytes(tag.to_bytes()).path, 0);
    }

    #[test]
    fn test_sequence_nr_short_frame() {
        assert_eq!(sequence_nr(&[0u8; 17]), None);
        let mut frame = vec![0u8; 20];
        frame[16] = 0xab;
        frame[17] = 0xcd;
        assert_eq!(sequence_nr(&frame), Some(0xabcd));
    }

    #[test]
    fn test_protocol_version_ethertype() {
        assert_eq!(ProtocolVersion::V0.ethertype(), 0x88FB);
        assert_eq!(ProtocolVersion::V1.ethertype(), 0x892F);
        assert_eq!(ProtocolVersion::default(), ProtocolVersion::V1);
    }

    #[test]
    fn test_locate_v1_supervision() {
        let frame = v1_supervision(TLV_LIFE_CHECK, SUP_PAYLOAD_LEN);
        let (tag, payload) = SupervisionTag::locate(&frame).unwrap();
        assert_eq!(payload, 26);
        assert_eq!(tag.tlv_type, TLV_LIFE_CHECK);
        assert!(tag.is_valid());
        assert_eq!(
            supervision_mac_a(&frame),
            Some(MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]))
        );
    }

    #[test]
    fn test_locate_v1_requires_prp_encap() {
        let mut frame = v1_supervision(TLV_ANNOUNCE, SUP_PAYLOAD_LEN);
        frame[18..20].copy_from_slice(&0x0800u16.to_be_bytes());
        assert!(SupervisionTag::locate(&frame).is_none());
    }

    #[test]
    fn test_locate_v0_supervision() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&SUPERVISION_MULTICAST.0);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x0b]);
        frame.extend_from_slice(&0x88FBu16.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x09, TLV_ANNOUNCE, SUP_TLV_LEN_LEGACY]);
        frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x0b]);

        let (tag, payload) = SupervisionTag::locate(&frame).unwrap();
        assert_eq!(payload, 20);
        assert_eq!(tag.sequence_nr, 9);
        assert!(tag.is_valid());
    }

    #[test]
    fn test_supervision_rejects_unknown_tlv() {
        let frame = v1_supervision(0x05, SUP_PAYLOAD_LEN);
        let (tag, _) = SupervisionTag::locate(&frame).unwrap();
        assert!(!tag.is_valid());

        let frame = v1_supervision(TLV_ANNOUNCE, 8);
        let (tag, _) = SupervisionTag::locate(&frame).unwrap();
        assert!(!tag.is_valid());
    }

    #[test]
    fn test_locate_plain_frame() {
        let mut frame = vec![0u8; 60];
        frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
        assert!(SupervisionTag::locate(&frame).is_none());
        assert!(SupervisionTag::locate(&frame[..10]).is_none());
    }
}
