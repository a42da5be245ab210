//! Redundancy tag codec
//!
//! `strip` and `add_tag` never touch their input: each builds a fresh buffer
//! so the original can still be cloned for other ports. Allocation is
//! fallible; a failure costs one replica, not the whole forward.

use super::{FrameBuf, Lane, PortRole};
use crate::protocol::hsr::{HsrTag, ProtocolVersion, ETH_ALEN, ETH_HLEN, HSR_HLEN, VLAN_HLEN};
use crate::{Error, Result};

fn alloc(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::Alloc { len })?;
    Ok(buf)
}

fn vlan_len(is_vlan: bool) -> usize {
    if is_vlan {
        VLAN_HLEN
    } else {
        0
    }
}

/// Remove the redundancy tag.
///
/// The addresses (and VLAN header) are kept, the tag's encapsulated protocol
/// becomes the ethertype and the payload follows unchanged.
pub fn strip(tagged: &FrameBuf, is_vlan: bool) -> Result<FrameBuf> {
    let data = tagged.as_bytes();
    let addr_len = 2 * ETH_ALEN + vlan_len(is_vlan);
    if data.len() < addr_len + 2 + HSR_HLEN {
        return Err(Error::MalformedFrame(format!(
            "{} bytes is too short to strip a tag",
            data.len()
        )));
    }

    let mut out = alloc(data.len() - HSR_HLEN)?;
    out.extend_from_slice(&data[..addr_len]);
    // Skip outer ethertype and the first four tag bytes; encap_proto lands
    // where the ethertype belongs.
    out.extend_from_slice(&data[addr_len + HSR_HLEN..]);

    let csum_start = tagged
        .csum_start()
        .map(|start| start.saturating_sub(HSR_HLEN));
    Ok(FrameBuf::derived(out, tagged.pkt_type(), csum_start))
}

/// Insert a redundancy tag for `lane` carrying `sequence_nr`.
pub fn add_tag(
    untagged: &FrameBuf,
    lane: Lane,
    sequence_nr: u16,
    version: ProtocolVersion,
    is_vlan: bool,
) -> Result<FrameBuf> {
    let data = untagged.as_bytes();
    let movelen = ETH_HLEN + vlan_len(is_vlan);
    if data.len() < movelen {
        return Err(Error::MalformedFrame(format!(
            "{} bytes is too short to tag",
            data.len()
        )));
    }

    let len = data.len() + HSR_HLEN;
    let lsdu_size = len - ETH_HLEN - vlan_len(is_vlan);
    let tag = HsrTag {
        path: lane.path_id(),
        lsdu_size: (lsdu_size & 0x0FFF) as u16,
        sequence_nr,
        encap_proto: u16::from_be_bytes([data[movelen - 2], data[movelen - 1]]),
    };

    let mut out = alloc(len)?;
    out.extend_from_slice(&data[..movelen - 2]);
    out.extend_from_slice(&version.ethertype().to_be_bytes());
    out.extend_from_slice(&tag.to_bytes());
    out.extend_from_slice(&data[movelen..]);

    let csum_start = untagged.csum_start().map(|start| start + HSR_HLEN);
    Ok(FrameBuf::derived(out, untagged.pkt_type(), csum_start))
}

/// Tag a frame for the lane of a slave port
pub fn tag_for_port(
    untagged: &FrameBuf,
    role: PortRole,
    sequence_nr: u16,
    version: ProtocolVersion,
    is_vlan: bool,
) -> Result<FrameBuf> {
    let lane = role.lane().ok_or(Error::NotASlave { role })?;
    add_tag(untagged, lane, sequence_nr, version, is_vlan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ethernet::{Frame, FrameBuilder};
    use crate::protocol::{EtherType, MacAddr, PacketType, VlanTag};

    const DST: MacAddr = MacAddr([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
    const SRC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x0a]);
    const PAYLOAD: [u8; 8] = [0x45, 0x00, 0x00, 0x1c, 0xde, 0xad, 0xbe, 0xef];

    fn plain_frame() -> FrameBuf {
        FrameBuf::new(
            FrameBuilder::new()
                .dst_mac(DST)
                .src_mac(SRC)
                .ethertype(EtherType::Ipv4 as u16)
                .payload(&PAYLOAD)
                .build(),
        )
    }

    fn vlan_frame() -> FrameBuf {
        FrameBuf::new(
            FrameBuilder::new()
                .dst_mac(DST)
                .src_mac(SRC)
                .vlan_tag(VlanTag::new(10))
                .ethertype(EtherType::Ipv4 as u16)
                .payload(&PAYLOAD)
                .build(),
        )
    }

    #[test]
    fn test_add_tag_layout() {
        let plain = plain_frame();
        let tagged = add_tag(&plain, Lane::B, 5, ProtocolVersion::V1, false).unwrap();

        assert_eq!(tagged.len(), plain.len() + HSR_HLEN);
        let frame = Frame::parse(tagged.as_bytes()).unwrap();
        assert_eq!(frame.dst_mac(), DST);
        assert_eq!(frame.src_mac(), SRC);
        assert_eq!(frame.outer_ethertype(), EtherType::Hsr as u16);

        let tag = frame.hsr_tag().unwrap();
        assert_eq!(tag.path, 1);
        assert_eq!(tag.sequence_nr, 5);
        assert_eq!(tag.encap_proto, EtherType::Ipv4 as u16);
        // LSDU covers tag + payload
        assert_eq!(tag.lsdu_size as usize, HSR_HLEN + PAYLOAD.len());
        assert_eq!(frame.payload(), &PAYLOAD);
    }

    #[test]
    fn test_add_tag_v0_uses_prp_ethertype() {
        let tagged = add_tag(&plain_frame(), Lane::A, 9, ProtocolVersion::V0, false).unwrap();
        let frame = Frame::parse(tagged.as_bytes()).unwrap();
        assert_eq!(frame.outer_ethertype(), EtherType::Prp as u16);
        assert_eq!(frame.hsr_tag().unwrap().path, 0);
    }

    #[test]
    fn test_add_tag_leaves_input_untouched() {
        let plain = plain_frame();
        let before = plain.as_bytes().to_vec();
        let tagged = add_tag(&plain, Lane::A, 1, ProtocolVersion::V1, false).unwrap();

        assert_eq!(plain.as_bytes(), &before[..]);
        assert!(!tagged.shares_data(&plain));
    }

    #[test]
    fn test_strip_restores_plain_frame() {
        let plain = plain_frame();
        let tagged = add_tag(&plain, Lane::A, 1234, ProtocolVersion::V1, false).unwrap();
        let before = tagged.as_bytes().to_vec();

        let stripped = strip(&tagged, false).unwrap();
        assert_eq!(stripped.as_bytes(), plain.as_bytes());
        assert_eq!(tagged.as_bytes(), &before[..]);
    }

    #[test]
    fn test_tag_of_stripped_reproduces_tag() {
        for version in [ProtocolVersion::V0, ProtocolVersion::V1] {
            let original = add_tag(&plain_frame(), Lane::B, 0xfffe, version, false).unwrap();
            let again = add_tag(
                &strip(&original, false).unwrap(),
                Lane::B,
                0xfffe,
                version,
                false,
            )
            .unwrap();
            assert_eq!(again.as_bytes(), original.as_bytes());
        }
    }

    #[test]
    fn test_vlan_tag_goes_after_vlan_header() {
        let plain = vlan_frame();
        let tagged = add_tag(&plain, Lane::A, 77, ProtocolVersion::V1, true).unwrap();
        let data = tagged.as_bytes();

        // VLAN header stays right behind the addresses
        assert_eq!(&data[12..14], &[0x81, 0x00]);
        assert_eq!(&data[16..18], &0x892Fu16.to_be_bytes());
        let tag = HsrTag::read(data, 18).unwrap();
        assert_eq!(tag.sequence_nr, 77);
        assert_eq!(tag.encap_proto, EtherType::Ipv4 as u16);
        assert_eq!(tag.lsdu_size as usize, HSR_HLEN + PAYLOAD.len());

        let stripped = strip(&tagged, true).unwrap();
        assert_eq!(stripped.as_bytes(), plain.as_bytes());
    }

    #[test]
    fn test_checksum_offset_follows_header() {
        let plain = plain_frame().with_csum_start(34);
        let tagged = add_tag(&plain, Lane::A, 1, ProtocolVersion::V1, false).unwrap();
        assert_eq!(tagged.csum_start(), Some(40));

        let stripped = strip(&tagged, false).unwrap();
        assert_eq!(stripped.csum_start(), Some(34));

        assert_eq!(strip(&plain_frame(), false).unwrap().csum_start(), None);
    }

    #[test]
    fn test_packet_type_is_carried() {
        let plain = plain_frame().with_packet_type(PacketType::Host);
        let tagged = add_tag(&plain, Lane::A, 1, ProtocolVersion::V1, false).unwrap();
        assert_eq!(tagged.pkt_type(), PacketType::Host);
        assert_eq!(strip(&tagged, false).unwrap().pkt_type(), PacketType::Host);
    }

    #[test]
    fn test_short_frames_are_rejected() {
        let runt = FrameBuf::new(vec![0u8; 13]);
        assert!(matches!(
            add_tag(&runt, Lane::A, 0, ProtocolVersion::V1, false),
            Err(Error::MalformedFrame(_))
        ));

        let header_only = FrameBuf::new(vec![0u8; 19]);
        assert!(matches!(
            strip(&header_only, false),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_tag_for_port_rejects_non_slaves() {
        let plain = plain_frame();
        for role in [PortRole::Master, PortRole::Interlink] {
            let err = tag_for_port(&plain, role, 1, ProtocolVersion::V1, false).unwrap_err();
            assert!(matches!(err, Error::NotASlave { role: r } if r == role));
        }

        let tagged = tag_for_port(&plain, PortRole::SlaveB, 1, ProtocolVersion::V1, false).unwrap();
        assert_eq!(HsrTag::read(tagged.as_bytes(), 14).unwrap().path, 1);
    }
}
