//! Frame classification
//!
//! Turns a received buffer into a [`FrameContext`]: framing, sequence number,
//! supervision status, sender and locality. Nothing here transmits or frees a
//! frame; failures are returned and the caller drops the frame.

use super::codec;
use super::{FrameBuf, Node, PeerId, Port, PortRole};
use crate::protocol::hsr::{self, SupervisionTag};
use crate::protocol::{EtherType, MacAddr, PacketType, ProtocolVersion};
use crate::{Error, Result};

/// Everything the forwarding engine needs to know about one received frame.
///
/// Exactly one of `tagged` and `untagged` holds the received buffer. The
/// other is derived on demand and cached for the remaining ports.
#[derive(Debug)]
pub struct FrameContext<'a> {
    pub tagged: Option<FrameBuf>,
    pub untagged: Option<FrameBuf>,
    pub port_rcv: &'a Port,
    /// Registry handle of the sender; `None` when receive is offloaded
    pub peer: Option<PeerId>,
    pub sequence_nr: u16,
    pub is_supervision: bool,
    pub is_vlan: bool,
    /// Master should get a copy
    pub is_local_dest: bool,
    /// Addressed to this node only; nobody else gets a copy
    pub is_local_exclusive: bool,
}

impl<'a> FrameContext<'a> {
    /// The frame as received
    pub fn original(&self) -> Option<&FrameBuf> {
        self.tagged.as_ref().or(self.untagged.as_ref())
    }

    /// Untagged replica for the master port.
    ///
    /// Strips the tag on first use and caches the result.
    pub fn untagged_replica(&mut self) -> Result<FrameBuf> {
        if let Some(untagged) = &self.untagged {
            return Ok(untagged.clone());
        }
        let tagged = self
            .tagged
            .as_ref()
            .ok_or_else(|| Error::MalformedFrame("frame context holds no buffer".into()))?;
        let stripped = codec::strip(tagged, self.is_vlan)?;
        self.untagged = Some(stripped.clone());
        Ok(stripped)
    }

    /// Tagged replica for a slave or interlink port.
    ///
    /// A frame that arrived tagged is shared as is; otherwise a fresh copy is
    /// tagged for the lane of `role`.
    pub fn tagged_replica(&self, role: PortRole, version: ProtocolVersion) -> Result<FrameBuf> {
        if let Some(tagged) = &self.tagged {
            return Ok(tagged.clone());
        }
        let untagged = self
            .untagged
            .as_ref()
            .ok_or_else(|| Error::MalformedFrame("frame context holds no buffer".into()))?;
        codec::tag_for_port(untagged, role, self.sequence_nr, version, self.is_vlan)
    }
}

/// Whether `frame` is a supervision frame for a node listening on
/// `multicast`
pub fn is_supervision_frame(frame: &FrameBuf, multicast: MacAddr) -> bool {
    if frame.dst_mac() != Some(multicast) {
        return false;
    }
    SupervisionTag::locate(frame.as_bytes()).is_some_and(|(tag, _)| tag.is_valid())
}

/// Classify a frame received on `port`.
///
/// Untagged frames consume a sequence number from the node counter. A frame
/// addressed to one of the node's own addresses is marked as host-bound.
pub fn classify<'a>(node: &Node, mut frame: FrameBuf, port: &'a Port) -> Result<FrameContext<'a>> {
    let settings = node.settings();
    let src = frame
        .src_mac()
        .ok_or_else(|| Error::MalformedFrame(format!("{} bytes, no address header", frame.len())))?;
    let dst = frame.dst_mac().unwrap_or(MacAddr::ZERO);

    let is_supervision = is_supervision_frame(&frame, settings.supervision_multicast);
    if is_supervision && settings.rx_offloaded && !port.role().is_master() {
        return Err(Error::ProtocolViolation(format!(
            "supervision frame from {} reached {} although receive is offloaded",
            src,
            port.name()
        )));
    }

    let peer = if settings.rx_offloaded {
        None
    } else {
        Some(
            node.registry()
                .resolve_or_register(port, &frame, is_supervision)
                .ok_or(Error::UnknownPeer(src))?,
        )
    };

    // VLAN-tagged frames are not forwarded
    let ethertype = frame.ethertype().unwrap_or_default();
    if ethertype == EtherType::Vlan as u16 {
        return Err(Error::VlanUnsupported);
    }

    let is_local_exclusive = settings.is_self(dst);
    if is_local_exclusive {
        frame.set_pkt_type(PacketType::Host);
    }
    let is_local_dest = frame.pkt_type().is_local();

    let (tagged, untagged, sequence_nr) = if EtherType::is_redundancy(ethertype) {
        let sequence_nr = hsr::sequence_nr(frame.as_bytes()).ok_or_else(|| {
            Error::MalformedFrame(format!("{} bytes is too short for a tag", frame.len()))
        })?;
        (Some(frame), None, sequence_nr)
    } else {
        (None, Some(frame), node.sequence().next())
    };

    Ok(FrameContext {
        tagged,
        untagged,
        port_rcv: port,
        peer,
        sequence_nr,
        is_supervision,
        is_vlan: false,
        is_local_dest,
        is_local_exclusive,
    })
}
