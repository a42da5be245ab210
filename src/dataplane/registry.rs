//! Contracts consumed from the node registry
//!
//! The registry learns peers and remembers, per port, which sequence numbers
//! have already gone out. The forwarding engine only needs the operations
//! below; [`DuplicateFilter`] wraps the two bookkeeping calls and bypasses
//! them when the hardware already discards duplicates.

use super::{FrameBuf, Port, PortRole};

/// Opaque handle of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u32);

/// Peer lookup and duplicate bookkeeping
///
/// Implementations synchronize internally; `register_outgoing` must be an
/// atomic test-and-set.
pub trait NodeRegistry: Send + Sync {
    /// Find the sender of `frame`, registering it if allowed.
    ///
    /// `is_supervision` lets unknown senders of supervision frames be
    /// created. Returns `None` for an unknown sender that may not be
    /// registered or when there is no room.
    fn resolve_or_register(&self, port: &Port, frame: &FrameBuf, is_supervision: bool)
        -> Option<PeerId>;

    /// Note that `sequence_nr` from `peer` arrived on `port`
    fn register_incoming(&self, peer: PeerId, port: PortRole, sequence_nr: u16);

    /// Mark `sequence_nr` from `peer` as sent on `port`.
    ///
    /// Returns true if it had already been sent there.
    fn register_outgoing(&self, port: PortRole, peer: PeerId, sequence_nr: u16) -> bool;

    /// Consume a supervision frame received on `port`
    fn handle_supervision(&self, frame: &FrameBuf, peer: PeerId, port: PortRole);
}

/// MAC address rewriting for nodes using different addresses per lane
pub trait AddressPolicy: Send + Sync {
    /// Rewrite the source of a frame delivered upstream to the peer's
    /// primary address
    fn substitute_source(&self, peer: PeerId, frame: &mut FrameBuf);

    /// Rewrite the destination of a frame sent on `port` to the address the
    /// destination node uses on that lane
    fn substitute_destination(&self, peer: PeerId, frame: &mut FrameBuf, port: PortRole);
}

/// Duplicate discard on top of a [`NodeRegistry`]
pub struct DuplicateFilter<'a> {
    registry: &'a dyn NodeRegistry,
    rx_offloaded: bool,
}

impl<'a> DuplicateFilter<'a> {
    pub fn new(registry: &'a dyn NodeRegistry, rx_offloaded: bool) -> Self {
        Self {
            registry,
            rx_offloaded,
        }
    }

    /// Record the arrival of a frame; never gates forwarding
    pub fn register_in(&self, peer: Option<PeerId>, port: PortRole, sequence_nr: u16) {
        if self.rx_offloaded {
            return;
        }
        if let Some(peer) = peer {
            self.registry.register_incoming(peer, port, sequence_nr);
        }
    }

    /// Test-and-set: true if this frame already went out on `port`
    pub fn already_sent(&self, port: PortRole, peer: Option<PeerId>, sequence_nr: u16) -> bool {
        if self.rx_offloaded {
            return false;
        }
        match peer {
            Some(peer) => self.registry.register_outgoing(port, peer, sequence_nr),
            None => false,
        }
    }
}
