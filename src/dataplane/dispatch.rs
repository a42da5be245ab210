//! Replica sinks: local delivery and egress transmission

use super::{FrameBuf, FrameContext, Node, Port};
use crate::protocol::hsr::ETH_HLEN;
use crate::protocol::PacketType;
use crate::Result;
use tracing::{debug, trace};

/// Hand an untagged replica to the upper layer through `master`.
///
/// The source address is rewritten to the sender's primary address unless
/// receive is offloaded.
pub(crate) fn deliver_local(
    node: &Node,
    ctx: &FrameContext<'_>,
    master: &Port,
    mut frame: FrameBuf,
) -> Result<()> {
    if !node.settings().rx_offloaded {
        if let Some(peer) = ctx.peer {
            node.addresses().substitute_source(peer, &mut frame);
        }
    }

    let len = frame.len().saturating_sub(ETH_HLEN);
    let multicast = frame.pkt_type() == PacketType::Multicast;
    match node.upper().deliver(frame) {
        Ok(()) => {
            master.stats().record_rx(len, multicast);
            node.metrics().frames_delivered.inc();
            trace!("Delivered seq {} from {} upstream", ctx.sequence_nr, ctx.port_rcv.name());
            Ok(())
        }
        Err(e) => {
            master.stats().record_rx_drop();
            debug!("Upper layer refused seq {}: {}", ctx.sequence_nr, e);
            Err(e)
        }
    }
}

/// Queue a tagged replica on `port`.
///
/// Frames coming down from master get the destination rewritten for the
/// egress lane and the port's own source address.
pub(crate) fn transmit(
    node: &Node,
    ctx: &FrameContext<'_>,
    port: &Port,
    mut frame: FrameBuf,
) -> Result<()> {
    if !node.settings().rx_offloaded && ctx.port_rcv.role().is_master() {
        if let Some(peer) = ctx.peer {
            node.addresses()
                .substitute_destination(peer, &mut frame, port.role());
        }
        frame.set_src_mac(port.mac_addr());
    }

    let len = frame.len();
    match port.device().transmit(frame) {
        Ok(()) => {
            port.stats().record_tx(len);
            node.metrics().frames_transmitted.inc();
            trace!("Sent seq {} on {}", ctx.sequence_nr, port.name());
            Ok(())
        }
        Err(e) => {
            port.stats().record_tx_error();
            debug!("Transmit on {} failed: {}", port.name(), e);
            Err(e)
        }
    }
}
