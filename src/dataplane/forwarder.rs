//! Frame forwarder
//!
//! Sends one received frame to every other eligible port exactly once. Each
//! port is checked against an ordered list of guards; the first guard that
//! matches skips the port. Surviving ports get a replica: master the
//! untagged form, every other port the tagged form.

use super::classifier::classify;
use super::dispatch;
use super::{DuplicateFilter, FrameBuf, FrameContext, Node, Port, PortId};
use crate::protocol::hsr::ETH_HLEN;
use crate::Error;
use tracing::{debug, trace, warn};

/// Result of forwarding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded {
        /// Ports whose device accepted a replica
        transmitted: Vec<PortId>,
        /// Upper layer accepted the untagged replica
        delivered: bool,
        /// Supervision frame handed to the registry
        supervision_consumed: bool,
        /// Replicas that could not be built
        replicas_dropped: usize,
        /// Ports a guard skipped, with the guard that matched
        skipped: Vec<(PortId, SkipReason)>,
    },
    /// The whole frame was dropped before any port was considered
    Dropped(DropReason),
}

impl ForwardOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, ForwardOutcome::Dropped(_))
    }

    pub fn transmitted(&self) -> &[PortId] {
        match self {
            ForwardOutcome::Forwarded { transmitted, .. } => transmitted,
            ForwardOutcome::Dropped(_) => &[],
        }
    }

    pub fn delivered(&self) -> bool {
        matches!(self, ForwardOutcome::Forwarded { delivered: true, .. })
    }

    /// Why `port` was skipped, if it was
    pub fn skip_reason(&self, port: PortId) -> Option<SkipReason> {
        match self {
            ForwardOutcome::Forwarded { skipped, .. } => skipped
                .iter()
                .find(|(id, _)| *id == port)
                .map(|(_, reason)| *reason),
            ForwardOutcome::Dropped(_) => None,
        }
    }
}

/// Why a whole frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// MAC header not at the buffer start or frame too short
    Malformed,
    VlanUnsupported,
    /// Supervision frame on a slave while receive is offloaded
    ProtocolViolation,
    /// Registry could not resolve the sender
    UnknownPeer,
    /// Receiving port id does not exist on this node
    NoSuchPort,
}

/// Which guard skipped a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ReceivingPort,
    /// Master, but the frame is not for this node
    NotLocal,
    /// Frame addressed to this node only
    ExclusiveLocal,
    /// Already sent on this port
    Duplicate,
    SupervisionConsumed,
    /// Hardware forwards between the slaves
    Offloaded,
}

type Guard = fn(&Node, &FrameContext<'_>, &Port) -> bool;

/// Evaluated in order; the first match skips the port
const GUARDS: [(SkipReason, Guard); 6] = [
    (SkipReason::ReceivingPort, is_receiving_port),
    (SkipReason::NotLocal, is_master_not_local),
    (SkipReason::ExclusiveLocal, is_exclusive_elsewhere),
    (SkipReason::Duplicate, is_already_sent),
    (SkipReason::SupervisionConsumed, consume_supervision),
    (SkipReason::Offloaded, is_offloaded_slave_pair),
];

fn is_receiving_port(_node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    port.id() == ctx.port_rcv.id()
}

fn is_master_not_local(_node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    port.role().is_master() && !ctx.is_local_dest
}

fn is_exclusive_elsewhere(_node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    !port.role().is_master() && ctx.is_local_exclusive
}

fn is_already_sent(node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    DuplicateFilter::new(node.registry(), node.settings().rx_offloaded).already_sent(
        port.role(),
        ctx.peer,
        ctx.sequence_nr,
    )
}

/// Supervision frames stop at master: the registry consumes the original
fn consume_supervision(node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    if !ctx.is_supervision || !port.role().is_master() || node.settings().rx_offloaded {
        return false;
    }
    if let (Some(peer), Some(frame)) = (ctx.peer, ctx.original()) {
        node.registry()
            .handle_supervision(frame, peer, ctx.port_rcv.role());
    }
    true
}

fn is_offloaded_slave_pair(node: &Node, ctx: &FrameContext<'_>, port: &Port) -> bool {
    node.settings().l2_forward_offloaded && ctx.port_rcv.role().is_slave() && port.role().is_slave()
}

impl Node {
    /// Forward a frame received on `port_id`.
    ///
    /// Safe to call concurrently from several receive threads. Failures only
    /// ever affect this frame, or a single replica of it.
    pub fn forward(&self, frame: FrameBuf, port_id: PortId) -> ForwardOutcome {
        let Some(port) = self.port(port_id) else {
            self.metrics().frames_dropped.inc();
            debug!("{}: frame for unknown port {}", self.settings().name, port_id);
            return ForwardOutcome::Dropped(DropReason::NoSuchPort);
        };
        self.metrics().frames_received.inc();

        if frame.mac_offset() != 0 || frame.len() < ETH_HLEN {
            let err = Error::MalformedFrame(format!(
                "mac header at {}, {} bytes",
                frame.mac_offset(),
                frame.len()
            ));
            return self.drop_frame(port, err);
        }

        let mut ctx = match classify(self, frame, port) {
            Ok(ctx) => ctx,
            Err(e) => return self.drop_frame(port, e),
        };
        DuplicateFilter::new(self.registry(), self.settings().rx_offloaded).register_in(
            ctx.peer,
            port.role(),
            ctx.sequence_nr,
        );

        let mut transmitted = Vec::new();
        let mut delivered = false;
        let mut supervision_consumed = false;
        let mut replicas_dropped = 0;
        let mut skipped = Vec::new();

        for candidate in self.ports() {
            let matched = GUARDS
                .iter()
                .find(|(_, guard)| guard(self, &ctx, candidate))
                .map(|(reason, _)| *reason);
            if let Some(reason) = matched {
                self.count_skip(reason);
                if reason == SkipReason::SupervisionConsumed {
                    supervision_consumed = true;
                }
                trace!("Seq {} skips {}: {:?}", ctx.sequence_nr, candidate.name(), reason);
                skipped.push((candidate.id(), reason));
                continue;
            }

            let replica = if candidate.role().is_master() {
                ctx.untagged_replica()
            } else {
                ctx.tagged_replica(candidate.role(), self.settings().protocol_version)
            };
            let replica = match replica {
                Ok(replica) => replica,
                Err(e) => {
                    warn!("No replica of seq {} for {}: {}", ctx.sequence_nr, candidate.name(), e);
                    self.metrics().replicas_dropped.inc();
                    replicas_dropped += 1;
                    continue;
                }
            };

            if candidate.role().is_master() {
                delivered = dispatch::deliver_local(self, &ctx, candidate, replica).is_ok();
            } else if dispatch::transmit(self, &ctx, candidate, replica).is_ok() {
                transmitted.push(candidate.id());
            }
        }

        ForwardOutcome::Forwarded {
            transmitted,
            delivered,
            supervision_consumed,
            replicas_dropped,
            skipped,
        }
    }

    fn count_skip(&self, reason: SkipReason) {
        let metrics = self.metrics();
        match reason {
            SkipReason::Duplicate => metrics.duplicates_discarded.inc(),
            SkipReason::SupervisionConsumed => metrics.supervision_consumed.inc(),
            SkipReason::Offloaded => metrics.offload_skipped.inc(),
            _ => {}
        }
    }

    fn drop_frame(&self, port: &Port, err: Error) -> ForwardOutcome {
        port.stats().record_tx_drop();
        self.metrics().frames_dropped.inc();

        let (reason, once) = match err {
            Error::VlanUnsupported => (DropReason::VlanUnsupported, &self.diagnostics.vlan),
            Error::ProtocolViolation(_) => (
                DropReason::ProtocolViolation,
                &self.diagnostics.protocol_violation,
            ),
            Error::UnknownPeer(_) => {
                debug!("{}: dropping frame on {}: {}", self.settings().name, port.name(), err);
                return ForwardOutcome::Dropped(DropReason::UnknownPeer);
            }
            _ => (DropReason::Malformed, &self.diagnostics.malformed),
        };

        if once.should_log() {
            warn!("{}: dropping frame on {}: {}", self.settings().name, port.name(), err);
        } else {
            trace!("{}: dropping frame on {}: {}", self.settings().name, port.name(), err);
        }
        ForwardOutcome::Dropped(reason)
    }
}
