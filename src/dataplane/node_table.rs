//! In-memory node table
//!
//! Minimal registry of peer nodes keyed by MAC address. For every peer and
//! port role it keeps a window of the sequence numbers recently sent out,
//! which is all the forwarding engine needs for duplicate discard.
//!
//! Entries never age. When a supervision frame reveals that two entries
//! belong to one node, both addresses resolve to the entry owning MAC A from
//! then on; the other entry stays allocated but unused.

use super::{AddressPolicy, FrameBuf, NodeRegistry, PeerId, Port, PortRole};
use crate::protocol::hsr::{self, SupervisionTag};
use crate::protocol::MacAddr;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, trace};

/// Default capacity of the table
pub const DEFAULT_MAX_PEERS: usize = 1024;

const ROLES: usize = PortRole::ALL.len();

/// Sequence numbers remembered per peer and port
const WINDOW_BITS: usize = 1024;
const WINDOW_WORDS: usize = WINDOW_BITS / 64;

/// `a` is newer than `b` in 16-bit sequence number space
pub fn seq_nr_after(a: u16, b: u16) -> bool {
    // Exactly half the space apart counts as "not after" in one direction only
    if i32::from(b) - i32::from(a) == 32768 {
        return false;
    }
    (b.wrapping_sub(a) as i16) < 0
}

/// Recently sent sequence numbers on one port.
///
/// Bit `n` is set when `head - n` has been sent. Numbers older than the
/// window count as sent.
#[derive(Debug, Clone, Default)]
struct SeqWindow {
    head: Option<u16>,
    bits: [u64; WINDOW_WORDS],
}

impl SeqWindow {
    /// Record `seq`, returning true if it was recorded before
    fn record(&mut self, seq: u16) -> bool {
        let Some(head) = self.head else {
            self.head = Some(seq);
            self.bits = [0; WINDOW_WORDS];
            self.set(0);
            return false;
        };

        if seq_nr_after(seq, head) {
            self.advance(usize::from(seq.wrapping_sub(head)));
            self.head = Some(seq);
            self.set(0);
            return false;
        }

        let age = usize::from(head.wrapping_sub(seq));
        if age >= WINDOW_BITS || self.get(age) {
            return true;
        }
        self.set(age);
        false
    }

    fn get(&self, age: usize) -> bool {
        self.bits[age / 64] & (1 << (age % 64)) != 0
    }

    fn set(&mut self, age: usize) {
        self.bits[age / 64] |= 1 << (age % 64);
    }

    /// Age every recorded number by `by`
    fn advance(&mut self, by: usize) {
        if by >= WINDOW_BITS {
            self.bits = [0; WINDOW_WORDS];
            return;
        }
        let words = by / 64;
        let shift = by % 64;
        for i in (0..WINDOW_WORDS).rev() {
            let high = i.checked_sub(words).map_or(0, |src| self.bits[src] << shift);
            let low = match i.checked_sub(words + 1) {
                Some(src) if shift != 0 => self.bits[src] >> (64 - shift),
                _ => 0,
            };
            self.bits[i] = high | low;
        }
    }
}

#[derive(Debug, Clone)]
struct PeerEntry {
    mac_a: MacAddr,
    mac_b: Option<MacAddr>,
    /// Port role on which the peer uses `mac_b`
    addr_b_port: Option<PortRole>,
    seq_out: [SeqWindow; ROLES],
    time_in: [Option<Instant>; ROLES],
    last_tlv: Option<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    by_mac: HashMap<MacAddr, PeerId>,
    peers: Vec<PeerEntry>,
}

/// Snapshot of a peer entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub mac_a: MacAddr,
    pub mac_b: Option<MacAddr>,
    /// Last supervision TLV type received from the peer
    pub last_tlv: Option<u8>,
    /// Port roles the peer has been heard on
    pub seen_on: Vec<PortRole>,
}

/// Peer registry with per-port duplicate tracking
#[derive(Debug)]
pub struct NodeTable {
    inner: Mutex<Inner>,
    max_peers: usize,
    learn_data_senders: bool,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PEERS, true)
    }
}

impl NodeTable {
    /// Create a table holding at most `max_peers` entries.
    ///
    /// With `learn_data_senders` unset, only supervision frames and frames
    /// from the local master may create entries.
    pub fn new(max_peers: usize, learn_data_senders: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_peers,
            learn_data_senders,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, mac: &MacAddr) -> Option<PeerId> {
        self.lock().by_mac.get(mac).copied()
    }

    pub fn peer(&self, id: PeerId) -> Option<PeerInfo> {
        let inner = self.lock();
        let entry = inner.peers.get(id.0 as usize)?;
        Some(PeerInfo {
            mac_a: entry.mac_a,
            mac_b: entry.mac_b,
            last_tlv: entry.last_tlv,
            seen_on: PortRole::ALL
                .into_iter()
                .filter(|role| entry.time_in[role.index()].is_some())
                .collect(),
        })
    }

    /// Newest sequence number from `peer` sent out on `role`
    pub fn last_sent(&self, peer: PeerId, role: PortRole) -> Option<u16> {
        self.lock()
            .peers
            .get(peer.0 as usize)
            .and_then(|entry| entry.seq_out[role.index()].head)
    }
}

impl NodeRegistry for NodeTable {
    fn resolve_or_register(
        &self,
        port: &Port,
        frame: &FrameBuf,
        is_supervision: bool,
    ) -> Option<PeerId> {
        let src = frame.src_mac()?;
        let mut inner = self.lock();
        if let Some(&id) = inner.by_mac.get(&src) {
            return Some(id);
        }

        if !(port.role().is_master() || is_supervision || self.learn_data_senders) {
            debug!("Unknown sender {} on {}, not learning", src, port.name());
            return None;
        }
        if inner.peers.len() >= self.max_peers {
            debug!("Node table full, cannot register {}", src);
            return None;
        }

        let id = PeerId(inner.peers.len() as u32);
        inner.peers.push(PeerEntry {
            mac_a: src,
            mac_b: None,
            addr_b_port: None,
            seq_out: Default::default(),
            time_in: [None; ROLES],
            last_tlv: None,
        });
        inner.by_mac.insert(src, id);
        debug!("Registered peer {} as {:?} via {}", src, id, port.name());
        Some(id)
    }

    fn register_incoming(&self, peer: PeerId, port: PortRole, _sequence_nr: u16) {
        if let Some(entry) = self.lock().peers.get_mut(peer.0 as usize) {
            entry.time_in[port.index()] = Some(Instant::now());
        }
    }

    fn register_outgoing(&self, port: PortRole, peer: PeerId, sequence_nr: u16) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.peers.get_mut(peer.0 as usize) else {
            return false;
        };

        entry.seq_out[port.index()].record(sequence_nr)
    }

    fn handle_supervision(&self, frame: &FrameBuf, peer: PeerId, port: PortRole) {
        let Some((tag, _)) = SupervisionTag::locate(frame.as_bytes()) else {
            return;
        };
        let announced = hsr::supervision_mac_a(frame.as_bytes());
        let src = frame.src_mac();

        let mut inner = self.lock();
        let Inner { by_mac, peers } = &mut *inner;
        if peer.0 as usize >= peers.len() {
            return;
        }

        // Sent from MAC B: both addresses resolve to the entry owning MAC A
        let target = match (announced, src) {
            (Some(mac_a), Some(src)) if mac_a != src => {
                let target = *by_mac.entry(mac_a).or_insert(peer);
                by_mac.insert(src, target);
                if target != peer {
                    debug!("Merged {} into the entry of {}", src, mac_a);
                }
                Some((target, mac_a, src))
            }
            _ => None,
        };

        if let Some(entry) = peers.get_mut(peer.0 as usize) {
            entry.last_tlv = Some(tag.tlv_type);
        }
        if let Some((target, mac_a, mac_b)) = target {
            if let Some(entry) = peers.get_mut(target.0 as usize) {
                entry.mac_a = mac_a;
                entry.mac_b = Some(mac_b);
                entry.addr_b_port = Some(port);
                entry.last_tlv = Some(tag.tlv_type);
            }
        }
        trace!(
            "Supervision TLV {} from {:?} on {}",
            tag.tlv_type,
            peer,
            port
        );
    }
}

impl AddressPolicy for NodeTable {
    fn substitute_source(&self, peer: PeerId, frame: &mut FrameBuf) {
        let mac_a = match self.lock().peers.get(peer.0 as usize) {
            Some(entry) => entry.mac_a,
            None => return,
        };
        if frame.src_mac() != Some(mac_a) {
            frame.set_src_mac(mac_a);
        }
    }

    fn substitute_destination(&self, _peer: PeerId, frame: &mut FrameBuf, port: PortRole) {
        let Some(dst) = frame.dst_mac() else {
            return;
        };
        let mac_b = {
            let inner = self.lock();
            let entry = inner
                .by_mac
                .get(&dst)
                .and_then(|id| inner.peers.get(id.0 as usize));
            match entry {
                Some(entry) if entry.addr_b_port == Some(port) => entry.mac_b,
                _ => None,
            }
        };
        if let Some(mac_b) = mac_b {
            frame.set_dst_mac(mac_b);
        }
    }
}
