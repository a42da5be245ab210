//! Whole-node forwarding scenarios
//!
//! Run with: cargo test --test scenarios

mod harness;

use harness::{mac, supervision, tag_of, tagged, untagged, TestNode, PAYLOAD};
use hsr_lre::dataplane::{DropReason, ForwardOutcome, FrameBuf, NodeSettings, PortRole, SkipReason};
use hsr_lre::protocol::ethernet::Frame;
use hsr_lre::protocol::{EtherType, MacAddr, ProtocolVersion};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn settings(name: &str, own: MacAddr) -> NodeSettings {
    NodeSettings::new(name, own)
}

/// Untagged broadcast on slave-a with the counter at 5
#[test]
fn test_untagged_broadcast_is_tagged_for_lane_b() {
    let own = mac(0x01);
    let t = TestNode::with_sequence(settings("hsr0", own), 5);
    let frame = untagged(mac(0x0a), MacAddr::BROADCAST);
    let original = frame.as_bytes().to_vec();

    let outcome = t.receive(PortRole::SlaveA, frame);

    assert!(outcome.delivered());
    assert_eq!(outcome.transmitted(), &[t.id(PortRole::SlaveB)]);
    assert_eq!(t.node.sequence().peek(), 6);

    let on_b = t.sent(PortRole::SlaveB);
    assert_eq!(on_b.len(), 1);
    let tag = tag_of(&on_b[0]);
    assert_eq!(tag.path, 1);
    assert_eq!(tag.sequence_nr, 5);
    assert_eq!(tag.encap_proto, EtherType::Ipv4 as u16);
    assert_eq!(on_b[0].ethertype(), Some(EtherType::Hsr as u16));

    let delivered = t.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].as_bytes(), &original[..]);
    assert!(t.sent(PortRole::SlaveA).is_empty());
}

/// Frame from master crosses to a second node over both lanes
#[test]
fn test_two_nodes_deliver_once() {
    let x = TestNode::new(settings("x", mac(0x01)));
    let y = TestNode::new(settings("y", mac(0x02)));
    let frame = untagged(mac(0x01), MacAddr::BROADCAST);
    let original = frame.as_bytes().to_vec();

    x.receive(PortRole::Master, frame);
    let lane_a = x.sent(PortRole::SlaveA);
    let lane_b = x.sent(PortRole::SlaveB);
    assert_eq!((lane_a.len(), lane_b.len()), (1, 1));
    assert_eq!(tag_of(&lane_a[0]).sequence_nr, tag_of(&lane_b[0]).sequence_nr);

    let first = y.receive(PortRole::SlaveA, lane_a[0].clone());
    let second = y.receive(PortRole::SlaveB, lane_b[0].clone());

    assert!(first.delivered());
    assert!(!second.delivered());
    assert_eq!(
        second.skip_reason(y.id(PortRole::Master)),
        Some(SkipReason::Duplicate)
    );

    let delivered = y.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].as_bytes(), &original[..]);

    // The ring continues in both directions, each copy exactly once
    let onward_b = y.sent(PortRole::SlaveB);
    let onward_a = y.sent(PortRole::SlaveA);
    assert_eq!(onward_b.len(), 1);
    assert_eq!(onward_a.len(), 1);
    assert_eq!(onward_b[0].as_bytes(), lane_a[0].as_bytes());
    assert_eq!(onward_a[0].as_bytes(), lane_b[0].as_bytes());
}

/// A frame that went round the ring comes back to its sender and stops
#[test]
fn test_frame_returning_to_sender_is_discarded() {
    let x = TestNode::new(settings("x", mac(0x01)));
    x.receive(PortRole::Master, untagged(mac(0x01), MacAddr::BROADCAST));
    let lane_a = x.sent(PortRole::SlaveA).remove(0);

    // Travelled round and arrives on the other side
    let outcome = x.receive(PortRole::SlaveB, lane_a);

    assert_eq!(
        outcome.skip_reason(x.id(PortRole::SlaveA)),
        Some(SkipReason::Duplicate)
    );
    assert!(x.sent(PortRole::SlaveA).is_empty());
}

#[test]
fn test_v0_tagging() {
    let mut s = settings("x", mac(0x01));
    s.protocol_version = ProtocolVersion::V0;
    let x = TestNode::new(s);
    let y = TestNode::new(settings("y", mac(0x02)));

    x.receive(PortRole::Master, untagged(mac(0x01), mac(0x02)));
    let lane_b = x.sent(PortRole::SlaveB).remove(0);
    assert_eq!(lane_b.ethertype(), Some(EtherType::Prp as u16));

    // Still a tagged frame on the receiving side
    let outcome = y.receive(PortRole::SlaveB, lane_b);
    assert!(outcome.delivered());
    assert_eq!(
        outcome.skip_reason(y.id(PortRole::SlaveA)),
        Some(SkipReason::ExclusiveLocal)
    );
    let delivered = y.delivered();
    let parsed = Frame::parse(delivered[0].as_bytes()).unwrap();
    assert!(!parsed.is_tagged());
    assert_eq!(parsed.payload(), &PAYLOAD);
}

#[test]
fn test_supervision_drives_address_substitution() {
    let own = mac(0x01);
    let peer_a = mac(0x0a);
    let peer_b = mac(0x0b);
    let t = TestNode::new(settings("hsr0", own));

    let outcome = t.receive(PortRole::SlaveB, supervision(peer_b, peer_a, 1));
    assert!(matches!(
        outcome,
        ForwardOutcome::Forwarded {
            supervision_consumed: true,
            delivered: false,
            ..
        }
    ));
    assert!(t.delivered().is_empty());
    assert_eq!(t.sent(PortRole::SlaveA).len(), 1);

    let info = t.table.peer(t.table.lookup(&peer_a).unwrap()).unwrap();
    assert_eq!(info.mac_b, Some(peer_b));

    // Lane B carries the peer's second address
    t.receive(PortRole::Master, untagged(own, peer_a));
    assert_eq!(t.sent(PortRole::SlaveA)[0].dst_mac(), Some(peer_a));
    assert_eq!(t.sent(PortRole::SlaveB)[0].dst_mac(), Some(peer_b));

    // Upstream only ever sees the primary address
    let outcome = t.receive(PortRole::SlaveB, tagged(peer_b, own, 50, 1));
    assert!(outcome.delivered());
    assert_eq!(t.delivered()[0].src_mac(), Some(peer_a));
}

#[test]
fn test_malformed_frame_counts_drop_only() {
    let t = TestNode::new(settings("hsr0", mac(0x01)));

    let outcome = t.receive(PortRole::SlaveA, FrameBuf::new(vec![0xff; 12]));

    assert_eq!(outcome, ForwardOutcome::Dropped(DropReason::Malformed));
    assert_eq!(t.sent_count(PortRole::SlaveB), 0);
    assert!(t.delivered().is_empty());
    let stats = t.node.metrics().interface("hsr0-a").unwrap();
    assert_eq!(stats.tx_dropped.get(), 1);
}

/// Both lanes deliver the same stream concurrently
#[test]
fn test_concurrent_lanes_deliver_each_frame_once() {
    const FRAMES: u16 = 500;
    let t = Arc::new(TestNode::new(settings("hsr0", mac(0x01))));
    let peer = mac(0x0a);

    let handles: Vec<_> = [(PortRole::SlaveA, 0u8), (PortRole::SlaveB, 1u8)]
        .into_iter()
        .map(|(role, path)| {
            let t = t.clone();
            thread::spawn(move || {
                for seq in 0..FRAMES {
                    t.receive(role, tagged(peer, MacAddr::BROADCAST, seq, path));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let delivered = t.delivered();
    assert_eq!(delivered.len(), FRAMES as usize);
    let metrics = t.node.metrics();
    assert_eq!(metrics.frames_received.get(), 2 * FRAMES as u64);
    assert_eq!(metrics.frames_delivered.get(), FRAMES as u64);
    assert_eq!(metrics.duplicates_discarded.get(), FRAMES as u64);
    // Each lane only forwards what arrived on the other one
    assert_eq!(t.sent_count(PortRole::SlaveA), FRAMES as usize);
    assert_eq!(t.sent_count(PortRole::SlaveB), FRAMES as usize);
}

/// Concurrent senders on master never share a sequence number
#[test]
fn test_concurrent_master_senders_get_unique_sequence_numbers() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;
    let own = mac(0x01);
    let t = Arc::new(TestNode::new(settings("hsr0", own)));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let t = t.clone();
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    t.receive(PortRole::Master, untagged(own, mac(0x0a)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS * PER_THREAD;
    assert_eq!(t.node.sequence().peek() as usize, total);

    // Each frame leaves on both lanes exactly once, whatever order the
    // senders reached the registry in
    let on_a = t.sent(PortRole::SlaveA);
    let on_b = t.sent(PortRole::SlaveB);
    assert_eq!(on_a.len(), total);
    assert_eq!(on_b.len(), total);
    assert_eq!(t.node.metrics().duplicates_discarded.get(), 0);

    let seqs_a: HashSet<u16> = on_a.iter().map(|f| tag_of(f).sequence_nr).collect();
    let seqs_b: HashSet<u16> = on_b.iter().map(|f| tag_of(f).sequence_nr).collect();
    assert_eq!(seqs_a.len(), total);
    assert_eq!(seqs_a, seqs_b);
}
