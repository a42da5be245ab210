//! Data plane components
//!
//! Handles frame processing: classification, duplicate discard, tagging and
//! forwarding to the ports of a redundancy node.

mod classifier;
pub mod codec;
mod dispatch;
mod forwarder;
mod frame;
mod node;
mod node_table;
mod port;
mod registry;

pub use classifier::{classify, is_supervision_frame, FrameContext};
pub use codec::{add_tag, strip, tag_for_port};
pub use forwarder::{DropReason, ForwardOutcome, SkipReason};
pub use frame::FrameBuf;
pub use node::{Node, NodeBuilder, NodeSettings, SequenceCounter};
pub use node_table::{seq_nr_after, NodeTable, PeerInfo, DEFAULT_MAX_PEERS};
pub use port::{Lane, Port, PortId, PortRole};
pub use registry::{AddressPolicy, DuplicateFilter, NodeRegistry, PeerId};
