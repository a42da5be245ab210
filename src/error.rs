use crate::dataplane::PortRole;
use crate::protocol::MacAddr;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("VLAN tagged frames are not supported")]
    VlanUnsupported,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("failed to allocate {len} byte frame")]
    Alloc { len: usize },

    #[error("unknown peer {0}")]
    UnknownPeer(MacAddr),

    #[error("cannot build a tagged frame for {role} port")]
    NotASlave { role: PortRole },

    #[error("device {name}: {reason}")]
    Device { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
