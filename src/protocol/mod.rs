//! Link-layer protocol definitions
//!
//! Ethernet framing plus the HSR/PRP redundancy tag and supervision layout.

pub mod ethernet;
pub mod hsr;
pub mod types;

pub use hsr::{HsrTag, ProtocolVersion, SupervisionTag};
pub use types::*;
