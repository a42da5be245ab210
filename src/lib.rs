//! hsr-lre - Link Redundancy Entity for HSR/PRP nodes
//!
//! A dual-homed node receives every frame twice, once per redundant lane.
//! This crate decides where each received frame goes: which redundant ports
//! get a (tagged) replica, whether the local upper layer gets a (stripped)
//! copy, and which copies are duplicates to be discarded.

pub mod capture;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod protocol;
pub mod telemetry;

pub use error::{Error, Result};
