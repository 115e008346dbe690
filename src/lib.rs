//! An ICMP echo (ping) engine for IPv4.
//!
//! Echo requests are built by [`packet`], datagrams read from the shared raw socket are
//! sorted by [`classify`], and round trips and loss are tracked per run by [`session`].

pub mod classify;
pub mod common;
pub mod config;
pub mod error;
pub mod net;
pub mod packet;
pub mod ping;
pub mod report;
pub mod resolve;
pub mod rtt;
pub mod session;

#[cfg(test)]
mod testing;
