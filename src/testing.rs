//! Datagram fixtures shared by the unit tests.

use crate::common::{ICMP_HEADER_SIZE, IPV4_MIN_HEADER_SIZE};
use crate::packet::checksum;
use std::net::Ipv4Addr;

/// Wrap `payload` in a minimal IPv4 header carrying ICMP.
pub fn ipv4_datagram(ttl: u8, source: Ipv4Addr, destination: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let total_length = (IPV4_MIN_HEADER_SIZE + payload.len()) as u16;
    let mut buf = Vec::with_capacity(usize::from(total_length));
    buf.extend_from_slice(&[0x45, 0x00]);
    buf.extend_from_slice(&total_length.to_be_bytes());
    buf.extend_from_slice(&[0x12, 0x34, 0x00, 0x00, ttl, 0x01, 0x00, 0x00]);
    buf.extend_from_slice(&source.octets());
    buf.extend_from_slice(&destination.octets());
    let sum = checksum(&buf);
    buf[10..12].copy_from_slice(&sum.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Insert four bytes of NOP options after the fixed part of the IP header.
pub fn with_ip_options(datagram: &[u8]) -> Vec<u8> {
    let mut buf = datagram[..IPV4_MIN_HEADER_SIZE].to_vec();
    buf[0] = 0x46;
    let total_length = (datagram.len() + 4) as u16;
    buf[2..4].copy_from_slice(&total_length.to_be_bytes());
    buf.extend_from_slice(&[0x01; 4]);
    buf.extend_from_slice(&datagram[IPV4_MIN_HEADER_SIZE..]);
    buf
}

/// Mirror an echo request back as the peer would.
pub fn echo_reply(request: &[u8]) -> Vec<u8> {
    let mut buf = request.to_vec();
    buf[0] = 0;
    set_checksum(&mut buf);
    buf
}

/// A destination unreachable message quoting `original`.
pub fn destination_unreachable(code: u8, original: &[u8]) -> Vec<u8> {
    let mut buf = vec![3, code, 0, 0, 0, 0, 0, 0];
    buf.extend_from_slice(original);
    set_checksum(&mut buf);
    buf
}

fn set_checksum(icmp: &mut [u8]) {
    debug_assert!(icmp.len() >= ICMP_HEADER_SIZE);
    icmp[2..4].copy_from_slice(&[0, 0]);
    let sum = checksum(icmp);
    icmp[2..4].copy_from_slice(&sum.to_be_bytes());
}
