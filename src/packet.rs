//! Construction of ICMP echo requests and the Internet checksum.

use crate::common::{Timestamp, ICMP_HEADER_SIZE, TIMESTAMP_SIZE};
use pnet::packet::icmp::echo_request::{IcmpCodes, MutableEchoRequestPacket};
use pnet::packet::icmp::IcmpTypes;

/// First padding byte following the timestamp.
const PADDING_START: u8 = 0x10;

/// Build an ICMP echo request carrying `timestamp` followed by `body_size - TIMESTAMP_SIZE`
/// bytes of padding.
///
/// The checksum is computed over the complete message after assembly.
///
/// `body_size` must be at least `TIMESTAMP_SIZE`; `Config` guarantees this.
#[must_use]
pub fn build_echo_request(
    sequence: u16,
    session_id: u16,
    body_size: usize,
    timestamp: Timestamp,
) -> Vec<u8> {
    let body_size = body_size.max(TIMESTAMP_SIZE);
    let mut buf = vec![0_u8; ICMP_HEADER_SIZE + body_size];
    {
        let body = &mut buf[ICMP_HEADER_SIZE..];
        timestamp.write_to(body);
        for (i, byte) in body[TIMESTAMP_SIZE..].iter_mut().enumerate() {
            *byte = PADDING_START.wrapping_add(i as u8);
        }
    }
    // the buffer is at least a full header so the view always exists
    if let Some(mut req) = MutableEchoRequestPacket::new(&mut buf) {
        req.set_icmp_type(IcmpTypes::EchoRequest);
        req.set_icmp_code(IcmpCodes::NoCode);
        req.set_identifier(session_id);
        req.set_sequence_number(sequence);
        req.set_checksum(0);
    }
    let sum = checksum(&buf);
    buf[2..4].copy_from_slice(&sum.to_be_bytes());
    buf
}

/// The Internet checksum (RFC 1071) of `data`.
///
/// Words are summed big-endian; an odd trailing byte is padded with a zero byte to form
/// the final word. Carries are folded back until none remain and the result is
/// complemented.
#[must_use]
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0_u64;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u64::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !(sum as u16)
}

/// Whether the checksum stored in an ICMP message is correct.
#[must_use]
pub fn verify_checksum(icmp: &[u8]) -> bool {
    icmp.len() >= ICMP_HEADER_SIZE && checksum(icmp) == 0
}
