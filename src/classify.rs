//! Demultiplexing of datagrams received on the shared raw ICMP socket.
//!
//! Every ICMP message delivered to the host reaches the raw socket, including the echo
//! requests we send when pinging a local address, the replies destined to other ping
//! processes and errors triggered by other traffic. Echo messages carry the session
//! identifier in their own header; error messages quote the IP header and the first bytes
//! of the datagram which triggered them, so the identifier must be read from the quoted
//! ICMP header instead.

use crate::common::{ICMP_HEADER_SIZE, IPV4_MIN_HEADER_SIZE};
use crate::packet::verify_checksum;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::EchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use std::net::Ipv4Addr;

/// The outcome of classifying a received datagram.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClassifiedDatagram {
    /// One of our own echo requests looped back to us.
    OwnRequest,
    /// An echo reply for this session.
    ReplyToUs {
        sequence: u16,
        ttl: u8,
        source: Ipv4Addr,
    },
    /// An echo reply for some other session.
    ReplyForeign,
    /// An ICMP error triggered by one of our requests.
    ErrorToUs {
        icmp_type: IcmpType,
        icmp_code: IcmpCode,
        source: Ipv4Addr,
    },
    /// An ICMP error triggered by some other traffic.
    ErrorForeign,
    /// Too short to hold the headers needed for classification, or an echo reply for this
    /// session whose checksum does not verify.
    Malformed,
}

/// Classify a raw IPv4 datagram, starting at the IP header.
#[must_use]
pub fn classify(datagram: &[u8], session_id: u16) -> ClassifiedDatagram {
    let (Some(ip), Some(icmp)) = (Ipv4Packet::new(datagram), icmp_message(datagram)) else {
        return ClassifiedDatagram::Malformed;
    };
    let Some(header) = IcmpPacket::new(icmp) else {
        return ClassifiedDatagram::Malformed;
    };
    match header.get_icmp_type() {
        IcmpTypes::EchoRequest => ClassifiedDatagram::OwnRequest,
        IcmpTypes::EchoReply => match EchoReplyPacket::new(icmp) {
            Some(reply) if reply.get_identifier() == session_id => {
                if !verify_checksum(icmp) {
                    let sequence = reply.get_sequence_number();
                    tracing::trace!(sequence, "bad echo reply checksum");
                    return ClassifiedDatagram::Malformed;
                }
                ClassifiedDatagram::ReplyToUs {
                    sequence: reply.get_sequence_number(),
                    ttl: ip.get_ttl(),
                    source: ip.get_source(),
                }
            }
            Some(_) => ClassifiedDatagram::ReplyForeign,
            None => ClassifiedDatagram::Malformed,
        },
        icmp_type => match quoted_echo(icmp) {
            Some(quoted)
                if quoted.get_identifier() == session_id && quotes_echo_request(icmp, &quoted) =>
            {
                ClassifiedDatagram::ErrorToUs {
                    icmp_type,
                    icmp_code: header.get_icmp_code(),
                    source: ip.get_source(),
                }
            }
            Some(_) => ClassifiedDatagram::ErrorForeign,
            None => ClassifiedDatagram::Malformed,
        },
    }
}

/// The ICMP message of a datagram, skipping the IP header (including any options).
#[must_use]
pub fn icmp_message(datagram: &[u8]) -> Option<&[u8]> {
    let header_len = ipv4_header_len(datagram)?;
    datagram.get(header_len..)
}

/// The original request quoted in the body of an ICMP error message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QuotedRequest {
    /// The raw bytes of the quoted IP header.
    pub ip_header: Vec<u8>,
    pub version: u8,
    pub header_length: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub identifier: u16,
    pub sequence: u16,
}

/// Extract the quoted IP and ICMP echo headers from an ICMP error datagram.
#[must_use]
pub fn quoted_request(datagram: &[u8]) -> Option<QuotedRequest> {
    let icmp = icmp_message(datagram)?;
    let quoted = icmp.get(ICMP_HEADER_SIZE..)?;
    let header_len = ipv4_header_len(quoted)?;
    let ip = Ipv4Packet::new(quoted)?;
    let echo = quoted_echo(icmp)?;
    Some(QuotedRequest {
        ip_header: quoted[..header_len].to_vec(),
        version: ip.get_version(),
        header_length: ip.get_header_length(),
        tos: (ip.get_dscp() << 2) | ip.get_ecn(),
        total_length: ip.get_total_length(),
        identification: ip.get_identification(),
        flags: ip.get_flags(),
        fragment_offset: ip.get_fragment_offset(),
        ttl: ip.get_ttl(),
        protocol: ip.get_next_level_protocol().0,
        checksum: ip.get_checksum(),
        source: ip.get_source(),
        destination: ip.get_destination(),
        icmp_type: echo.get_icmp_type().0,
        icmp_code: echo.get_icmp_code().0,
        identifier: echo.get_identifier(),
        sequence: echo.get_sequence_number(),
    })
}

/// The echo header quoted after the outer ICMP header and the quoted IP header.
fn quoted_echo(icmp: &[u8]) -> Option<EchoRequestPacket<'_>> {
    icmp_message(icmp.get(ICMP_HEADER_SIZE..)?).and_then(EchoRequestPacket::new)
}

/// Whether the quoted datagram is an ICMP echo request rather than other traffic that
/// happens to carry our identifier at the same offset.
fn quotes_echo_request(icmp: &[u8], quoted: &EchoRequestPacket<'_>) -> bool {
    let protocol = icmp
        .get(ICMP_HEADER_SIZE..)
        .and_then(Ipv4Packet::new)
        .map(|ip| ip.get_next_level_protocol());
    protocol == Some(IpNextHeaderProtocols::Icmp) && quoted.get_icmp_type() == IcmpTypes::EchoRequest
}

fn ipv4_header_len(datagram: &[u8]) -> Option<usize> {
    let ip = Ipv4Packet::new(datagram)?;
    let header_len = usize::from(ip.get_header_length()) * 4;
    (IPV4_MIN_HEADER_SIZE..=datagram.len())
        .contains(&header_len)
        .then_some(header_len)
}
