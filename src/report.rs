//! Human readable and JSON output of a ping run.

use crate::classify::QuotedRequest;
use crate::resolve::Target;
use crate::rtt::RttSample;
use crate::session::Summary;
use pnet::packet::icmp::{IcmpCode, IcmpType, IcmpTypes};
use std::io::{self, Write};
use std::net::Ipv4Addr;

/// An echo reply addressed to this session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReplyRecord {
    /// Size of the ICMP message.
    pub bytes: usize,
    pub source: Ipv4Addr,
    pub sequence: u16,
    pub ttl: u8,
    pub rtt: RttSample,
}

/// An ICMP error triggered by one of our requests.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ErrorRecord {
    /// Size of the ICMP message.
    pub bytes: usize,
    pub source: Ipv4Addr,
    pub icmp_type: IcmpType,
    pub icmp_code: IcmpCode,
    /// The quoted request, present in verbose mode.
    pub quoted: Option<QuotedRequest>,
}

/// Receives the events of a ping run.
pub trait Reporter {
    fn start(&mut self, target: &Target, body_size: usize, session_id: u16) -> io::Result<()>;
    fn reply(&mut self, record: &ReplyRecord) -> io::Result<()>;
    fn error(&mut self, record: &ErrorRecord) -> io::Result<()>;
    fn summary(&mut self, summary: &Summary) -> io::Result<()>;
}

/// Writes the classic ping output.
pub struct ConsoleReporter<W> {
    out: W,
    quiet: bool,
    verbose: bool,
    json: bool,
}

impl<W: Write> ConsoleReporter<W> {
    pub const fn new(out: W, quiet: bool, verbose: bool, json: bool) -> Self {
        Self {
            out,
            quiet,
            verbose,
            json,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_quoted(&mut self, quoted: &QuotedRequest) -> io::Result<()> {
        writeln!(self.out, "IP Hdr Dump:")?;
        for word in quoted.ip_header.chunks(2) {
            write!(self.out, " ")?;
            for byte in word {
                write!(self.out, "{byte:02x}")?;
            }
        }
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Vr HL TOS  Len   ID Flg  off TTL Pro  cks      Src\tDst\tData"
        )?;
        writeln!(
            self.out,
            " {:x}  {:x}  {:02x} {:04x} {:04x}   {:x} {:04x}  {:02x}  {:02x} {:04x} {}  {}",
            quoted.version,
            quoted.header_length,
            quoted.tos,
            quoted.total_length,
            quoted.identification,
            quoted.flags,
            quoted.fragment_offset,
            quoted.ttl,
            quoted.protocol,
            quoted.checksum,
            quoted.source,
            quoted.destination
        )?;
        let size = usize::from(quoted.total_length)
            .saturating_sub(usize::from(quoted.header_length) * 4);
        writeln!(
            self.out,
            "ICMP: type {:x}, code {:x}, size {}, id {:#06x}, seq {:#06x}",
            quoted.icmp_type, quoted.icmp_code, size, quoted.identifier, quoted.sequence
        )
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn start(&mut self, target: &Target, body_size: usize, session_id: u16) -> io::Result<()> {
        write!(
            self.out,
            "PING {} ({}): {} data bytes",
            target.host, target.presentation, body_size
        )?;
        if self.verbose {
            write!(self.out, ", id {session_id:#06x} = {session_id}")?;
        }
        writeln!(self.out)
    }

    fn reply(&mut self, record: &ReplyRecord) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(
            self.out,
            "{} bytes from {}: icmp_seq={} ttl={} time={} ms",
            record.bytes, record.source, record.sequence, record.ttl, record.rtt
        )
    }

    fn error(&mut self, record: &ErrorRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "{} bytes from {}: {}",
            record.bytes,
            record.source,
            describe_error(record.icmp_type, record.icmp_code)
        )?;
        match &record.quoted {
            Some(quoted) if self.verbose => self.write_quoted(quoted),
            _ => Ok(()),
        }
    }

    fn summary(&mut self, summary: &Summary) -> io::Result<()> {
        if self.json {
            serde_json::to_writer_pretty(&mut self.out, summary)?;
            return writeln!(self.out);
        }
        writeln!(self.out, "\n--- {} ping statistics ---", summary.host)?;
        writeln!(
            self.out,
            "{} packets transmitted, {} packets received, {}% packet loss",
            summary.sent, summary.received, summary.loss_percentage as u64
        )?;
        if let Some(stats) = &summary.stats {
            writeln!(
                self.out,
                "round-trip min/avg/max/stddev = {}/{}/{}/{} ms",
                stats.min, stats.mean, stats.max, stats.stddev
            )?;
        }
        Ok(())
    }
}

/// A description of an ICMP error type and code.
#[must_use]
pub fn describe_error(icmp_type: IcmpType, icmp_code: IcmpCode) -> String {
    let code = icmp_code.0;
    match icmp_type {
        IcmpTypes::DestinationUnreachable => match code {
            0 => "Destination Net Unreachable",
            1 => "Destination Host Unreachable",
            2 => "Destination Protocol Unreachable",
            3 => "Destination Port Unreachable",
            4 => "Frag needed",
            5 => "Source Route Failed",
            6 => "Destination Net Unknown",
            7 => "Destination Host Unknown",
            8 => "Source Host Isolated",
            9 => "Destination Net Prohibited",
            10 => "Destination Host Prohibited",
            11 => "Destination Net Unreachable for Type of Service",
            12 => "Destination Host Unreachable for Type of Service",
            13 => "Packet filtered",
            14 => "Precedence Violation",
            15 => "Precedence Cutoff",
            _ => return format!("Dest Unreachable, Bad Code: {code}"),
        }
        .to_string(),
        IcmpTypes::SourceQuench => String::from("Source Quench"),
        IcmpTypes::RedirectMessage => match code {
            0 => "Redirect Network",
            1 => "Redirect Host",
            2 => "Redirect Type of Service and Network",
            3 => "Redirect Type of Service and Host",
            _ => return format!("Redirect, Bad Code: {code}"),
        }
        .to_string(),
        IcmpTypes::TimeExceeded => match code {
            0 => String::from("Time to live exceeded"),
            1 => String::from("Frag reassembly time exceeded"),
            _ => format!("Time exceeded, Bad Code: {code}"),
        },
        IcmpTypes::ParameterProblem => String::from("Parameter problem"),
        other => format!("Bad ICMP type: {}", other.0),
    }
}
