use crate::classify::{classify, icmp_message, quoted_request, ClassifiedDatagram};
use crate::common::Timestamp;
use crate::config::Config;
use crate::error::Result;
use crate::net::IcmpChannel;
use crate::packet::build_echo_request;
use crate::report::{ErrorRecord, ReplyRecord, Reporter};
use crate::resolve::Target;
use crate::session::{Session, Summary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Large enough for a full echo reply or an ICMP error quoting one.
const RECV_BUFFER_SIZE: usize = 65_536;

/// How long to sleep when no datagram is waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A source of wall-clock time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Drives a ping session: one request per interval, replies polled in between.
pub struct Pinger<C, K = SystemClock> {
    channel: C,
    clock: K,
    target: Target,
    session_id: u16,
    body_size: usize,
    count: Option<u64>,
    interval: Duration,
    verbose: bool,
    sequence: u16,
    session: Session,
    buf: Vec<u8>,
}

impl<C: IcmpChannel, K: Clock> Pinger<C, K> {
    pub fn new(channel: C, clock: K, target: Target, session_id: u16, config: &Config) -> Self {
        Self {
            channel,
            clock,
            target,
            session_id,
            body_size: config.body_size,
            count: config.count,
            interval: config.interval,
            verbose: config.verbose,
            sequence: 0,
            session: Session::new(),
            buf: vec![0; RECV_BUFFER_SIZE],
        }
    }

    /// Run until `stop` is set or `count` requests have been sent, then report the summary.
    ///
    /// After the last request a further interval is allowed for its reply.
    pub fn run<R: Reporter>(&mut self, reporter: &mut R, stop: &AtomicBool) -> Result<Summary> {
        reporter.start(&self.target, self.body_size, self.session_id)?;
        let mut ticks = 0_u64;
        while !stop.load(Ordering::Relaxed) && self.count.map_or(true, |count| ticks < count) {
            let deadline = Instant::now() + self.interval;
            self.send_request();
            ticks += 1;
            self.poll_until(deadline, reporter, stop)?;
        }
        let summary = self.session.summary(&self.target.host);
        reporter.summary(&summary)?;
        Ok(summary)
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    fn send_request(&mut self) {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let request =
            build_echo_request(sequence, self.session_id, self.body_size, self.clock.now());
        match self.channel.send_to(&request, self.target.addr) {
            Ok(bytes) => {
                tracing::debug!(sequence, bytes, addr = %self.target.addr, "echo request sent");
                self.session.request_sent();
            }
            Err(err) => tracing::warn!(sequence, %err, "failed to send echo request"),
        }
    }

    fn poll_until<R: Reporter>(
        &mut self,
        deadline: Instant,
        reporter: &mut R,
        stop: &AtomicBool,
    ) -> Result<()> {
        while !stop.load(Ordering::Relaxed) {
            match self.channel.try_recv_from(&mut self.buf) {
                Ok(Some((bytes_read, _))) => self.handle_datagram(bytes_read, reporter)?,
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    std::thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to receive");
                    let now = Instant::now();
                    if now < deadline {
                        std::thread::sleep(deadline - now);
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_datagram<R: Reporter>(&mut self, len: usize, reporter: &mut R) -> Result<()> {
        let datagram = &self.buf[..len];
        let icmp_len = icmp_message(datagram).map_or(0, <[u8]>::len);
        match classify(datagram, self.session_id) {
            ClassifiedDatagram::ReplyToUs {
                sequence,
                ttl,
                source,
            } => {
                let Some(echo_reply) = icmp_message(datagram) else {
                    return Ok(());
                };
                match self.session.reply_received(echo_reply, self.clock.now()) {
                    Ok(rtt) => reporter.reply(&ReplyRecord {
                        bytes: icmp_len,
                        source,
                        sequence,
                        ttl,
                        rtt,
                    })?,
                    Err(err) => tracing::debug!(sequence, %source, %err, "echo reply ignored"),
                }
            }
            ClassifiedDatagram::ErrorToUs {
                icmp_type,
                icmp_code,
                source,
            } => {
                let quoted = if self.verbose {
                    quoted_request(datagram)
                } else {
                    None
                };
                reporter.error(&ErrorRecord {
                    bytes: icmp_len,
                    source,
                    icmp_type,
                    icmp_code,
                    quoted,
                })?;
            }
            other => tracing::trace!(?other, len, "datagram discarded"),
        }
        Ok(())
    }
}
