use crate::rtt::RttSample;
use serde::Serialize;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of an ICMP echo header: type, code, checksum, identifier and sequence.
pub const ICMP_HEADER_SIZE: usize = 8;

/// Size of a minimal IPv4 header (no options).
pub const IPV4_MIN_HEADER_SIZE: usize = 20;

/// Default number of data bytes following the ICMP header.
pub const DEFAULT_BODY_SIZE: usize = 56;

/// Number of body bytes occupied by the send timestamp.
pub const TIMESTAMP_SIZE: usize = 16;

/// Largest echo body that fits in a single IPv4 datagram.
pub const MAX_BODY_SIZE: usize = 65_535 - IPV4_MIN_HEADER_SIZE - ICMP_HEADER_SIZE;

/// Default IP time-to-live for outgoing requests.
pub const DEFAULT_TTL: u8 = 64;

pub const MICROS_PER_SEC: i64 = 1_000_000;

/// A wall-clock instant with microsecond resolution.
///
/// Stored in the echo body in a fixed 16 byte big-endian layout (seconds followed by
/// microseconds) so the peer mirrors it back unchanged.
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: i64,
}

impl Timestamp {
    #[must_use]
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    #[must_use]
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Times before the epoch are expressed with negative seconds.
    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self::new(since.as_secs() as i64, i64::from(since.subsec_micros())),
            Err(err) => {
                let before = err.duration();
                let total = -(before.as_micros() as i64);
                Self::new(
                    total.div_euclid(MICROS_PER_SEC),
                    total.rem_euclid(MICROS_PER_SEC),
                )
            }
        }
    }

    /// Write into the first `TIMESTAMP_SIZE` bytes of `buf`.
    ///
    /// Panics if `buf` is shorter than `TIMESTAMP_SIZE`.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.secs.to_be_bytes());
        buf[8..TIMESTAMP_SIZE].copy_from_slice(&self.micros.to_be_bytes());
    }

    /// Read a timestamp from the first `TIMESTAMP_SIZE` bytes of `buf`.
    ///
    /// `None` if `buf` is too short or the microseconds lie outside `0..MICROS_PER_SEC`.
    #[must_use]
    pub fn read_from(buf: &[u8]) -> Option<Self> {
        let secs = buf.get(..8)?.try_into().ok()?;
        let micros = i64::from_be_bytes(buf.get(8..TIMESTAMP_SIZE)?.try_into().ok()?);
        (0..MICROS_PER_SEC)
            .contains(&micros)
            .then(|| Self::new(i64::from_be_bytes(secs), micros))
    }

    /// The interval from `earlier` to `self`, borrowing a second when the microsecond
    /// difference goes negative.
    ///
    /// The result is negative when `earlier` is in the future (e.g. after a clock step).
    /// Both microsecond parts must lie in `0..MICROS_PER_SEC`; seconds saturate at the
    /// bounds of `i64`.
    #[must_use]
    pub const fn elapsed_since(&self, earlier: &Self) -> RttSample {
        let mut secs = self.secs.saturating_sub(earlier.secs);
        let mut micros = self.micros - earlier.micros;
        if micros < 0 {
            secs = secs.saturating_sub(1);
            micros += MICROS_PER_SEC;
        }
        RttSample::new(secs, micros)
    }
}

/// The echo identifier for this process.
#[must_use]
pub fn session_id() -> u16 {
    (process::id() % u32::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use test_case::test_case;

    #[test]
    fn test_timestamp_layout() {
        let mut buf = [0_u8; TIMESTAMP_SIZE];
        Timestamp::new(0x0102_0304, 999_999).write_to(&mut buf);
        assert_eq!([0, 0, 0, 0, 1, 2, 3, 4], buf[..8]);
        assert_eq!([0, 0, 0, 0, 0, 0x0f, 0x42, 0x3f], buf[8..]);
        assert_eq!(Some(Timestamp::new(0x0102_0304, 999_999)), Timestamp::read_from(&buf));
    }

    #[test]
    fn test_read_truncated_timestamp() {
        assert_eq!(None, Timestamp::read_from(&[0_u8; TIMESTAMP_SIZE - 1]));
    }

    #[test_case(-1; "negative micros")]
    #[test_case(MICROS_PER_SEC; "a whole second of micros")]
    #[test_case(i64::MAX; "max micros")]
    fn test_read_unnormalised_timestamp(micros: i64) {
        let mut buf = [0_u8; TIMESTAMP_SIZE];
        buf[8..].copy_from_slice(&micros.to_be_bytes());
        assert_eq!(None, Timestamp::read_from(&buf));
    }

    #[test]
    fn test_elapsed_saturates() {
        let now = Timestamp::new(1_700_000_000, 0);
        assert_eq!(
            RttSample::new(i64::MAX, 0),
            now.elapsed_since(&Timestamp::new(i64::MIN, 0))
        );
        assert_eq!(
            RttSample::new(i64::MIN, 500_000),
            Timestamp::new(-2, 0).elapsed_since(&Timestamp::new(i64::MAX, 500_000))
        );
    }

    #[test]
    fn test_elapsed_borrows_second() {
        let sent = Timestamp::new(100, 900_000);
        let recv = Timestamp::new(101, 100_000);
        assert_eq!(RttSample::new(0, 200_000), recv.elapsed_since(&sent));
    }

    #[test]
    fn test_elapsed_negative() {
        let sent = Timestamp::new(100, 500_000);
        let recv = Timestamp::new(100, 400_000);
        assert_eq!(RttSample::new(-1, 900_000), recv.elapsed_since(&sent));
    }

    #[test]
    fn test_from_system_time() {
        let time = UNIX_EPOCH + Duration::from_micros(1_500_250);
        assert_eq!(Timestamp::new(1, 500_250), Timestamp::from_system_time(time));
        let before = UNIX_EPOCH - Duration::from_micros(250);
        assert_eq!(Timestamp::new(-1, 999_750), Timestamp::from_system_time(before));
    }
}
