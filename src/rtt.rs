use crate::common::{Timestamp, ICMP_HEADER_SIZE, MICROS_PER_SEC, TIMESTAMP_SIZE};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A measured round-trip interval, split into whole seconds and microseconds.
///
/// The microsecond part is always normalised into `0..1_000_000`; negative intervals carry
/// the sign in the seconds part.
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct RttSample {
    pub secs: i64,
    pub micros: i64,
}

impl RttSample {
    #[must_use]
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    #[must_use]
    pub const fn from_micros(total: i64) -> Self {
        Self::new(total.div_euclid(MICROS_PER_SEC), total.rem_euclid(MICROS_PER_SEC))
    }
}

impl Display for RttSample {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let total = i128::from(self.secs) * i128::from(MICROS_PER_SEC) + i128::from(self.micros);
        let sign = if total < 0 { "-" } else { "" };
        let micros = total.unsigned_abs();
        write!(f, "{sign}{}.{:03}", micros / 1000, micros % 1000)
    }
}

/// Aggregate statistics over the recorded samples.
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct Statistics {
    pub min: RttSample,
    pub max: RttSample,
    pub mean: RttSample,
    pub stddev: RttSample,
}

/// The ordered, append-only log of round-trip samples for a session.
#[derive(Debug, Default)]
pub struct RttTracker {
    samples: Vec<RttSample>,
}

impl RttTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure the round trip of an echo reply from the timestamp mirrored in its body.
    ///
    /// `echo_reply` is the ICMP message, starting at the ICMP header.
    pub fn record_reply(&mut self, echo_reply: &[u8], now: Timestamp) -> Result<RttSample> {
        if echo_reply.len() < ICMP_HEADER_SIZE + TIMESTAMP_SIZE {
            return Err(Error::TruncatedReply(echo_reply.len()));
        }
        let sent = Timestamp::read_from(&echo_reply[ICMP_HEADER_SIZE..])
            .ok_or(Error::InvalidTimestamp)?;
        let sample = now.elapsed_since(&sent);
        if sample.secs < 0 {
            tracing::warn!(?sent, ?now, "negative round trip recorded");
        }
        self.samples.push(sample);
        Ok(sample)
    }

    /// The most recently recorded sample.
    #[must_use]
    pub fn latest(&self) -> Option<RttSample> {
        self.samples.last().copied()
    }

    #[must_use]
    pub fn samples(&self) -> &[RttSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Compute min, max, mean and standard deviation in a pass over the log.
    ///
    /// The standard deviation is taken separately over the seconds and the microseconds
    /// components of each sample, each against the matching component of the mean, and is
    /// zero for fewer than two samples.
    #[must_use]
    pub fn compute_statistics(&self) -> Option<Statistics> {
        let first = *self.samples.first()?;
        let count = self.samples.len() as i128;
        let mut min = first;
        let mut max = first;
        let mut total_secs = 0_i128;
        let mut total_micros = 0_i128;
        for &sample in &self.samples {
            if sample < min {
                min = sample;
            } else if sample > max {
                max = sample;
            }
            total_secs += i128::from(sample.secs);
            total_micros += i128::from(sample.micros);
            if total_micros >= i128::from(MICROS_PER_SEC) {
                total_micros -= i128::from(MICROS_PER_SEC);
                total_secs += 1;
            }
        }
        let total = total_secs * i128::from(MICROS_PER_SEC) + total_micros;
        let mean_micros = total.div_euclid(count);
        let micros_per_sec = i128::from(MICROS_PER_SEC);
        // the mean lies between min and max so its seconds fit
        let mean = RttSample::new(
            i64::try_from(mean_micros.div_euclid(micros_per_sec)).unwrap_or(max.secs),
            mean_micros.rem_euclid(micros_per_sec) as i64,
        );
        let stddev = if count > 1 {
            let (secs_dev, micros_dev) =
                self.samples
                    .iter()
                    .fold((0_u128, 0_u128), |(secs_dev, micros_dev), sample| {
                        let secs = (i128::from(sample.secs) - i128::from(mean.secs)).unsigned_abs();
                        let micros = sample.micros.abs_diff(mean.micros);
                        (
                            secs_dev.saturating_add(secs.saturating_mul(secs)),
                            micros_dev.saturating_add(u128::from(micros) * u128::from(micros)),
                        )
                    });
            let divisor = (count - 1) as u128;
            RttSample::new(
                ((secs_dev / divisor) as f64).sqrt() as i64,
                ((micros_dev / divisor) as f64).sqrt() as i64,
            )
        } else {
            RttSample::default()
        };
        Some(Statistics {
            min,
            max,
            mean,
            stddev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::build_echo_request;
    use test_case::test_case;

    fn tracker_of(samples: &[RttSample]) -> RttTracker {
        RttTracker {
            samples: samples.to_vec(),
        }
    }

    fn millis(ms: i64) -> RttSample {
        RttSample::from_micros(ms * 1000)
    }

    #[test]
    fn test_record_reply() {
        let sent = Timestamp::new(1_700_000_000, 950_000);
        let reply = build_echo_request(0, 1, 56, sent);
        let mut tracker = RttTracker::new();
        let sample = tracker
            .record_reply(&reply, Timestamp::new(1_700_000_001, 2_500))
            .unwrap();
        assert_eq!(RttSample::new(0, 52_500), sample);
        assert_eq!(Some(sample), tracker.latest());
        assert_eq!(1, tracker.len());
    }

    #[test]
    fn test_record_reply_keeps_negative_interval() {
        let reply = build_echo_request(0, 1, 56, Timestamp::new(10, 0));
        let mut tracker = RttTracker::new();
        let sample = tracker.record_reply(&reply, Timestamp::new(9, 0)).unwrap();
        assert_eq!(RttSample::new(-1, 0), sample);
        assert_eq!(&[sample], tracker.samples());
    }

    #[test]
    fn test_record_truncated_reply() {
        let reply = build_echo_request(0, 1, 56, Timestamp::new(10, 0));
        let mut tracker = RttTracker::new();
        let err = tracker.record_reply(&reply[..20], Timestamp::new(11, 0));
        assert!(matches!(err, Err(Error::TruncatedReply(20))));
        assert!(tracker.is_empty());
        assert_eq!(None, tracker.latest());
    }

    #[test]
    fn test_record_reply_with_invalid_timestamp() {
        let mut reply = build_echo_request(0, 1, 56, Timestamp::new(10, 0));
        reply[ICMP_HEADER_SIZE + 8..ICMP_HEADER_SIZE + TIMESTAMP_SIZE]
            .copy_from_slice(&MICROS_PER_SEC.to_be_bytes());
        let mut tracker = RttTracker::new();
        let err = tracker.record_reply(&reply, Timestamp::new(11, 0));
        assert!(matches!(err, Err(Error::InvalidTimestamp)));
        assert!(tracker.is_empty());
    }

    #[test_case(i64::MIN; "minimum seconds")]
    #[test_case(-10_000_000_000_000; "far past")]
    #[test_case(10_000_000_000_000; "far future")]
    #[test_case(i64::MAX; "maximum seconds")]
    fn test_extreme_mirrored_timestamp(secs: i64) {
        let now = Timestamp::new(1_700_000_000, 0);
        let mut tracker = RttTracker::new();
        for sequence in 0..3 {
            let reply = build_echo_request(sequence, 1, 56, Timestamp::new(secs, 250_000));
            tracker.record_reply(&reply, now).unwrap();
        }
        let reply = build_echo_request(3, 1, 56, Timestamp::new(1_699_999_999, 990_000));
        tracker.record_reply(&reply, now).unwrap();
        let stats = tracker.compute_statistics().unwrap();
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert!(stats.stddev.secs >= 0);
        assert!(!stats.mean.to_string().is_empty());
    }

    #[test]
    fn test_latest_is_last_appended() {
        let mut tracker = RttTracker::new();
        for (i, secs) in [5, 3, 4].into_iter().enumerate() {
            let reply = build_echo_request(i as u16, 1, 56, Timestamp::new(0, 0));
            tracker.record_reply(&reply, Timestamp::new(secs, 0)).unwrap();
        }
        assert_eq!(Some(RttSample::new(4, 0)), tracker.latest());
        assert_eq!(
            &[RttSample::new(5, 0), RttSample::new(3, 0), RttSample::new(4, 0)],
            tracker.samples()
        );
    }

    #[test]
    fn test_empty_statistics() {
        assert_eq!(None, RttTracker::new().compute_statistics());
    }

    #[test]
    fn test_single_sample_statistics() {
        let stats = tracker_of(&[millis(17)]).compute_statistics().unwrap();
        assert_eq!(millis(17), stats.min);
        assert_eq!(millis(17), stats.max);
        assert_eq!(millis(17), stats.mean);
        assert_eq!(RttSample::default(), stats.stddev);
    }

    #[test]
    fn test_statistics() {
        let stats = tracker_of(&[millis(10), millis(12), millis(11)])
            .compute_statistics()
            .unwrap();
        assert_eq!(millis(10), stats.min);
        assert_eq!(millis(12), stats.max);
        assert_eq!(millis(11), stats.mean);
        assert_eq!(RttSample::new(0, 1000), stats.stddev);
    }

    #[test]
    fn test_stddev_is_per_component() {
        let stats = tracker_of(&[RttSample::new(1, 0), RttSample::new(3, 0)])
            .compute_statistics()
            .unwrap();
        assert_eq!(RttSample::new(2, 0), stats.mean);
        assert_eq!(RttSample::new(1, 0), stats.stddev);
    }

    #[test_case(&[millis(60), millis(60)]; "sub second totals above a tenth")]
    #[test_case(&[millis(900), millis(900)]; "sub second totals above a second")]
    #[test_case(&[RttSample::new(1, 500_000), RttSample::new(0, 600_000)]; "mixed seconds")]
    #[test_case(&[millis(3), millis(250), millis(1), millis(999), millis(40)]; "unordered")]
    #[test_case(&[RttSample::new(-1, 900_000), millis(5)]; "negative sample")]
    fn test_statistics_bounds(samples: &[RttSample]) {
        let stats = tracker_of(samples).compute_statistics().unwrap();
        for sample in samples {
            assert!(stats.min <= *sample && *sample <= stats.max);
        }
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
    }

    #[test]
    fn test_mean_across_carry() {
        let stats = tracker_of(&[millis(900), millis(900)])
            .compute_statistics()
            .unwrap();
        assert_eq!(millis(900), stats.mean);
    }

    #[test_case(RttSample::new(0, 11_000), "11.000")]
    #[test_case(RttSample::new(1, 234_567), "1234.567")]
    #[test_case(RttSample::new(0, 999), "0.999")]
    #[test_case(RttSample::new(-1, 999_500), "-0.500"; "negative below a millisecond")]
    #[test_case(RttSample::new(-2, 750_000), "-1250.000"; "negative above a second")]
    #[test_case(RttSample::new(i64::MIN, 0), "-9223372036854775808000.000"; "minimum")]
    fn test_display(sample: RttSample, expected: &str) {
        assert_eq!(expected, sample.to_string());
    }
}
