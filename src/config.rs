use crate::common::{DEFAULT_BODY_SIZE, DEFAULT_TTL, MAX_BODY_SIZE, TIMESTAMP_SIZE};
use crate::error::Error;
use clap::Parser;
use std::time::Duration;

/// Send ICMP ECHO_REQUEST packets to network hosts.
#[derive(Parser, Debug, Clone)]
#[command(name = "pingr", version, about, long_about = None)]
pub struct Args {
    /// The host to ping
    pub host: String,

    /// Stop after sending this many requests
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Seconds to wait between requests
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// The IP time-to-live of outgoing requests
    #[arg(short, long, default_value_t = DEFAULT_TTL)]
    pub ttl: u8,

    /// The number of data bytes to send
    #[arg(short, long, default_value_t = DEFAULT_BODY_SIZE)]
    pub size: usize,

    /// Quiet output, only the start line and the summary are shown
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output, dump the quoted request of ICMP errors
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long)]
    pub log_debug: bool,
}

/// Validated run configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub host: String,
    pub count: Option<u64>,
    pub interval: Duration,
    pub ttl: u8,
    pub body_size: usize,
    pub quiet: bool,
    pub verbose: bool,
    pub json: bool,
    pub log_filter: String,
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if !args.interval.is_finite() || args.interval <= 0.0 {
            return Err(Error::BadConfig(format!(
                "interval must be a positive number of seconds, got {}",
                args.interval
            )));
        }
        if args.ttl == 0 {
            return Err(Error::BadConfig(String::from("ttl must be at least 1")));
        }
        if !(TIMESTAMP_SIZE..=MAX_BODY_SIZE).contains(&args.size) {
            return Err(Error::BadConfig(format!(
                "size must be between {TIMESTAMP_SIZE} and {MAX_BODY_SIZE}, got {}",
                args.size
            )));
        }
        if args.count == Some(0) {
            return Err(Error::BadConfig(String::from("count must be at least 1")));
        }
        let log_filter = if args.log_debug { "pingr=debug" } else { "warn" };
        Ok(Self {
            host: args.host,
            count: args.count,
            interval: Duration::from_secs_f64(args.interval),
            ttl: args.ttl,
            body_size: args.size,
            quiet: args.quiet,
            verbose: args.verbose,
            json: args.json,
            log_filter: log_filter.to_string(),
        })
    }
}
