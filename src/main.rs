use anyhow::Context;
use clap::Parser;
use pingr::common::session_id;
use pingr::config::{Args, Config};
use pingr::error::{IoError, IoOperation};
use pingr::net::RawSocket;
use pingr::ping::{Pinger, SystemClock};
use pingr::report::ConsoleReporter;
use pingr::resolve::resolve;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let cfg = Config::try_from(Args::parse())?;
    configure_logging(&cfg);
    let target = resolve(&cfg.host)?;
    let socket = RawSocket::open(cfg.ttl).context("raw ICMP sockets require root or CAP_NET_RAW")?;
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&stop))
            .map_err(|err| IoError::Other(err, IoOperation::SignalHandler))?;
    }
    let mut reporter = ConsoleReporter::new(io::stdout().lock(), cfg.quiet, cfg.verbose, cfg.json);
    let mut pinger = Pinger::new(socket, SystemClock, target, session_id(), &cfg);
    let summary = pinger.run(&mut reporter, &stop)?;
    Ok(if summary.received > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn configure_logging(cfg: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();
}
