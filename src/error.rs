use std::fmt::{Display, Formatter};
use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

/// A ping result.
pub type Result<T> = std::result::Result<T, Error>;

/// A ping error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown host: {0}")]
    UnknownHost(String),
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("echo reply too short to hold a timestamp ({0} bytes)")]
    TruncatedReply(usize),
    #[error("echo reply carries an invalid timestamp")]
    InvalidTimestamp,
    #[error("echo reply received with no outstanding request")]
    UnexpectedReply,
    #[error("output error: {0}")]
    Output(#[from] io::Error),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, Ipv4Addr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

/// Io operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IoOperation {
    NewSocket,
    SetTtl,
    RecvFrom,
    SignalHandler,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetTtl => write!(f, "set TTL"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::SignalHandler => write!(f, "register signal handler"),
        }
    }
}
