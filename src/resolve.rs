use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr};

/// A resolved ping destination.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Target {
    /// The host as given by the user.
    pub host: String,
    pub addr: Ipv4Addr,
    /// `addr` in dotted decimal form.
    pub presentation: String,
}

impl Target {
    #[must_use]
    pub fn new(host: &str, addr: Ipv4Addr) -> Self {
        Self {
            host: host.to_string(),
            addr,
            presentation: addr.to_string(),
        }
    }
}

/// Resolve `host` to its first IPv4 address.
pub fn resolve(host: &str) -> Result<Target> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(Target::new(host, addr));
    }
    let addrs = dns_lookup::lookup_host(host).map_err(|err| {
        tracing::debug!(host, %err, "lookup failed");
        Error::UnknownHost(host.to_string())
    })?;
    first_ipv4(addrs)
        .map(|addr| Target::new(host, addr))
        .ok_or_else(|| Error::UnknownHost(host.to_string()))
}

fn first_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(addr) => Some(addr),
        IpAddr::V6(_) => None,
    })
}
