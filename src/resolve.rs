use crate::icmp::IpFamily;
use crate::probe_error::ProbeError;
use std::net::IpAddr;

/// A resolved probe target. Immutable for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub addr: IpAddr,
    pub family: IpFamily,
}

/// Resolves a hostname or literal IP address into a probe target.
/// Literal addresses are taken as-is; hostnames go through the system
/// resolver and the first returned address wins.
pub fn resolve(host: &str) -> Result<Target, ProbeError> {
    let addr = match host.parse::<IpAddr>() {
        Ok(addr) => addr,
        Err(_) => lookup_first(host)?,
    };
    Ok(Target {
        addr,
        family: IpFamily::of(addr),
    })
}

fn lookup_first(host: &str) -> Result<IpAddr, ProbeError> {
    dns_lookup::lookup_host(host)
        .map_err(|e| {
            ProbeError::resolve(format!("could not resolve {host}"), Some(Box::new(e)))
        })?
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::resolve(format!("no addresses for {host}"), None))
}
