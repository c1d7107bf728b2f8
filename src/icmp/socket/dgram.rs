use super::{sys, wildcard, Datagram, ProbeSocket};
use crate::icmp::{IpFamily, Ttl};
use socket2::{Protocol, Type};
use std::{io, time::Duration};

/// Unprivileged ICMP socket (`SOCK_DGRAM` with `IPPROTO_ICMP(V6)`). The
/// kernel owns the echo identifier on this socket type and rewrites it on
/// the way out.
pub(crate) struct DgramSocket {
    socket: socket2::Socket,
}

impl DgramSocket {
    pub(crate) fn open(family: IpFamily, timeout: Duration) -> io::Result<DgramSocket> {
        tracing::trace!(?family, "opening DGRAM ICMP socket");
        let protocol = match family {
            IpFamily::V4 => Protocol::ICMPV4,
            IpFamily::V6 => Protocol::ICMPV6,
        };
        let socket = socket2::Socket::new(super::domain(family), Type::DGRAM, Some(protocol))?;
        socket.set_read_timeout(Some(timeout))?;
        socket.bind(&wildcard(family))?;
        if let Err(e) = sys::enable_ttl_reporting(&socket, family) {
            tracing::warn!("could not enable TTL reporting, TTL will read as zero: {e}");
        }
        Ok(DgramSocket { socket })
    }
}

impl ProbeSocket for DgramSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        let meta = sys::recv_with_ttl(&self.socket, buf)?;
        Ok(Datagram {
            len: meta.len,
            source: meta.source,
            ttl: meta.ttl.map_or(Ttl::UNKNOWN, Ttl),
        })
    }

    fn rewrites_identifier(&self) -> bool {
        true
    }
}
