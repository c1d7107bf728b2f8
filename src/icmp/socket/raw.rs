use super::{sys, wildcard, Datagram, ProbeSocket};
use crate::icmp::{IpFamily, Ttl};
use pnet_packet::ipv4::Ipv4Packet;
use socket2::{Protocol, Type};
use std::{io, time::Duration};

/// Privileged raw ICMP socket. On IPv4 the kernel hands over the whole IP
/// packet, so the TTL comes from the header and the ICMP content has to be
/// carved out; ICMPv6 raw sockets deliver the bare ICMPv6 message.
pub(crate) struct RawSocket {
    socket: socket2::Socket,
    family: IpFamily,
}

impl RawSocket {
    pub(crate) fn open(family: IpFamily, timeout: Duration) -> io::Result<RawSocket> {
        tracing::trace!(?family, "opening RAW ICMP socket");
        let protocol = match family {
            IpFamily::V4 => Protocol::ICMPV4,
            IpFamily::V6 => Protocol::ICMPV6,
        };
        let socket = socket2::Socket::new(super::domain(family), Type::RAW, Some(protocol))?;
        socket.set_read_timeout(Some(timeout))?;
        socket.bind(&wildcard(family))?;
        if family == IpFamily::V6 {
            if let Err(e) = sys::enable_ttl_reporting(&socket, family) {
                tracing::warn!("could not enable hop-limit reporting: {e}");
            }
        }
        Ok(RawSocket { socket, family })
    }
}

impl ProbeSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        let meta = sys::recv_with_ttl(&self.socket, buf)?;
        match self.family {
            IpFamily::V4 => {
                let (ttl, header_len) = {
                    let packet = Ipv4Packet::new(&buf[..meta.len]).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidData, "short IPv4 datagram")
                    })?;
                    (packet.get_ttl(), usize::from(packet.get_header_length()) * 4)
                };
                if header_len > meta.len {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "IPv4 header length exceeds the datagram",
                    ));
                }
                // Hand the caller only the ICMP content.
                buf.copy_within(header_len..meta.len, 0);
                Ok(Datagram {
                    len: meta.len - header_len,
                    source: meta.source,
                    ttl: Ttl(ttl),
                })
            }
            IpFamily::V6 => Ok(Datagram {
                len: meta.len,
                source: meta.source,
                ttl: meta.ttl.map_or(Ttl::UNKNOWN, Ttl),
            }),
        }
    }

    fn rewrites_identifier(&self) -> bool {
        false
    }
}
