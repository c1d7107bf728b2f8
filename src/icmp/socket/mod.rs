use crate::icmp::{IpFamily, Ttl};
use socket2::Domain;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::{io, time::Duration};

mod dgram;
mod raw;
mod sys;

use dgram::DgramSocket;
use raw::RawSocket;

/// One received datagram plus its ancillary metadata.
#[derive(Debug)]
pub(crate) struct Datagram {
    pub len: usize,
    pub source: IpAddr,
    pub ttl: Ttl,
}

/// The socket-shaped seam of the probe loop. Implementations block on
/// `recv_from` for at most the read timeout configured at open time and
/// surface the expiry as `WouldBlock`/`TimedOut`.
pub(crate) trait ProbeSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Datagram>;
    /// True when the kernel rewrites the echo identifier on the way out,
    /// making identifier-based reply filtering meaningless.
    fn rewrites_identifier(&self) -> bool;
}

/// The ICMP transport of one probe session: an unprivileged DGRAM socket
/// when the platform allows it, a raw socket otherwise.
pub(crate) enum IcmpSocket {
    Dgram(DgramSocket),
    Raw(RawSocket),
}

impl IcmpSocket {
    pub(crate) fn open(family: IpFamily, timeout: Duration) -> io::Result<IcmpSocket> {
        match DgramSocket::open(family, timeout) {
            Ok(socket) => Ok(IcmpSocket::Dgram(socket)),
            Err(dgram_err) => {
                tracing::debug!("unprivileged ICMP socket unavailable ({dgram_err}), trying raw");
                RawSocket::open(family, timeout).map(IcmpSocket::Raw)
            }
        }
    }
}

impl ProbeSocket for IcmpSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        match self {
            IcmpSocket::Dgram(socket) => socket.send_to(buf, addr),
            IcmpSocket::Raw(socket) => socket.send_to(buf, addr),
        }
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        match self {
            IcmpSocket::Dgram(socket) => socket.recv_from(buf),
            IcmpSocket::Raw(socket) => socket.recv_from(buf),
        }
    }

    fn rewrites_identifier(&self) -> bool {
        match self {
            IcmpSocket::Dgram(socket) => socket.rewrites_identifier(),
            IcmpSocket::Raw(socket) => socket.rewrites_identifier(),
        }
    }
}

fn domain(family: IpFamily) -> Domain {
    match family {
        IpFamily::V4 => Domain::IPV4,
        IpFamily::V6 => Domain::IPV6,
    }
}

/// The local wildcard address the session binds to.
fn wildcard(family: IpFamily) -> socket2::SockAddr {
    let addr = match family {
        IpFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(addr, 0).into()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use pnet_packet::icmp::echo_reply::MutableEchoReplyPacket;
    use pnet_packet::icmp::IcmpTypes;
    use pnet_packet::icmpv6::echo_reply::MutableEchoReplyPacket as MutableEchoReplyPacketV6;
    use pnet_packet::icmpv6::Icmpv6Types;
    use pnet_packet::Packet;

    /// A valid ICMPv4 echo reply for feeding into the mock.
    pub(crate) fn echo_reply_bytes_v4(identifier: u16, sequence: u16) -> Vec<u8> {
        let buf = vec![0u8; MutableEchoReplyPacket::minimum_packet_size() + 4];
        let mut packet = MutableEchoReplyPacket::owned(buf).unwrap();
        packet.set_icmp_type(IcmpTypes::EchoReply);
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_payload(&[0xFF; 4]);
        packet.packet().to_vec()
    }

    /// A valid ICMPv6 echo reply for feeding into the mock.
    pub(crate) fn echo_reply_bytes_v6(identifier: u16, sequence: u16) -> Vec<u8> {
        let buf = vec![0u8; MutableEchoReplyPacketV6::minimum_packet_size() + 4];
        let mut packet = MutableEchoReplyPacketV6::owned(buf).unwrap();
        packet.set_icmpv6_type(Icmpv6Types::EchoReply);
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_payload(&[0xFF; 4]);
        packet.packet().to_vec()
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(crate) enum OnSend {
        ReturnErr,
        ReturnDefault,
    }

    pub(crate) enum RecvAction {
        /// Hand these bytes to the caller.
        Deliver(Vec<u8>),
        /// Simulate a deadline expiry for one receive call.
        Empty,
    }

    pub(crate) struct SocketMock {
        on_send: OnSend,
        actions: Arc<Mutex<VecDeque<RecvAction>>>,
        sent: Arc<Mutex<Vec<(Vec<u8>, Option<IpAddr>)>>>,
        recv_delay: Duration,
        rewrites_identifier: bool,
        source: IpAddr,
        ttl: Ttl,
    }

    impl Clone for SocketMock {
        fn clone(&self) -> Self {
            SocketMock {
                on_send: self.on_send,
                actions: self.actions.clone(),
                sent: self.sent.clone(),
                recv_delay: self.recv_delay,
                rewrites_identifier: self.rewrites_identifier,
                source: self.source,
                ttl: self.ttl,
            }
        }
    }

    impl SocketMock {
        pub(crate) fn new(on_send: OnSend) -> Self {
            Self {
                on_send,
                actions: Arc::new(Mutex::new(VecDeque::new())),
                sent: Arc::new(Mutex::new(vec![])),
                recv_delay: Duration::ZERO,
                rewrites_identifier: false,
                source: IpAddr::V4(Ipv4Addr::LOCALHOST),
                ttl: Ttl(64),
            }
        }

        pub(crate) fn with_recv_delay(mut self, delay: Duration) -> Self {
            self.recv_delay = delay;
            self
        }

        pub(crate) fn with_rewritten_identifier(mut self) -> Self {
            self.rewrites_identifier = true;
            self
        }

        pub(crate) fn with_source(mut self, source: IpAddr) -> Self {
            self.source = source;
            self
        }

        pub(crate) fn deliver(&self, bytes: Vec<u8>) {
            self.actions.lock().unwrap().push_back(RecvAction::Deliver(bytes));
        }

        pub(crate) fn skip_one_receive(&self) {
            self.actions.lock().unwrap().push_back(RecvAction::Empty);
        }

        pub(crate) fn should_send_number_of_messages(&self, n: usize) -> &Self {
            assert!(n == self.sent.lock().unwrap().len());
            self
        }

        pub(crate) fn should_send_to_address(&self, addr: &IpAddr) -> &Self {
            assert!(self.sent.lock().unwrap().iter().any(|e| Some(*addr) == e.1));
            self
        }
    }

    impl ProbeSocket for SocketMock {
        fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
            if self.on_send == OnSend::ReturnErr {
                return Err(io::Error::new(io::ErrorKind::Other, "simulating error in mock"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((buf.to_vec(), addr.as_socket().map(|sock_addr| sock_addr.ip())));
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<Datagram> {
            if self.recv_delay > Duration::ZERO {
                std::thread::sleep(self.recv_delay);
            }
            match self.actions.lock().unwrap().pop_front() {
                None | Some(RecvAction::Empty) => Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "simulating deadline expiry in mock",
                )),
                Some(RecvAction::Deliver(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Datagram {
                        len: bytes.len(),
                        source: self.source,
                        ttl: self.ttl,
                    })
                }
            }
        }

        fn rewrites_identifier(&self) -> bool {
            self.rewrites_identifier
        }
    }
}
