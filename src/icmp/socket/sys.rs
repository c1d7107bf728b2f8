//! recvmsg-based receive path. The TTL (IPv4) and hop limit (IPv6) of a
//! datagram only reach userspace as ancillary control data, which the
//! std/socket2 receive calls discard.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::unix::prelude::AsRawFd;

use crate::icmp::IpFamily;

// IP_RECVTTL and IPV6_RECVHOPLIMIT differ per platform.
#[cfg(target_os = "linux")]
const IP_RECVTTL: libc::c_int = 12;
#[cfg(target_os = "macos")]
const IP_RECVTTL: libc::c_int = 24;
#[cfg(target_os = "linux")]
const IPV6_RECVHOPLIMIT: libc::c_int = 51;
#[cfg(target_os = "macos")]
const IPV6_RECVHOPLIMIT: libc::c_int = 37;

/// One received datagram plus the metadata carried in control messages.
pub(super) struct RecvMeta {
    pub len: usize,
    pub source: IpAddr,
    pub ttl: Option<u8>,
}

/// Asks the kernel to deliver per-packet TTL/hop-limit control messages.
/// Callers treat failure as "TTL reports as zero", not as a setup error.
pub(super) fn enable_ttl_reporting(socket: &socket2::Socket, family: IpFamily) -> io::Result<()> {
    let (level, option) = match family {
        IpFamily::V4 => (libc::IPPROTO_IP, IP_RECVTTL),
        IpFamily::V6 => (libc::IPPROTO_IPV6, IPV6_RECVHOPLIMIT),
    };
    let on: libc::c_int = 1;
    // Safety: the fd is owned by `socket` and `on` outlives the call.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            option,
            std::ptr::addr_of!(on).cast(),
            std::mem::size_of_val(&on) as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Receives one datagram, returning its source address and, when the
/// kernel delivered one, the TTL/hop-limit control message.
pub(super) fn recv_with_ttl(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<RecvMeta> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };
    let mut control = [0u8; 64];
    let mut source: libc::sockaddr_storage = unsafe { std::mem::zeroed() };

    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_name = std::ptr::addr_of_mut!(source).cast();
    msg.msg_namelen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr().cast();
    msg.msg_controllen = control.len() as _;

    // Safety: all msghdr pointers refer to locals that outlive the call.
    let len = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
    if len < 0 {
        return Err(io::Error::last_os_error());
    }

    #[allow(clippy::cast_sign_loss)]
    let len = len as usize;
    Ok(RecvMeta {
        len,
        source: source_address(&source)?,
        ttl: ttl_from_control(&msg),
    })
}

fn source_address(storage: &libc::sockaddr_storage) -> io::Result<IpAddr> {
    match libc::c_int::from(storage.ss_family) {
        libc::AF_INET => {
            // Safety: ss_family says this is a sockaddr_in.
            let addr: &libc::sockaddr_in = unsafe { &*std::ptr::from_ref(storage).cast() };
            Ok(IpAddr::V4(Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            // Safety: ss_family says this is a sockaddr_in6.
            let addr: &libc::sockaddr_in6 = unsafe { &*std::ptr::from_ref(storage).cast() };
            Ok(IpAddr::V6(Ipv6Addr::from(addr.sin6_addr.s6_addr)))
        }
        family => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected source address family {family}"),
        )),
    }
}

#[cfg(target_os = "linux")]
fn is_ttl_control(cmsg_type: libc::c_int) -> bool {
    cmsg_type == libc::IP_TTL
}
#[cfg(target_os = "macos")]
fn is_ttl_control(cmsg_type: libc::c_int) -> bool {
    // macOS delivers either IP_TTL or IP_RECVTTL depending on version.
    cmsg_type == 4 || cmsg_type == IP_RECVTTL
}

fn ttl_from_control(msg: &libc::msghdr) -> Option<u8> {
    // Safety: CMSG_* walk the control buffer set up in recv_with_ttl.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(msg);
        while !cmsg.is_null() {
            let header = &*cmsg;
            let is_v4_ttl =
                header.cmsg_level == libc::IPPROTO_IP && is_ttl_control(header.cmsg_type);
            let is_v6_hop_limit = header.cmsg_level == libc::IPPROTO_IPV6
                && header.cmsg_type == libc::IPV6_HOPLIMIT;
            if is_v4_ttl || is_v6_hop_limit {
                let value = *libc::CMSG_DATA(cmsg).cast::<libc::c_int>();
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                return Some(value as u8);
            }
            cmsg = libc::CMSG_NXTHDR(msg, cmsg);
        }
    }
    None
}
