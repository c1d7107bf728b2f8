use crate::icmp::socket::{Datagram, ProbeSocket};
use crate::probe_error::ProbeError;
use crate::shutdown::ShutdownFlag;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const SEND_ATTEMPTS: u32 = 3;
const SEND_BACKOFF: Duration = Duration::from_secs(1);

/// Owns the socket and the destination of one probe session for the
/// session's whole lifetime. The socket is released when the session
/// drops, on every exit path.
pub(crate) struct TransportSession<S> {
    socket: S,
    destination: socket2::SockAddr,
    send_attempts: u32,
    send_backoff: Duration,
}

impl<S> TransportSession<S>
where
    S: ProbeSocket,
{
    pub(crate) fn new(socket: S, addr: IpAddr) -> TransportSession<S> {
        TransportSession {
            socket,
            destination: SocketAddr::new(addr, 0).into(),
            send_attempts: SEND_ATTEMPTS,
            send_backoff: SEND_BACKOFF,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry(
        socket: S,
        addr: IpAddr,
        send_attempts: u32,
        send_backoff: Duration,
    ) -> TransportSession<S> {
        TransportSession {
            socket,
            destination: SocketAddr::new(addr, 0).into(),
            send_attempts,
            send_backoff,
        }
    }

    /// Transmits one datagram, retrying a failed attempt after a fixed
    /// backoff. Gives up after the configured attempts; a shutdown request
    /// cancels the backoff wait.
    pub(crate) fn send(&self, packet: &[u8], shutdown: &ShutdownFlag) -> Result<usize, ProbeError> {
        let mut last_error = None;
        for attempt in 1..=self.send_attempts {
            match self.socket.send_to(packet, &self.destination) {
                Ok(n) => return Ok(n),
                Err(e) => {
                    tracing::warn!(attempt, "send attempt failed: {e}");
                    last_error = Some(e);
                }
            }
            if attempt == self.send_attempts {
                break;
            }
            if shutdown.wait_timeout(self.send_backoff) {
                return Err(ProbeError::send(
                    "cancelled by shutdown while retrying",
                    last_error.map(|e| Box::new(e) as crate::GenericError),
                ));
            }
        }
        Err(ProbeError::send(
            format!("giving up after {} attempts", self.send_attempts),
            last_error.map(|e| Box::new(e) as crate::GenericError),
        ))
    }

    /// Blocks until a datagram arrives or the socket's read deadline
    /// expires. Expiry is `Ok(None)`: no reply this round.
    pub(crate) fn receive(&self, buf: &mut [u8]) -> io::Result<Option<Datagram>> {
        match self.socket.recv_from(buf) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn rewrites_identifier(&self) -> bool {
        self.socket.rewrites_identifier()
    }
}
