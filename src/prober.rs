use crate::icmp::codec::{Decoded, EchoCodec, EchoReply};
use crate::icmp::socket::{Datagram, IcmpSocket, ProbeSocket};
use crate::icmp::SequenceNumber;
use crate::probe_error::ProbeError;
use crate::probe_output::{EventSink, ProbeEvent, ReplyLine, StatsLine};
use crate::resolve::Target;
use crate::session::ProbeSession;
use crate::shutdown::ShutdownFlag;
use crate::stats::RunningStats;
use crate::transport::TransportSession;
use std::time::{Duration, Instant};

// Deadline of a single receive call; expiry means "no reply this round",
// never a session failure.
const RECEIVE_DEADLINE: Duration = Duration::from_millis(100);
const RECV_BUFFER_SIZE: usize = 512;

/// Session-wide knobs supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    /// Stop after this many successful replies; 0 keeps probing until
    /// shutdown is requested.
    pub limit: u64,
    /// Pause between sends.
    pub interval: Duration,
    /// Per-reply RTT alert threshold in milliseconds; 0 disables alerts.
    pub rtt_threshold_ms: u64,
    /// Emit an aggregate stats line after each reply.
    pub show_stats: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            limit: 0,
            interval: Duration::from_secs(1),
            rtt_threshold_ms: 0,
            show_stats: false,
        }
    }
}

/// How a session ended. Setup failures surface as `Err` from
/// [`Prober::open`] instead; per-tick errors never terminate the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The configured reply limit was reached.
    LimitReached,
    /// Shutdown was requested by the caller.
    ShutdownRequested,
}

/// A ready-to-run probe session over the platform ICMP transport.
pub struct Prober(ProbeLoop<IcmpSocket>);

impl Prober {
    /// Opens the ICMP transport for the target's address family. Fails
    /// with a `ListenSetup` error when neither an unprivileged nor a raw
    /// socket can be opened and bound.
    pub fn open(target: Target, config: ProbeConfig) -> Result<Prober, ProbeError> {
        let socket = IcmpSocket::open(target.family, RECEIVE_DEADLINE).map_err(|e| {
            ProbeError::listen_setup(
                format!("could not open an ICMP socket for {}", target.addr),
                Some(Box::new(e)),
            )
        })?;
        tracing::debug!(
            peer = %target.addr,
            protocol = target.family.protocol_number(),
            "transport ready"
        );
        Ok(Prober(ProbeLoop::new(target, config, socket)))
    }

    /// Runs ticks until the reply limit is reached or shutdown is
    /// requested. The socket is released when `self` drops, on every exit
    /// path.
    pub fn run(&mut self, sink: &mut dyn EventSink, shutdown: &ShutdownFlag) -> Termination {
        self.0.run(sink, shutdown)
    }
}

pub(crate) struct ProbeLoop<S> {
    target: Target,
    config: ProbeConfig,
    session: ProbeSession,
    stats: RunningStats,
    codec: EchoCodec,
    transport: TransportSession<S>,
}

impl<S> ProbeLoop<S>
where
    S: ProbeSocket,
{
    pub(crate) fn new(target: Target, config: ProbeConfig, socket: S) -> ProbeLoop<S> {
        ProbeLoop {
            target,
            config,
            session: ProbeSession::new(),
            stats: RunningStats::new(),
            codec: EchoCodec::new(target.family),
            transport: TransportSession::new(socket, target.addr),
        }
    }

    #[cfg(test)]
    pub(crate) fn session_identifier(&self) -> u16 {
        self.session.identifier()
    }

    pub(crate) fn run(&mut self, sink: &mut dyn EventSink, shutdown: &ShutdownFlag) -> Termination {
        tracing::debug!(peer = %self.target.addr, "probe session running");
        loop {
            if shutdown.is_requested() {
                return Termination::ShutdownRequested;
            }
            self.tick(sink, shutdown);
            if self.config.limit > 0 && self.session.received() >= self.config.limit {
                return Termination::LimitReached;
            }
            // The interval wait doubles as the shutdown check.
            if shutdown.wait_timeout(self.config.interval) {
                return Termination::ShutdownRequested;
            }
        }
    }

    /// One send/receive/correlate exchange. Every failure in here is
    /// confined to this tick.
    fn tick(&mut self, sink: &mut dyn EventSink, shutdown: &ShutdownFlag) {
        let sequence = self.session.sequence();
        let dispatched_at = Instant::now();

        match self.codec.encode(self.session.identifier(), sequence) {
            None => tracing::error!("could not build the echo request"),
            Some(packet) => match self.transport.send(&packet, shutdown) {
                Ok(_) => self.session.record_sent(),
                Err(e) => tracing::warn!("send failed: {e}"),
            },
        }

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let datagram = match self.transport.receive(&mut buf) {
            Ok(None) => return, // no reply this round
            Err(e) => {
                tracing::debug!("receive failed: {e}");
                return;
            }
            Ok(Some(datagram)) => datagram,
        };
        let received_at = Instant::now();

        match self.codec.decode(&buf[..datagram.len]) {
            Err(e) => sink.emit(ProbeEvent::DecodeFailure { message: e.to_string() }),
            Ok(Decoded::NotAReply) => {}
            Ok(Decoded::Reply(reply)) => {
                if self.correlates(&reply, sequence) {
                    self.handle_reply(sink, &datagram, sequence, received_at - dispatched_at);
                } else {
                    tracing::trace!(
                        sequence = %reply.sequence,
                        identifier = reply.identifier,
                        "echo reply does not belong to this session"
                    );
                }
            }
        }
    }

    /// A reply belongs to this session when its sequence number matches
    /// the outstanding request and, on sockets where the kernel leaves the
    /// field alone, its identifier matches the session identifier.
    fn correlates(&self, reply: &EchoReply, outstanding: SequenceNumber) -> bool {
        if reply.sequence != outstanding {
            return false;
        }
        self.transport.rewrites_identifier() || reply.identifier == self.session.identifier()
    }

    fn handle_reply(
        &mut self,
        sink: &mut dyn EventSink,
        datagram: &Datagram,
        sequence: SequenceNumber,
        rtt: Duration,
    ) {
        self.session.record_reply();
        self.stats.update(rtt);

        sink.emit(ProbeEvent::Reply(ReplyLine {
            bytes: datagram.len,
            source: datagram.source,
            sequence: sequence.into(),
            rtt,
            ttl: datagram.ttl,
            loss_percent: self.session.loss_percent(),
        }));

        let threshold_ms = self.config.rtt_threshold_ms;
        if threshold_ms > 0 && rtt.as_millis() > u128::from(threshold_ms) {
            sink.emit(ProbeEvent::RttAlert { rtt, threshold_ms });
        }

        if self.config.show_stats {
            if let Some(avg_rtt) = self.stats.average(self.session.received()) {
                sink.emit(ProbeEvent::Stats(StatsLine {
                    sent: self.session.sent(),
                    received: self.session.received(),
                    min_rtt: self.stats.min(),
                    avg_rtt,
                    max_rtt: self.stats.max(),
                }));
            }
        }
    }
}
