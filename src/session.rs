use crate::icmp::SequenceNumber;
use rand::Rng;

// Identifier space of the reference behavior; the echo identifier wire
// field keeps the low 16 bits.
const IDENTIFIER_SPACE: u32 = 1_000_000;

/// Mutable per-session state, owned exclusively by the probe loop.
#[derive(Debug)]
pub(crate) struct ProbeSession {
    identifier: u16,
    sequence: SequenceNumber,
    sent: u64,
    received: u64,
}

impl ProbeSession {
    pub(crate) fn new() -> ProbeSession {
        #[allow(clippy::cast_possible_truncation)]
        let identifier = rand::thread_rng().gen_range(0..IDENTIFIER_SPACE) as u16;
        ProbeSession::with_identifier(identifier)
    }

    pub(crate) fn with_identifier(identifier: u16) -> ProbeSession {
        ProbeSession {
            identifier,
            sequence: SequenceNumber::start_value(),
            sent: 0,
            received: 0,
        }
    }

    pub(crate) fn identifier(&self) -> u16 {
        self.identifier
    }

    pub(crate) fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub(crate) fn sent(&self) -> u64 {
        self.sent
    }

    pub(crate) fn received(&self) -> u64 {
        self.received
    }

    /// Records one successful transmission: the sent count and the
    /// sequence number advance together, by exactly one.
    pub(crate) fn record_sent(&mut self) {
        self.sent += 1;
        self.sequence = self.sequence.next();
    }

    pub(crate) fn record_reply(&mut self) {
        self.received += 1;
    }

    /// Percentage of transmissions without a matching reply. Zero before
    /// the first send (the guard the naive formula lacks).
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        (self.sent - self.received) as f64 / self.sent as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_advances_by_one_per_sent() {
        let mut session = ProbeSession::with_identifier(7);
        for _ in 0..5 {
            session.record_sent();
        }
        assert_eq!(SequenceNumber::from(5), session.sequence());
        assert_eq!(5, session.sent());
    }

    #[test]
    fn received_never_exceeds_sent() {
        let mut session = ProbeSession::with_identifier(7);
        session.record_sent();
        session.record_reply();
        assert!(session.received() <= session.sent());
    }

    #[test]
    fn loss_of_seven_replies_out_of_ten() {
        let mut session = ProbeSession::with_identifier(7);
        for _ in 0..10 {
            session.record_sent();
        }
        for _ in 0..7 {
            session.record_reply();
        }
        assert!((session.loss_percent() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn loss_is_zero_before_the_first_send() {
        let session = ProbeSession::with_identifier(7);
        assert!((session.loss_percent() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fresh_sessions_start_at_sequence_zero() {
        let session = ProbeSession::new();
        assert_eq!(SequenceNumber::start_value(), session.sequence());
        assert_eq!(0, session.sent());
        assert_eq!(0, session.received());
    }
}
