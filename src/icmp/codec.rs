use crate::icmp::{IpFamily, SequenceNumber};
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket,
    echo_request::{EchoRequestPacket, MutableEchoRequestPacket},
    IcmpCode, IcmpPacket, IcmpTypes,
};
use pnet_packet::icmpv6::{
    echo_reply::EchoReplyPacket as EchoReplyPacketV6,
    echo_request::MutableEchoRequestPacket as MutableEchoRequestPacketV6,
    Icmpv6Code, Icmpv6Packet, Icmpv6Types,
};
use pnet_packet::Packet;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{error::Error, fmt};

const FILLER_SIZE: usize = 8;
// 8-byte big-endian unix timestamp followed by the session filler. The
// payload is never validated on receipt; it only makes the datagram
// non-empty.
const PAYLOAD_SIZE: usize = 8 + FILLER_SIZE;

/// Builds echo requests and parses inbound datagrams for one address
/// family, fixed at session creation.
pub(crate) struct EchoCodec {
    family: IpFamily,
    filler: [u8; FILLER_SIZE],
}

/// Outcome of decoding one inbound datagram.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Decoded {
    /// A well-formed echo reply. Identifier and sequence number are parsed
    /// from the body so the loop can reject replies of other sessions.
    Reply(EchoReply),
    /// A valid ICMP message of some other type.
    NotAReply,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct EchoReply {
    pub identifier: u16,
    pub sequence: SequenceNumber,
}

/// Inbound bytes that could not be parsed as any ICMP message.
#[derive(Debug)]
pub(crate) struct DecodeError {
    pub message: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "decode error: {}", self.message)
    }
}

impl Error for DecodeError {}

impl EchoCodec {
    pub(crate) fn new(family: IpFamily) -> EchoCodec {
        let mut filler = [0u8; FILLER_SIZE];
        rand::thread_rng().fill(&mut filler[..]);
        EchoCodec { family, filler }
    }

    /// Byte-exact echo request for this codec's family. `None` only when
    /// the packet buffer arithmetic is wrong.
    pub(crate) fn encode(&self, identifier: u16, sequence: SequenceNumber) -> Option<Vec<u8>> {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[..8].copy_from_slice(&unix_timestamp().to_be_bytes());
        payload[8..].copy_from_slice(&self.filler);
        match self.family {
            IpFamily::V4 => encode_v4(identifier, sequence, &payload),
            IpFamily::V6 => encode_v6(identifier, sequence, &payload),
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        match self.family {
            IpFamily::V4 => decode_v4(bytes),
            IpFamily::V6 => decode_v6(bytes),
        }
    }
}

fn encode_v4(identifier: u16, sequence: SequenceNumber, payload: &[u8]) -> Option<Vec<u8>> {
    let buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut packet = MutableEchoRequestPacket::owned(buf)?;
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(IcmpCode::new(0));
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence.into());
    packet.set_payload(payload);

    packet.set_checksum(0);
    let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(packet.packet())?);
    packet.set_checksum(checksum);
    Some(packet.packet().to_vec())
}

fn encode_v6(identifier: u16, sequence: SequenceNumber, payload: &[u8]) -> Option<Vec<u8>> {
    let buf = vec![0u8; MutableEchoRequestPacketV6::minimum_packet_size() + payload.len()];
    let mut packet = MutableEchoRequestPacketV6::owned(buf)?;
    packet.set_icmpv6_type(Icmpv6Types::EchoRequest);
    packet.set_icmpv6_code(Icmpv6Code::new(0));
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence.into());
    packet.set_payload(payload);
    // The ICMPv6 checksum covers a pseudo-header; the kernel fills it in
    // on ICMPv6 sockets.
    packet.set_checksum(0);
    Some(packet.packet().to_vec())
}

fn decode_v4(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let packet = IcmpPacket::new(bytes).ok_or_else(|| DecodeError {
        message: format!("{} bytes is too short for an ICMP message", bytes.len()),
    })?;
    if packet.get_icmp_type() != IcmpTypes::EchoReply {
        return Ok(Decoded::NotAReply);
    }
    let reply = EchoReplyPacket::new(bytes).ok_or_else(|| DecodeError {
        message: "malformed echo reply body".to_owned(),
    })?;
    Ok(Decoded::Reply(EchoReply {
        identifier: reply.get_identifier(),
        sequence: reply.get_sequence_number().into(),
    }))
}

fn decode_v6(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let packet = Icmpv6Packet::new(bytes).ok_or_else(|| DecodeError {
        message: format!("{} bytes is too short for an ICMPv6 message", bytes.len()),
    })?;
    if packet.get_icmpv6_type() != Icmpv6Types::EchoReply {
        return Ok(Decoded::NotAReply);
    }
    let reply = EchoReplyPacketV6::new(bytes).ok_or_else(|| DecodeError {
        message: "malformed echo reply body".to_owned(),
    })?;
    Ok(Decoded::Reply(EchoReply {
        identifier: reply.get_identifier(),
        sequence: reply.get_sequence_number().into(),
    }))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since_epoch| since_epoch.as_secs())
}
