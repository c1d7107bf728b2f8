pub(crate) mod codec;
pub(crate) mod socket;
mod sequence_number;
mod ttl;

pub(crate) use sequence_number::SequenceNumber;
pub use ttl::Ttl;

use std::net::IpAddr;

/// Address family of a probe session. Chosen once when the target is
/// resolved; everything downstream branches on this closed variant instead
/// of re-inspecting addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    #[must_use]
    pub fn of(addr: IpAddr) -> IpFamily {
        match addr {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }

    /// IANA protocol number of the family's ICMP flavor (1 = ICMP, 58 = ICMPv6).
    #[must_use]
    pub fn protocol_number(self) -> u8 {
        match self {
            IpFamily::V4 => 1,
            IpFamily::V6 => 58,
        }
    }
}
