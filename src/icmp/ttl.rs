type TtlInnerType = u8;

/// Time-to-live (IPv4) or hop limit (IPv6) of one received datagram, taken
/// from ancillary control data or the IP header. Zero when the network
/// stack could not report it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ttl(pub TtlInnerType);

impl Ttl {
    pub(crate) const UNKNOWN: Ttl = Ttl(0);
}

impl From<TtlInnerType> for Ttl {
    fn from(integer: TtlInnerType) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for TtlInnerType {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl std::fmt::Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
