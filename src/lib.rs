#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use icmp::{IpFamily, Ttl};
pub use probe_error::{GenericError, ProbeError};
pub use probe_output::{EventSink, ProbeEvent, ReplyLine, StatsLine};
pub use prober::{ProbeConfig, Prober, Termination};
pub use resolve::{resolve, Target};
pub use shutdown::ShutdownFlag;

mod icmp;
mod probe_error;
mod probe_output;
mod prober;
mod resolve;
mod session;
mod shutdown;
mod stats;
mod transport;
