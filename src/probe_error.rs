use std::{error::Error, fmt};

pub type GenericError = Box<dyn Error + Send + Sync + 'static>;

/// Failures of a probe session. Only `Resolve` and `ListenSetup` end the
/// session; `Send` is confined to the tick it happened in.
#[derive(Debug)]
pub enum ProbeError {
    /// The target could not be resolved to an IP address.
    Resolve {
        message: String,
        source: Option<GenericError>,
    },
    /// The ICMP transport could not be opened or bound.
    ListenSetup {
        message: String,
        source: Option<GenericError>,
    },
    /// A transmission kept failing through the bounded retries, or was
    /// cancelled by shutdown while backing off.
    Send {
        message: String,
        source: Option<GenericError>,
    },
}

impl ProbeError {
    pub(crate) fn resolve(message: impl Into<String>, source: Option<GenericError>) -> ProbeError {
        ProbeError::Resolve { message: message.into(), source }
    }

    pub(crate) fn listen_setup(
        message: impl Into<String>,
        source: Option<GenericError>,
    ) -> ProbeError {
        ProbeError::ListenSetup { message: message.into(), source }
    }

    pub(crate) fn send(message: impl Into<String>, source: Option<GenericError>) -> ProbeError {
        ProbeError::Send { message: message.into(), source }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ProbeError::Resolve { message, .. } => write!(f, "resolve error: {message}"),
            ProbeError::ListenSetup { message, .. } => write!(f, "listen setup error: {message}"),
            ProbeError::Send { message, .. } => write!(f, "send error: {message}"),
        }
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProbeError::Resolve { source, .. }
            | ProbeError::ListenSetup { source, .. }
            | ProbeError::Send { source, .. } => {
                source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
            }
        }
    }
}
