use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportErrorKind {
    InvalidUrl,
    Connect,
    TunnelRejected,
    Protocol,
    Timeout,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The proxy itself could not be reached.
    #[error("proxy connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The proxy answered the CONNECT with something other than 200.
    /// The display form doubles as the outcome's error label.
    #[error("connect_status={0}")]
    TunnelRejected(u16),

    /// Malformed status line or header block, or the peer closed mid-header.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::InvalidUrl(_) => TransportErrorKind::InvalidUrl,
            Self::Connect(_) => TransportErrorKind::Connect,
            Self::TunnelRejected(_) => TransportErrorKind::TunnelRejected,
            Self::Protocol(_) => TransportErrorKind::Protocol,
            Self::Timeout(_) => TransportErrorKind::Timeout,
            Self::Io(_) => TransportErrorKind::Io,
        }
    }
}
