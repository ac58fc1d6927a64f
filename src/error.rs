use thiserror::Error;

use crate::mqtt::ConnectFailure;

/// Errors surfaced by the device operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("transport I/O failed: {0:?}")]
    Transport(embedded_io::ErrorKind),

    #[error("transport is not open")]
    NotConnected,

    #[error("no data from the broker within the socket timeout")]
    Timeout,

    #[error("broker handshake failed: {0}")]
    Connect(ConnectFailure),

    #[error("MQTT packet could not be encoded or decoded")]
    Encoding,

    #[error("MQTT packet exceeds the {0} byte packet buffer")]
    PacketTooLarge(usize),

    #[error("serialized payload exceeds the {0} byte buffer")]
    PayloadOverflow(usize),

    #[error("GPIO access failed")]
    Pin,
}

impl Error {
    pub(crate) fn transport<E: embedded_io::Error>(err: E) -> Self {
        Error::Transport(err.kind())
    }
}
