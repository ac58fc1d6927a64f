//! Broker client: a blocking MQTT 3.1.1 session over a byte transport.
//!
//! Packet encoding and decoding is done by `mqttrust`; this module owns the
//! socket lifecycle, the CONNECT handshake, keep-alive and inbound dispatch.

mod session;
mod state;

pub use session::{Session, PACKET_BUFFER};
pub use state::{ConnectFailure, SessionState};

use crate::Error;

/// Byte stream to the broker, typically a TCP socket.
pub trait Transport: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady {
    /// Opens a connection to `host:port`, resolving the name if needed.
    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    fn close(&mut self);

    fn is_open(&mut self) -> bool;
}

/// Receives application messages delivered during [`Client::poll`].
pub trait MessageHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

impl<F: FnMut(&str, &[u8])> MessageHandler for F {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

/// The operations the connection manager and main cycle need from a broker client.
pub trait Client {
    /// Live session check. A dropped socket is noticed here.
    fn connected(&mut self) -> bool;

    fn state(&self) -> SessionState;

    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> Result<(), ConnectFailure>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error>;

    fn subscribe(&mut self, topic_filter: &str) -> Result<(), Error>;

    /// Services keep-alive and hands every complete inbound PUBLISH to `handler`.
    fn poll<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), Error>;
}
