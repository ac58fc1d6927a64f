use embedded_io::Write;
use log::{debug, warn};
use mqttrust::encoding::v4::{
    decode_slice, encode_slice, Connect, Packet, Protocol, Publish, QoS, Subscribe, SubscribeTopic,
};

use super::{Client, ConnectFailure, MessageHandler, SessionState, Transport};
use crate::config::{KEEP_ALIVE_S, SOCKET_TIMEOUT_MS};
use crate::{Clock, Error};

/// Largest MQTT packet sent or accepted, fixed header included.
pub const PACKET_BUFFER: usize = 512;

// Fixed header: one type byte plus up to four remaining-length bytes.
const MAX_FIXED_HEADER: usize = 5;

enum Inbound {
    Idle,
    Dropped,
    Frame(usize),
}

pub struct Session<'a, T, C> {
    transport: T,
    clock: C,
    host: &'a str,
    port: u16,
    state: SessionState,
    keep_alive_ms: u64,
    socket_timeout_ms: u64,
    last_outbound_ms: u64,
    last_inbound_ms: u64,
    ping_outstanding: bool,
    tx: [u8; PACKET_BUFFER],
    rx: [u8; PACKET_BUFFER],
}

impl<'a, T, C> Session<'a, T, C>
where
    T: Transport,
    C: Clock,
{
    pub fn new(transport: T, clock: C, host: &'a str, port: u16) -> Self {
        Session {
            transport,
            clock,
            host,
            port,
            state: SessionState::Disconnected,
            keep_alive_ms: u64::from(KEEP_ALIVE_S) * 1_000,
            socket_timeout_ms: SOCKET_TIMEOUT_MS,
            last_outbound_ms: 0,
            last_inbound_ms: 0,
            ping_outstanding: false,
            tx: [0; PACKET_BUFFER],
            rx: [0; PACKET_BUFFER],
        }
    }

    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive_ms = u64::from(seconds) * 1_000;
        self
    }

    pub fn with_socket_timeout(mut self, millis: u64) -> Self {
        self.socket_timeout_ms = millis;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn disconnect(&mut self) {
        if self.transport.is_open() {
            if let Err(e) = self.send(&Packet::Disconnect) {
                debug!("DISCONNECT not sent: {}", e);
            }
            self.transport.close();
        }
        self.state = SessionState::Disconnected;
    }

    fn fail(&mut self, failure: ConnectFailure) -> ConnectFailure {
        self.transport.close();
        self.state = failure.state();
        failure
    }

    fn send(&mut self, packet: &Packet<'_>) -> Result<(), Error> {
        let len = encode_slice(packet, &mut self.tx).map_err(|_| Error::Encoding)?;
        self.transport
            .write_all(&self.tx[..len])
            .map_err(Error::transport)?;
        self.transport.flush().map_err(Error::transport)?;
        self.last_outbound_ms = self.clock.now_ms();
        Ok(())
    }

    // Fills `rx[range]`, giving up once the socket timeout passes without the bytes arriving.
    fn read_exact(&mut self, range: core::ops::Range<usize>) -> Result<(), Error> {
        let started = self.clock.now_ms();
        let mut pos = range.start;
        while pos < range.end {
            if !self.transport.read_ready().map_err(Error::transport)? {
                if !self.transport.is_open() {
                    return Err(Error::NotConnected);
                }
                if self.clock.now_ms().saturating_sub(started) >= self.socket_timeout_ms {
                    return Err(Error::Timeout);
                }
                continue;
            }
            match self.transport.read(&mut self.rx[pos..range.end]) {
                Ok(0) => return Err(Error::NotConnected),
                Ok(n) => pos += n,
                Err(e) => return Err(Error::transport(e)),
            }
        }
        Ok(())
    }

    // Reads one whole packet into `rx` if the transport has data waiting.
    fn read_packet(&mut self) -> Result<Inbound, Error> {
        if !self.transport.read_ready().map_err(Error::transport)? {
            return Ok(Inbound::Idle);
        }

        self.read_exact(0..1)?;
        let mut remaining = 0usize;
        let mut header_len = 1;
        loop {
            if header_len == MAX_FIXED_HEADER {
                return Err(Error::Encoding);
            }
            self.read_exact(header_len..header_len + 1)?;
            let byte = self.rx[header_len];
            remaining |= usize::from(byte & 0x7f) << (7 * (header_len - 1));
            header_len += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }

        let total = header_len + remaining;
        if total > PACKET_BUFFER {
            let mut left = remaining;
            while left > 0 {
                let chunk = left.min(PACKET_BUFFER);
                self.read_exact(0..chunk)?;
                left -= chunk;
            }
            warn!("dropped {} byte inbound packet", total);
            return Ok(Inbound::Dropped);
        }

        self.read_exact(header_len..total)?;
        self.last_inbound_ms = self.clock.now_ms();
        Ok(Inbound::Frame(total))
    }

    fn dispatch<H: MessageHandler>(&mut self, len: usize, handler: &mut H) -> Result<(), Error> {
        let mut answer_ping = false;
        match decode_slice(&self.rx[..len]) {
            Ok(Some(Packet::Publish(publish))) => handler.on_message(publish.topic_name, publish.payload),
            Ok(Some(Packet::Pingresp)) => self.ping_outstanding = false,
            Ok(Some(Packet::Pingreq)) => answer_ping = true,
            Ok(Some(_)) => debug!("ignoring inbound packet"),
            Ok(None) => {}
            Err(_) => return Err(Error::Encoding),
        }

        if answer_ping {
            self.send(&Packet::Pingresp)?;
        }
        Ok(())
    }

    fn await_connack(&mut self) -> Result<(), ConnectFailure> {
        let started = self.clock.now_ms();
        loop {
            match self.read_packet() {
                Ok(Inbound::Frame(len)) => {
                    let code = match decode_slice(&self.rx[..len]) {
                        Ok(Some(Packet::Connack(connack))) => connack.code,
                        _ => {
                            debug!("expected CONNACK");
                            continue;
                        }
                    };
                    return match ConnectFailure::from_return_code(code) {
                        None => Ok(()),
                        Some(refused) => Err(self.fail(refused)),
                    };
                }
                Ok(Inbound::Idle) | Ok(Inbound::Dropped) => {
                    if self.clock.now_ms().saturating_sub(started) >= self.socket_timeout_ms {
                        return Err(self.fail(ConnectFailure::Timeout));
                    }
                }
                Err(Error::Timeout) => return Err(self.fail(ConnectFailure::Timeout)),
                Err(e) => {
                    debug!("reading CONNACK failed: {}", e);
                    return Err(self.fail(ConnectFailure::ConnectionLost));
                }
            }
        }
    }

    fn keep_alive(&mut self) -> Result<(), Error> {
        let now = self.clock.now_ms();
        let idle_out = now.saturating_sub(self.last_outbound_ms);
        let idle_in = now.saturating_sub(self.last_inbound_ms);
        if idle_out < self.keep_alive_ms && idle_in < self.keep_alive_ms {
            return Ok(());
        }

        if self.ping_outstanding {
            warn!("broker did not answer PINGREQ");
            self.fail(ConnectFailure::Timeout);
            return Err(Error::NotConnected);
        }

        self.send(&Packet::Pingreq)?;
        self.last_inbound_ms = now;
        self.ping_outstanding = true;
        Ok(())
    }
}

impl<'a, T, C> Client for Session<'a, T, C>
where
    T: Transport,
    C: Clock,
{
    fn connected(&mut self) -> bool {
        if self.state == SessionState::Connected && !self.transport.is_open() {
            self.state = SessionState::ConnectionLost;
        }
        self.state == SessionState::Connected
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> Result<(), ConnectFailure> {
        if self.connected() {
            return Ok(());
        }

        if let Err(e) = self.transport.open(self.host, self.port) {
            debug!("TCP connect to {}:{} failed: {:?}", self.host, self.port, embedded_io::Error::kind(&e));
            return Err(self.fail(ConnectFailure::ConnectFailed));
        }

        let connect = Packet::Connect(Connect {
            protocol: Protocol::MQTT311,
            keep_alive: (self.keep_alive_ms / 1_000) as u16,
            client_id,
            clean_session: true,
            last_will: None,
            username: Some(username),
            password: Some(password.as_bytes()),
        });
        if let Err(e) = self.send(&connect) {
            debug!("CONNECT not sent: {}", e);
            return Err(self.fail(ConnectFailure::ConnectFailed));
        }

        self.await_connack()?;

        let now = self.clock.now_ms();
        self.last_inbound_ms = now;
        self.last_outbound_ms = now;
        self.ping_outstanding = false;
        self.state = SessionState::Connected;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        if !self.connected() {
            return Err(Error::NotConnected);
        }
        // Topic length prefix plus the fixed header.
        if MAX_FIXED_HEADER + 2 + topic.len() + payload.len() > PACKET_BUFFER {
            return Err(Error::PacketTooLarge(PACKET_BUFFER));
        }

        let packet = Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            pid: None,
            retain: false,
            topic_name: topic,
            payload,
        });
        self.send(&packet)
    }

    fn subscribe(&mut self, topic_filter: &str) -> Result<(), Error> {
        if !self.connected() {
            return Err(Error::NotConnected);
        }

        let topics = [SubscribeTopic {
            topic_path: topic_filter,
            qos: QoS::AtMostOnce,
        }];
        self.send(&Packet::Subscribe(Subscribe::new(&topics)))
    }

    fn poll<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), Error> {
        if !self.connected() {
            return Err(Error::NotConnected);
        }

        self.keep_alive()?;

        loop {
            match self.read_packet() {
                Ok(Inbound::Idle) => return Ok(()),
                Ok(Inbound::Dropped) => continue,
                Ok(Inbound::Frame(len)) => self.dispatch(len, handler)?,
                Err(Error::Timeout) => {
                    warn!("broker stalled mid-packet");
                    self.fail(ConnectFailure::Timeout);
                    return Err(Error::Timeout);
                }
                Err(e) => {
                    self.fail(ConnectFailure::ConnectionLost);
                    return Err(e);
                }
            }
        }
    }
}
