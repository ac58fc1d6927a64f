#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use mqttrust::encoding::v4::{decode_slice, Packet};
use ultrasonic_telemetry::{Clock, Error, RangeSensor, Station, Transport};

pub const CONNACK_ACCEPTED: u8 = 0;
pub const PINGRESP: [u8; 2] = [0xd0, 0x00];
pub const SUBACK: [u8; 5] = [0x90, 0x03, 0x00, 0x01, 0x00];

/// Manually driven clock. `ticking` clocks also advance on every read.
#[derive(Clone, Default)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
    step_us: u64,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock::default()
    }

    pub fn ticking(step_us: u64) -> Self {
        SimClock {
            now_us: Rc::new(Cell::new(0)),
            step_us,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_us.set(self.now_us.get() + ms * 1_000);
    }

    pub fn millis(&self) -> u64 {
        self.now_us.get() / 1_000
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        let now = self.now_us.get();
        self.now_us.set(now + self.step_us);
        now
    }
}

/// Delay that records each sleep and moves the shared clock forward.
#[derive(Clone)]
pub struct SimDelay {
    clock: SimClock,
    pub sleeps: Rc<RefCell<Vec<u32>>>,
}

impl SimDelay {
    pub fn new(clock: &SimClock) -> Self {
        SimDelay {
            clock: clock.clone(),
            sleeps: Rc::default(),
        }
    }

    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }
}

impl DelayMs<u32> for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.sleeps.borrow_mut().push(ms);
        self.clock.advance_ms(u64::from(ms));
    }
}

/// Broker side of the mock connection.
#[derive(Default)]
pub struct Wire {
    pub open: bool,
    /// Number of upcoming `open` calls that fail at the TCP level.
    pub refuse_opens: u32,
    /// Bytes the broker sends after each successful open, usually a CONNACK.
    pub replies: VecDeque<Vec<u8>>,
    pub opens: Vec<(String, u16, u64)>,
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub closes: u32,
}

#[derive(Clone)]
pub struct MockTransport {
    pub wire: Rc<RefCell<Wire>>,
    clock: SimClock,
}

impl MockTransport {
    pub fn new(clock: &SimClock) -> Self {
        MockTransport {
            wire: Rc::default(),
            clock: clock.clone(),
        }
    }

    pub fn reply(&self, bytes: &[u8]) {
        self.wire.borrow_mut().replies.push_back(bytes.to_vec());
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        self.wire.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub fn drop_connection(&self) {
        let mut wire = self.wire.borrow_mut();
        wire.open = false;
        wire.inbound.clear();
    }

    pub fn sent(&self) -> Vec<Sent> {
        sent(&self.wire.borrow().outbound)
    }

    pub fn clear_sent(&self) {
        self.wire.borrow_mut().outbound.clear();
    }
}

impl ErrorType for MockTransport {
    type Error = ErrorKind;
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        let mut wire = self.wire.borrow_mut();
        if !wire.open {
            return Err(ErrorKind::NotConnected);
        }
        let n = buf.len().min(wire.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = wire.inbound.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        let wire = self.wire.borrow();
        Ok(wire.open && !wire.inbound.is_empty())
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        let mut wire = self.wire.borrow_mut();
        if !wire.open {
            return Err(ErrorKind::NotConnected);
        }
        wire.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), ErrorKind> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), ErrorKind> {
        let now = self.clock.millis();
        let mut wire = self.wire.borrow_mut();
        wire.opens.push((host.to_string(), port, now));
        if wire.refuse_opens > 0 {
            wire.refuse_opens -= 1;
            return Err(ErrorKind::ConnectionRefused);
        }
        wire.open = true;
        if let Some(reply) = wire.replies.pop_front() {
            wire.inbound.extend(reply);
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut wire = self.wire.borrow_mut();
        if wire.open {
            wire.closes += 1;
        }
        wire.open = false;
        wire.inbound.clear();
    }

    fn is_open(&mut self) -> bool {
        self.wire.borrow().open
    }
}

/// Owned summary of an outbound MQTT packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Connect {
        client_id: String,
        username: Option<String>,
        password: Option<Vec<u8>>,
        keep_alive: u16,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
    },
    Subscribe(String),
    Pingreq,
    Pingresp,
    Disconnect,
    Other(u8),
}

impl Sent {
    pub fn publish(topic: &str, payload: &[u8]) -> Self {
        Sent::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        }
    }

    pub fn payload_str(&self) -> Option<&str> {
        match self {
            Sent::Publish { payload, .. } => std::str::from_utf8(payload).ok(),
            _ => None,
        }
    }
}

fn remaining_length(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut len = 0usize;
    let mut i = start;
    let mut shift = 0;
    loop {
        let b = bytes[i];
        len |= usize::from(b & 0x7f) << shift;
        i += 1;
        if b & 0x80 == 0 {
            return (len, i);
        }
        shift += 7;
    }
}

pub fn frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let (len, body) = remaining_length(bytes, i + 1);
        out.push(bytes[i..body + len].to_vec());
        i = body + len;
    }
    out
}

// SUBSCRIBE: packet id, then one length-prefixed filter and its QoS byte.
fn subscribe_filter(frame: &[u8]) -> String {
    let (_, body) = remaining_length(frame, 1);
    let at = body + 2;
    let len = usize::from(frame[at]) << 8 | usize::from(frame[at + 1]);
    String::from_utf8(frame[at + 2..at + 2 + len].to_vec()).unwrap()
}

pub fn sent(bytes: &[u8]) -> Vec<Sent> {
    frames(bytes)
        .iter()
        .map(|frame| match frame[0] >> 4 {
            8 => Sent::Subscribe(subscribe_filter(frame)),
            12 => Sent::Pingreq,
            13 => Sent::Pingresp,
            14 => Sent::Disconnect,
            _ => match decode_slice(frame).unwrap().unwrap() {
                Packet::Connect(c) => Sent::Connect {
                    client_id: c.client_id.to_string(),
                    username: c.username.map(str::to_string),
                    password: c.password.map(|p| p.to_vec()),
                    keep_alive: c.keep_alive,
                },
                Packet::Publish(p) => Sent::publish(p.topic_name, p.payload),
                _ => Sent::Other(frame[0] >> 4),
            },
        })
        .collect()
}

pub fn connack(code: u8) -> Vec<u8> {
    vec![0x20, 0x02, 0x00, code]
}

/// QoS 0 PUBLISH as the broker would deliver it.
pub fn publish_frame(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut remaining = 2 + topic.len() + payload.len();
    let mut frame = vec![0x30];
    loop {
        let mut byte = (remaining % 128) as u8;
        remaining /= 128;
        if remaining > 0 {
            byte |= 0x80;
        }
        frame.push(byte);
        if remaining == 0 {
            break;
        }
    }
    frame.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    frame.extend_from_slice(topic.as_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub struct FakeStation {
    pub polls_until_up: u32,
    pub rssi: i32,
}

impl FakeStation {
    pub const MAC: [u8; 6] = [0xa0, 0x20, 0xa6, 0x0b, 0x1c, 0x2d];

    pub fn up() -> Self {
        FakeStation {
            polls_until_up: 0,
            rssi: -70,
        }
    }
}

impl Station for FakeStation {
    type Error = Infallible;

    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), Infallible> {
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if self.polls_until_up == 0 {
            return true;
        }
        self.polls_until_up -= 1;
        false
    }

    fn mac(&self) -> [u8; 6] {
        Self::MAC
    }

    fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 40)
    }

    fn hostname(&self) -> &str {
        "ESP-0B1C2D"
    }

    fn rssi(&mut self) -> i32 {
        self.rssi
    }
}

pub const STATUS_LINE: &str = "(A0:20:A6:0B:1C:2D/192.168.1.40) ESP-0B1C2D";

/// Range sensor returning scripted readings, then repeating the last one.
pub struct ScriptedRange {
    readings: VecDeque<Result<u32, Error>>,
    last: Result<u32, Error>,
}

impl ScriptedRange {
    pub fn new(readings: &[Result<u32, Error>]) -> Self {
        ScriptedRange {
            readings: readings.iter().copied().collect(),
            last: Ok(0),
        }
    }

    pub fn constant(distance: u32) -> Self {
        ScriptedRange::new(&[Ok(distance)])
    }
}

impl RangeSensor for ScriptedRange {
    fn read_distance(&mut self) -> Result<u32, Error> {
        if let Some(next) = self.readings.pop_front() {
            self.last = next;
        }
        self.last
    }
}

#[derive(Clone, Default)]
pub struct LedPin(pub Rc<Cell<Option<bool>>>);

impl LedPin {
    pub fn level(&self) -> Option<bool> {
        self.0.get()
    }
}

impl OutputPin for LedPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(Some(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(Some(true));
        Ok(())
    }
}

