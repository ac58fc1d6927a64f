use heapless::String;
use serde::Serialize;

use crate::wifi::{format_mac, MacString, Station};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    pub sequence: u64,
    pub mac: MacString,
    pub rssi: i32,
    pub distance: u32,
}

// Watson IoT expects device data under a top level "d" key.
#[derive(Serialize)]
struct Envelope<'a> {
    d: &'a TelemetryRecord,
}

impl TelemetryRecord {
    pub fn capture<S: Station>(sequence: u64, station: &mut S, distance: u32) -> Self {
        TelemetryRecord {
            sequence,
            mac: format_mac(&station.mac()),
            rssi: station.rssi(),
            distance,
        }
    }

    pub fn encode_into<const N: usize>(&self, buf: &mut PayloadBuffer<N>) -> Result<usize, Error> {
        buf.encode(&Envelope { d: self })
    }
}

// A value that does not fit leaves the buffer empty
pub struct PayloadBuffer<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> PayloadBuffer<N> {
    pub const fn new() -> Self {
        PayloadBuffer {
            bytes: [0; N],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    pub fn encode<T: Serialize>(&mut self, value: &T) -> Result<usize, Error> {
        self.len = 0;
        match serde_json_core::to_slice(value, &mut self.bytes) {
            Ok(len) => {
                self.len = len;
                Ok(len)
            }
            Err(serde_json_core::ser::Error::BufferFull) => Err(Error::PayloadOverflow(N)),
            #[allow(unreachable_patterns)]
            Err(_) => Err(Error::Encoding),
        }
    }
}

impl<const N: usize> Default for PayloadBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// (<mac>/<ip>) <hostname>
pub fn status_line<S: Station>(station: &S) -> String<96> {
    use core::fmt::Write;

    let mut line = String::new();
    write!(
        line,
        "({}/{}) {}",
        format_mac(&station.mac()),
        station.ip(),
        station.hostname()
    )
    .ok();
    line
}
