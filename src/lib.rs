#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod connection;
pub mod command;
pub mod device;
pub mod error;
pub mod mqtt;
pub mod sensor;
pub mod telemetry;
pub mod wifi;

pub use command::CommandOutput;
pub use config::BrokerConfig;
pub use connection::ensure_connected;
pub use device::Device;
pub use error::Error;
pub use mqtt::{Client, ConnectFailure, MessageHandler, Session, SessionState, Transport};
pub use sensor::{echo_to_distance, RangeSensor, Ultrasonic};
pub use telemetry::{PayloadBuffer, TelemetryRecord};
pub use wifi::Station;

// Free running microsecond time source
pub trait Clock {
    fn now_us(&self) -> u64;

    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}
