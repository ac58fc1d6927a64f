//! The main cycle and the process context it runs in.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use log::{info, warn};

use crate::command::CommandOutput;
use crate::config::{BrokerConfig, BUFFER_SIZE};
use crate::connection::ensure_connected;
use crate::mqtt::Client;
use crate::sensor::RangeSensor;
use crate::telemetry::{PayloadBuffer, TelemetryRecord};
use crate::wifi::{self, Station};
use crate::Error;

/// Everything the firmware keeps for its lifetime: the broker client, the
/// network station, the sensor, the command output, the sequence counter and
/// the payload scratch buffer.
pub struct Device<'a, B, S, R, P, D> {
    config: BrokerConfig<'a>,
    client: B,
    station: S,
    sensor: R,
    command: CommandOutput<P>,
    delay: D,
    sequence: u64,
    payload: PayloadBuffer<BUFFER_SIZE>,
}

impl<'a, B, S, R, P, D> Device<'a, B, S, R, P, D>
where
    B: Client,
    S: Station,
    R: RangeSensor,
    P: OutputPin,
    D: DelayMs<u32>,
{
    pub fn new(
        config: BrokerConfig<'a>,
        client: B,
        station: S,
        sensor: R,
        command: CommandOutput<P>,
        delay: D,
    ) -> Self {
        Device {
            config,
            client,
            station,
            sensor,
            command,
            delay,
            sequence: 0,
            payload: PayloadBuffer::new(),
        }
    }

    /// Sequence number the next record will carry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn client(&self) -> &B {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut B {
        &mut self.client
    }

    pub fn command(&self) -> &CommandOutput<P> {
        &self.command
    }

    /// Joins the WiFi network, blocking until the station is up.
    pub fn associate(&mut self, ssid: &str, password: &str) -> Result<(), S::Error> {
        wifi::associate(&mut self.station, &mut self.delay, ssid, password)
    }

    /// One main cycle: build a record, publish it, service inbound commands.
    ///
    /// The sequence counter advances whether or not the cycle succeeded.
    pub fn step(&mut self) -> Result<(), Error> {
        let outcome = self.cycle();
        self.sequence += 1;
        outcome
    }

    fn cycle(&mut self) -> Result<(), Error> {
        self.payload.clear();
        let distance = self.sensor.read_distance()?;
        let record = TelemetryRecord::capture(self.sequence, &mut self.station, distance);
        self.publish(&record)?;
        self.client.poll(&mut self.command)
    }

    /// Waits for a live session, then sends `record` on the output topic.
    pub fn publish(&mut self, record: &TelemetryRecord) -> Result<(), Error> {
        ensure_connected(&mut self.client, &mut self.station, &mut self.delay, &self.config);

        record.encode_into(&mut self.payload)?;
        self.client
            .publish(self.config.output_topic, self.payload.as_bytes())?;
        info!("{}", self.payload.as_str());
        Ok(())
    }

    pub fn run(mut self) -> ! {
        loop {
            if let Err(e) = self.step() {
                warn!("cycle {} failed: {}", self.sequence - 1, e);
            }
        }
    }
}
