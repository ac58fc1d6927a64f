use core::net::Ipv4Addr;

use esp_hal::{
    clock::Clocks,
    delay::Delay,
    gpio::{Input, InputPin, Level, Output, OutputPin, Pull},
    peripheral::Peripheral,
};
use esp_wifi::{
    wifi::{
        get_sta_mac, ClientConfiguration, Configuration, WifiController, WifiError, WifiStaDevice,
    },
    wifi_interface::{IoError, Socket, WifiStack, WifiStackError},
};
use smoltcp::wire::{DnsQueryType, IpAddress, Ipv4Address};
use log::{debug, warn};

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::{InputPin as HalInputPin, OutputPin as HalOutputPin};

use ultrasonic_telemetry::wifi::{default_hostname, HostnameString, RssiCache};
use ultrasonic_telemetry::{Clock, Station, Transport};

// trigger and LED pins need to implement embedded_hal::digital::v2::OutputPin
pub struct OutputAdapter<'a, P> {
    inner: Output<'a, P>,
}

impl<'a, P> OutputAdapter<'a, P>
where
    P: OutputPin,
{
    pub fn new(pin: impl Peripheral<P = P> + 'a, level: Level) -> Self {
        OutputAdapter {
            inner: Output::new(pin, level),
        }
    }
}

impl<'a, P> HalOutputPin for OutputAdapter<'a, P>
where
    P: OutputPin,
{
    type Error = core::convert::Infallible;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(self.inner.set_high())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(self.inner.set_low())
    }
}

// echo pin needs to implement embedded_hal::digital::v2::InputPin
pub struct InputAdapter<'a, P> {
    inner: Input<'a, P>,
}

impl<'a, P> InputAdapter<'a, P>
where
    P: InputPin,
{
    pub fn new(pin: impl Peripheral<P = P> + 'a, pull: Pull) -> Self {
        InputAdapter {
            inner: Input::new(pin, pull),
        }
    }
}

impl<'a, P> HalInputPin for InputAdapter<'a, P>
where
    P: InputPin,
{
    type Error = core::convert::Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.inner.is_high())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.inner.is_low())
    }
}

// Delay needs to implement traits DelayMs and DelayUs
#[derive(Clone, Copy)]
pub struct DelayAdapter {
    inner: Delay,
}

impl DelayAdapter {
    pub fn new(clocks: &Clocks) -> Self {
        DelayAdapter {
            inner: Delay::new(clocks),
        }
    }
}

impl DelayMs<u32> for DelayAdapter {
    fn delay_ms(&mut self, ms: u32) {
        self.inner.delay_millis(ms)
    }
}

impl DelayUs<u32> for DelayAdapter {
    fn delay_us(&mut self, us: u32) {
        self.inner.delay_micros(us)
    }
}

// Microseconds since boot from the system timer
#[derive(Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        esp_hal::time::current_time()
            .duration_since_epoch()
            .to_micros()
    }
}

pub struct StationAdapter<'a> {
    controller: WifiController<'a>,
    stack: &'a WifiStack<'a, WifiStaDevice>,
    ssid: heapless::String<32>,
    hostname: HostnameString,
    started: bool,
    link_up: bool,
    down_polls: u32,
    rssi: RssiCache,
}

// Polls between repeated connect requests while the AP stays away
const RECONNECT_EVERY: u32 = 10;

impl<'a> StationAdapter<'a> {
    pub fn new(controller: WifiController<'a>, stack: &'a WifiStack<'a, WifiStaDevice>) -> Self {
        let mut mac = [0u8; 6];
        get_sta_mac(&mut mac);
        StationAdapter {
            controller,
            stack,
            ssid: heapless::String::new(),
            hostname: default_hostname(&mac),
            started: false,
            link_up: false,
            down_polls: 0,
            rssi: RssiCache::default(),
        }
    }
}

impl<'a> Station for StationAdapter<'a> {
    type Error = WifiError;

    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        self.ssid = ssid.try_into().unwrap_or_default();
        self.controller
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: self.ssid.clone(),
                password: password.try_into().unwrap_or_default(),
                ..Default::default()
            }))?;
        self.controller.start()?;
        self.started = true;
        self.controller.connect()
    }

    // esp-wifi does not re-associate by itself after StaDisconnected
    fn is_connected(&mut self) -> bool {
        self.stack.work();
        let associated = match self.controller.is_connected() {
            Ok(true) => true,
            // A dropped association reports either Ok(false) or Err(Disconnected)
            Ok(false) | Err(_) if self.started => {
                if self.link_up {
                    warn!("WiFi association lost, reconnecting");
                }
                if self.link_up || (self.down_polls > 0 && self.down_polls % RECONNECT_EVERY == 0) {
                    if let Err(e) = self.controller.connect() {
                        debug!("reconnect request failed: {:?}", e);
                    }
                }
                self.down_polls += 1;
                false
            }
            _ => false,
        };

        let up = associated && self.stack.is_iface_up();
        if up && !self.link_up {
            self.rssi.invalidate();
            self.down_polls = 0;
        }
        self.link_up = up;
        up
    }

    fn mac(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        get_sta_mac(&mut mac);
        mac
    }

    fn ip(&self) -> Ipv4Addr {
        match self.stack.get_ip_info() {
            Ok(info) => Ipv4Addr::from(info.ip.octets()),
            Err(_) => Ipv4Addr::UNSPECIFIED,
        }
    }

    fn hostname(&self) -> &str {
        &self.hostname
    }

    // esp-wifi has no query for the current association, so scan for our own AP
    // once per association
    fn rssi(&mut self) -> i32 {
        let controller = &mut self.controller;
        let ssid = &self.ssid;
        self.rssi.get_or_scan(|| match controller.scan_n::<8>() {
            Ok((found, _)) => Some(
                found
                    .iter()
                    .find(|ap| ap.ssid == *ssid)
                    .map(|ap| i32::from(ap.signal_strength))
                    .unwrap_or(0),
            ),
            Err(_) => None,
        })
    }
}

#[derive(Debug)]
pub enum NetError {
    Io(IoError),
    Dns(WifiStackError),
    Unresolved,
}

impl embedded_io::Error for NetError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            NetError::Io(e) => embedded_io::Error::kind(e),
            NetError::Dns(_) | NetError::Unresolved => embedded_io::ErrorKind::AddrNotAvailable,
        }
    }
}

// TCP socket to the broker, resolving its hostname through the WiFi stack's DNS
pub struct SocketAdapter<'s, 'n: 's> {
    socket: Socket<'s, 'n, WifiStaDevice>,
    stack: &'n WifiStack<'n, WifiStaDevice>,
}

impl<'s, 'n: 's> SocketAdapter<'s, 'n> {
    pub fn new(socket: Socket<'s, 'n, WifiStaDevice>, stack: &'n WifiStack<'n, WifiStaDevice>) -> Self {
        SocketAdapter { socket, stack }
    }

    fn resolve(&self, host: &str) -> Result<IpAddress, NetError> {
        if let Ok(addr) = host.parse::<Ipv4Address>() {
            return Ok(IpAddress::Ipv4(addr));
        }
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .map_err(NetError::Dns)?;
        addrs
            .first()
            .copied()
            .ok_or(NetError::Unresolved)
    }
}

impl<'s, 'n: 's> embedded_io::ErrorType for SocketAdapter<'s, 'n> {
    type Error = NetError;
}

impl<'s, 'n: 's> embedded_io::Read for SocketAdapter<'s, 'n> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        embedded_io::Read::read(&mut self.socket, buf).map_err(NetError::Io)
    }
}

impl<'s, 'n: 's> embedded_io::ReadReady for SocketAdapter<'s, 'n> {
    fn read_ready(&mut self) -> Result<bool, NetError> {
        self.socket.work();
        embedded_io::ReadReady::read_ready(&mut self.socket).map_err(NetError::Io)
    }
}

impl<'s, 'n: 's> embedded_io::Write for SocketAdapter<'s, 'n> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        embedded_io::Write::write(&mut self.socket, buf).map_err(NetError::Io)
    }

    fn flush(&mut self) -> Result<(), NetError> {
        embedded_io::Write::flush(&mut self.socket).map_err(NetError::Io)
    }
}

impl<'s, 'n: 's> Transport for SocketAdapter<'s, 'n> {
    fn open(&mut self, host: &str, port: u16) -> Result<(), NetError> {
        let addr = self.resolve(host)?;
        self.socket.work();
        self.socket.open(addr, port).map_err(NetError::Io)
    }

    fn close(&mut self) {
        self.socket.disconnect();
        self.socket.work();
    }

    fn is_open(&mut self) -> bool {
        self.socket.work();
        self.socket.is_open()
    }
}
