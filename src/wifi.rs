use core::fmt::Write;
use core::net::Ipv4Addr;

use embedded_hal::blocking::delay::DelayMs;
use heapless::String;
use log::{debug, info};

use crate::config::WIFI_POLL_MS;

pub type MacString = String<17>;
pub type HostnameString = String<32>;

pub trait Station {
    type Error: core::fmt::Debug;

    // Starts association, does not wait for it
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    fn is_connected(&mut self) -> bool;

    fn mac(&self) -> [u8; 6];

    fn ip(&self) -> Ipv4Addr;

    fn hostname(&self) -> &str;

    // dBm
    fn rssi(&mut self) -> i32;
}

// Holds the last scanned RSSI until the link is re-established.
#[derive(Debug, Default)]
pub struct RssiCache(Option<i32>);

impl RssiCache {
    // A failed scan reads 0 and is retried on the next call.
    pub fn get_or_scan(&mut self, scan: impl FnOnce() -> Option<i32>) -> i32 {
        if let Some(rssi) = self.0 {
            return rssi;
        }
        match scan() {
            Some(rssi) => {
                self.0 = Some(rssi);
                rssi
            }
            None => 0,
        }
    }

    pub fn invalidate(&mut self) {
        self.0 = None;
    }
}

// AA:BB:CC:DD:EE:FF
pub fn format_mac(mac: &[u8; 6]) -> MacString {
    let mut out = String::new();
    for (i, byte) in mac.iter().enumerate() {
        if i > 0 {
            out.push(':').ok();
        }
        write!(out, "{:02X}", byte).ok();
    }
    out
}

// ESP-XXXXXX from the last three MAC bytes
pub fn default_hostname(mac: &[u8; 6]) -> HostnameString {
    let mut out = String::new();
    write!(out, "ESP-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]).ok();
    out
}

pub fn associate<S, D>(station: &mut S, delay: &mut D, ssid: &str, password: &str) -> Result<(), S::Error>
where
    S: Station,
    D: DelayMs<u32>,
{
    station.begin(ssid, password)?;
    info!("Connecting WiFi to '{}'", ssid);

    while !station.is_connected() {
        delay.delay_ms(WIFI_POLL_MS);
        debug!(".");
    }

    let mac = format_mac(&station.mac());
    info!("Connected, IP address: {}", station.ip());
    info!("MAC Address: {}", mac);
    info!("IP Address: {}", station.ip());
    info!("Hostname: {}", station.hostname());

    Ok(())
}
