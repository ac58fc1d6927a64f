pub const WIFI_SSID: &str = "your_ssid";//OR env!("WIFI_SSID");
pub const WIFI_PASS: &str = "your_pw";//OR env!("WIFI_PASS");

// Watson IoT identity. Kept as macros so the derived strings below can be built with concat!
macro_rules! org_id { () => { "your_org" }; }
macro_rules! device_type { () => { "your_device_type" }; }
macro_rules! device_id { () => { "your_device_id" }; }
macro_rules! output_event_id { () => { "distance" }; }
macro_rules! status_event_id { () => { "status" }; }

pub const ORG_ID: &str = org_id!();
pub const DEVICE_TYPE: &str = device_type!();
pub const DEVICE_ID: &str = device_id!();
pub const AUTH_TOKEN: &str = "your_auth_token";

pub const BROKER_HOST: &str = concat!(org_id!(), ".messaging.internetofthings.ibmcloud.com");
pub const BROKER_PORT: u16 = 1883;
pub const CLIENT_ID: &str = concat!("d:", org_id!(), ":", device_type!(), ":", device_id!());
pub const BROKER_USER: &str = "use-token-auth";
pub const BROKER_PASS: &str = AUTH_TOKEN;

pub const COMMAND_TOPIC: &str = "iot-2/cmd/+/fmt/+";
pub const OUTPUT_TOPIC: &str = concat!("iot-2/evt/", output_event_id!(), "/fmt/json");
pub const STATUS_TOPIC: &str = concat!("iot-2/evt/", status_event_id!(), "/fmt/txt");

// ESP32-C3 pin assignments
pub const TRIGGER_GPIO: u8 = 1;
pub const ECHO_GPIO: u8 = 0;
pub const LED_GPIO: u8 = 8;

pub const BUFFER_SIZE: usize = 500;
pub const RETRY_DELAY_MS: u32 = 5_000;
pub const WIFI_POLL_MS: u32 = 500;
pub const KEEP_ALIVE_S: u16 = 15;
pub const SOCKET_TIMEOUT_MS: u64 = 15_000;
pub const ECHO_TIMEOUT_US: u64 = 1_000_000;

/// Broker endpoint, credentials and topics used by the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrokerConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub command_topic: &'a str,
    pub output_topic: &'a str,
    pub status_topic: &'a str,
    pub retry_delay_ms: u32,
}

impl BrokerConfig<'static> {
    pub const fn watson() -> Self {
        BrokerConfig {
            host: BROKER_HOST,
            port: BROKER_PORT,
            client_id: CLIENT_ID,
            username: BROKER_USER,
            password: BROKER_PASS,
            command_topic: COMMAND_TOPIC,
            output_topic: OUTPUT_TOPIC,
            status_topic: STATUS_TOPIC,
            retry_delay_ms: RETRY_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_identity_strings() {
        assert_eq!(BROKER_HOST, "your_org.messaging.internetofthings.ibmcloud.com");
        assert_eq!(CLIENT_ID, "d:your_org:your_device_type:your_device_id");
        assert_eq!(OUTPUT_TOPIC, "iot-2/evt/distance/fmt/json");
        assert_eq!(STATUS_TOPIC, "iot-2/evt/status/fmt/txt");
    }
}
