use embedded_hal::blocking::delay::DelayMs;
use log::{info, warn};

use crate::config::{BrokerConfig, WIFI_POLL_MS};
use crate::mqtt::Client;
use crate::telemetry::status_line;
use crate::wifi::Station;

/// Blocks until `client` holds a live broker session and returns the number of
/// broker connect attempts made (0 when the session was already up).
///
/// While the WiFi link is down no handshake is tried; the station is polled every
/// 500 ms until it is back. Every successful handshake announces the device on the
/// status topic and subscribes to the command topic. Failed handshakes are logged
/// with their reason and retried after `config.retry_delay_ms`, without limit.
pub fn ensure_connected<B, S, D>(client: &mut B, station: &mut S, delay: &mut D, config: &BrokerConfig<'_>) -> u32
where
    B: Client,
    S: Station,
    D: DelayMs<u32>,
{
    let mut attempts = 0;
    let mut link_down = false;
    while !client.connected() {
        if !station.is_connected() {
            if !link_down {
                warn!("WiFi link lost, waiting for it to come back");
                link_down = true;
            }
            delay.delay_ms(WIFI_POLL_MS);
            continue;
        }
        if link_down {
            info!("WiFi link back, IP address: {}", station.ip());
            link_down = false;
        }

        attempts += 1;
        match client.connect(config.client_id, config.username, config.password) {
            Ok(()) => {
                let status = status_line(&*station);
                info!("Connected to broker: {}", status);
                if let Err(e) = client.publish(config.status_topic, status.as_bytes()) {
                    warn!("status announcement not sent: {}", e);
                }
                if let Err(e) = client.subscribe(config.command_topic) {
                    warn!("subscribe to {} failed: {}", config.command_topic, e);
                }
            }
            Err(failure) => {
                warn!(
                    "Connection to broker failed. Reason {} trying again in {} seconds...",
                    failure,
                    config.retry_delay_ms / 1_000
                );
                delay.delay_ms(config.retry_delay_ms);
            }
        }
    }
    attempts
}
