use embedded_hal::digital::v2::OutputPin;
use log::{info, warn};

use crate::mqtt::MessageHandler;
use crate::Error;

// Only the first payload byte matters: '1' is on, anything else (empty too) is off
pub struct CommandOutput<P> {
    pin: P,
    active_low: bool,
    active: bool,
}

impl<P: OutputPin> CommandOutput<P> {
    // On while the pin is LOW, like the on-board LED
    pub fn active_low(pin: P) -> Self {
        CommandOutput {
            pin,
            active_low: true,
            active: false,
        }
    }

    pub fn active_high(pin: P) -> Self {
        CommandOutput {
            pin,
            active_low: false,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn set_active(&mut self, active: bool) -> Result<(), Error> {
        let drive_high = active != self.active_low;
        if drive_high {
            self.pin.set_high().map_err(|_| Error::Pin)?;
        } else {
            self.pin.set_low().map_err(|_| Error::Pin)?;
        }
        self.active = active;
        Ok(())
    }

    pub fn apply(&mut self, payload: &[u8]) -> Result<bool, Error> {
        let active = payload.first() == Some(&b'1');
        self.set_active(active)?;
        Ok(active)
    }
}

impl<P: OutputPin> MessageHandler for CommandOutput<P> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        info!(
            "Message arrived [{}] {}",
            topic,
            core::str::from_utf8(payload).unwrap_or("<binary>")
        );
        if let Err(e) = self.apply(payload) {
            warn!("command output not updated: {}", e);
        }
    }
}
