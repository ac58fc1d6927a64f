//! HC-SR04 ultrasonic ranging.
//!
//! A 10 µs trigger pulse starts a measurement; the sensor answers with an echo
//! pulse whose HIGH time is the round trip of the sound burst.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::config::ECHO_TIMEOUT_US;
use crate::{Clock, Error};

/// Anything that can produce a distance reading for the telemetry record.
pub trait RangeSensor {
    fn read_distance(&mut self) -> Result<u32, Error>;
}

/// Converts an echo time in microseconds to centimetres.
///
/// Sound travels 0.034 cm/µs and the echo covers the distance twice, so the
/// result is `floor(d * 0.034 / 2)`, computed exactly as `d * 17 / 1000`.
pub fn echo_to_distance(duration_us: u64) -> u32 {
    u32::try_from(duration_us.saturating_mul(17) / 1_000).unwrap_or(u32::MAX)
}

pub struct Ultrasonic<TRIG, ECHO, D, C> {
    trigger: TRIG,
    echo: ECHO,
    delay: D,
    clock: C,
    timeout_us: u64,
}

impl<TRIG, ECHO, D, C> Ultrasonic<TRIG, ECHO, D, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayUs<u32>,
    C: Clock,
{
    pub fn new(trigger: TRIG, echo: ECHO, delay: D, clock: C) -> Self {
        Ultrasonic {
            trigger,
            echo,
            delay,
            clock,
            timeout_us: ECHO_TIMEOUT_US,
        }
    }

    pub fn with_timeout(mut self, timeout_us: u64) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    /// Fires the trigger and returns the echo HIGH time in microseconds, 0 on timeout.
    pub fn measure_echo(&mut self) -> Result<u64, Error> {
        self.trigger.set_low().map_err(|_| Error::Pin)?;
        self.delay.delay_us(2);
        self.trigger.set_high().map_err(|_| Error::Pin)?;
        self.delay.delay_us(10);
        self.trigger.set_low().map_err(|_| Error::Pin)?;

        self.pulse_in()
    }

    // Same contract as Arduino's pulseIn(pin, HIGH): a pulse already in progress is
    // skipped, and every stage shares one deadline.
    fn pulse_in(&mut self) -> Result<u64, Error> {
        let deadline = self.clock.now_us().saturating_add(self.timeout_us);

        while self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Ok(0);
            }
        }

        while !self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Ok(0);
            }
        }

        let rise = self.clock.now_us();
        while self.echo_high()? {
            if self.clock.now_us() >= deadline {
                return Ok(0);
            }
        }

        Ok(self.clock.now_us().saturating_sub(rise))
    }

    fn echo_high(&self) -> Result<bool, Error> {
        self.echo.is_high().map_err(|_| Error::Pin)
    }
}

impl<TRIG, ECHO, D, C> RangeSensor for Ultrasonic<TRIG, ECHO, D, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    D: DelayUs<u32>,
    C: Clock,
{
    fn read_distance(&mut self) -> Result<u32, Error> {
        // A missing echo reads as 0, same as a target at 0 cm.
        let duration = self.measure_echo()?;
        Ok(echo_to_distance(duration))
    }
}
