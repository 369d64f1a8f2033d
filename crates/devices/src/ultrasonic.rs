//! HC-SR04 ultrasonic ranger over Timer1's input capture unit.
//!
//! The driver owns the trigger pin and caches the Timer1 prescaler so it
//! can convert between capture counts and microseconds. Echo-pulse edges
//! arrive through the Timer1 capture callback supplied at init; the
//! application measures the pulse width by flipping the capture edge
//! between the rising and falling edge of the echo.

use atmega32_core::gpio::{Gpio, Level, PinConfig};
use atmega32_core::peripherals::timer1::{self, EdgeSelect, Timer1};
use atmega32_core::peripherals::Callback;
use atmega32_core::{period_us, ClockSource};

use crate::error::Result;

/// Trigger pulse width required by the sensor.
const TRIGGER_PULSE_US: f64 = 10.0;

pub struct UltrasonicConfig {
    pub trigger_pin: PinConfig,
    pub clock_source: ClockSource,
    pub noise_canceler: bool,
    /// Invoked on every captured echo edge.
    pub on_echo: Option<Callback>,
}

pub struct Ultrasonic {
    trigger_pin: PinConfig,
    prescaler: u32,
}

impl Ultrasonic {
    /// Wire Timer1 in Normal mode with the capture unit armed on the
    /// rising edge, and park the trigger pin low.
    pub fn init(gpio: &mut Gpio, timer1: &mut Timer1, cfg: UltrasonicConfig) -> Result<Self> {
        let prescaler = cfg.clock_source.prescale().unwrap_or(1);
        timer1.ovf_init(timer1::OvfConfig {
            clock_source: cfg.clock_source,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: cfg.noise_canceler,
            overflow_interrupt: false,
            capture_interrupt: true,
            on_overflow: None,
            on_capture: cfg.on_echo,
        })?;
        gpio.setup_pin_direction(&cfg.trigger_pin)?;
        gpio.write_pin(cfg.trigger_pin.port, cfg.trigger_pin.pin, Level::Low)?;
        Ok(Ultrasonic { trigger_pin: cfg.trigger_pin, prescaler })
    }

    /// Emit the 10 µs trigger pulse, timed by loading TCNT1 so the next
    /// overflow lands exactly at the end of the pulse. The timer model is
    /// advanced in place of busy-waiting on the overflow flag.
    pub fn trigger(&self, gpio: &mut Gpio, timer1: &mut Timer1) -> Result<()> {
        gpio.write_pin(self.trigger_pin.port, self.trigger_pin.pin, Level::High)?;
        let counts_10us = (TRIGGER_PULSE_US / period_us(self.prescaler)) as u32;
        timer1.set_timer_value((65_536 - counts_10us as u64) as u16);
        timer1.advance(counts_10us as u64 * self.prescaler as u64);
        timer1.clear_overflow_flag();
        gpio.write_pin(self.trigger_pin.port, self.trigger_pin.pin, Level::Low)?;
        Ok(())
    }

    /// Echo pulse width in capture counts to distance in centimeters:
    /// sound travels ~1 cm per 58 µs round trip, i.e. 17 µs·counts scaled
    /// by the tick period.
    pub fn distance_cm(&self, counts: u16) -> u16 {
        (counts as f64 / (1000.0 / (17.0 * period_us(self.prescaler)))) as u16
    }

    /// Convert the finished measurement, then immediately re-trigger and
    /// re-arm the capture unit on the rising edge for the next one.
    pub fn read_distance(
        &self,
        gpio: &mut Gpio,
        timer1: &mut Timer1,
        counts: u16,
    ) -> Result<u16> {
        let distance = self.distance_cm(counts);
        self.trigger(gpio, timer1)?;
        timer1.set_edge_detection_type(EdgeSelect::Rising);
        Ok(distance)
    }
}
