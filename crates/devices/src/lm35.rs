//! LM35 analog temperature sensor.
//!
//! 10 mV/°C against the internal 2.56 V reference; the sensor saturates at
//! 1.5 V / 150 °C, which fixes the conversion:
//! `temp = raw · 150 · 2.56 / (1.5 · 1023)`.

use atmega32_core::peripherals::adc::{Adc, ADC_MAX, INTERNAL_REF_VOLTS};

use crate::error::Result;

const MAX_TEMPERATURE_C: f64 = 150.0;
const MAX_SENSOR_VOLTS: f64 = 1.5;

/// ADC channel the sensor sits on by default.
pub const DEFAULT_CHANNEL: u8 = 2;

pub struct Lm35 {
    channel: u8,
}

impl Lm35 {
    pub fn new(channel: u8) -> Self {
        Lm35 { channel }
    }

    /// One blocking conversion, scaled to whole degrees Celsius.
    pub fn temperature_c(&self, adc: &mut Adc) -> Result<u8> {
        let raw = adc.read_channel(self.channel)?;
        let temp = (raw as f64 * MAX_TEMPERATURE_C * INTERNAL_REF_VOLTS)
            / (MAX_SENSOR_VOLTS * ADC_MAX as f64);
        Ok(temp as u8)
    }
}
