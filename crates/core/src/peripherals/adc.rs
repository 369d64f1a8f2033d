//! Analog-to-digital converter driver.
//!
//! Conversions complete instantly against per-channel injected samples
//! (`set_channel_input`), with ADSC/ADIF behaving as on silicon: starting
//! a conversion sets ADSC, completion clears it and raises ADIF.
//! 10-bit result, single-ended channels 0–7 on port A.

use crate::error::{Error, Result};
use crate::snapshot::AdcState;

use super::Callback;

/// Full-scale conversion result.
pub const ADC_MAX: u16 = 1023;
/// Internal reference in volts.
pub const INTERNAL_REF_VOLTS: f64 = 2.56;

/// REFS1:0 selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Aref,
    Avcc,
    Internal2V56,
}

impl Reference {
    pub fn bits(self) -> u8 {
        match self {
            Reference::Aref => 0,
            Reference::Avcc => 1,
            Reference::Internal2V56 => 3,
        }
    }
}

/// ADPS2:0 clock divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcPrescaler {
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl AdcPrescaler {
    pub fn bits(self) -> u8 {
        match self {
            AdcPrescaler::Div2 => 1,
            AdcPrescaler::Div4 => 2,
            AdcPrescaler::Div8 => 3,
            AdcPrescaler::Div16 => 4,
            AdcPrescaler::Div32 => 5,
            AdcPrescaler::Div64 => 6,
            AdcPrescaler::Div128 => 7,
        }
    }
}

pub struct AdcConfig {
    pub reference: Reference,
    pub prescaler: AdcPrescaler,
    pub left_adjust: bool,
    pub auto_trigger: bool,
    pub interrupt_enable: bool,
    pub on_conversion: Option<Callback>,
}

pub struct Adc {
    reference: Reference,
    prescaler_bits: u8,
    left_adjust: bool,
    auto_trigger: bool,
    aden: bool,
    adsc: bool,
    adif: bool,
    adie: bool,
    channel: u8,
    data: u16,
    // Injected analog levels per channel (raw 10-bit)
    inputs: [u16; 8],
    on_conversion: Option<Callback>,
    pub dbg_conversion_count: u32,
}

impl Adc {
    pub fn new() -> Self {
        Adc {
            reference: Reference::Aref,
            prescaler_bits: 0,
            left_adjust: false,
            auto_trigger: false,
            aden: false,
            adsc: false,
            adif: false,
            adie: false,
            channel: 0,
            data: 0,
            inputs: [0; 8],
            on_conversion: None,
            dbg_conversion_count: 0,
        }
    }

    pub fn reset(&mut self) {
        let inputs = self.inputs;
        *self = Adc::new();
        self.inputs = inputs;
    }

    pub fn init(&mut self, cfg: AdcConfig) {
        self.reference = cfg.reference;
        self.prescaler_bits = cfg.prescaler.bits();
        self.left_adjust = cfg.left_adjust;
        self.auto_trigger = cfg.auto_trigger;
        self.adie = cfg.interrupt_enable;
        self.on_conversion = cfg.on_conversion;
        self.aden = true;
    }

    pub fn deinit(&mut self) {
        self.aden = false;
        self.adsc = false;
        self.adif = false;
        self.adie = false;
        self.on_conversion = None;
    }

    /// Drive a channel from outside the MCU (raw 10-bit level).
    pub fn set_channel_input(&mut self, channel: u8, raw: u16) -> Result<()> {
        if channel > 7 {
            return Err(Error::InvalidAdcChannel(channel));
        }
        self.inputs[channel as usize] = raw & ADC_MAX;
        Ok(())
    }

    /// Select a channel and run one blocking conversion.
    pub fn read_channel(&mut self, channel: u8) -> Result<u16> {
        if channel > 7 {
            return Err(Error::InvalidAdcChannel(channel));
        }
        self.channel = channel;
        self.adsc = true;
        self.data = self.inputs[channel as usize];
        self.adsc = false;
        self.adif = true;
        self.dbg_conversion_count += 1;
        Ok(self.data)
    }

    /// ADCH:ADCL pair; left adjust shifts the 10-bit result to the top.
    pub fn data_register(&self) -> u16 {
        if self.left_adjust {
            self.data << 6
        } else {
            self.data
        }
    }

    pub fn service_interrupt(&mut self) -> bool {
        if self.adif && self.adie {
            self.adif = false;
            if let Some(cb) = self.on_conversion.as_mut() {
                cb();
            }
            return true;
        }
        false
    }

    pub fn enabled(&self) -> bool {
        self.aden
    }

    pub fn conversion_pending(&self) -> bool {
        self.adif
    }

    pub fn selected_channel(&self) -> u8 {
        self.channel
    }

    pub fn reference(&self) -> Reference {
        self.reference
    }

    pub fn save_state(&self) -> AdcState {
        AdcState {
            reference_bits: self.reference.bits(),
            prescaler_bits: self.prescaler_bits,
            left_adjust: self.left_adjust,
            auto_trigger: self.auto_trigger,
            aden: self.aden,
            adsc: self.adsc,
            adif: self.adif,
            adie: self.adie,
            channel: self.channel,
            data: self.data,
        }
    }

    pub fn load_state(&mut self, s: &AdcState) {
        self.reference = match s.reference_bits {
            1 => Reference::Avcc,
            3 => Reference::Internal2V56,
            _ => Reference::Aref,
        };
        self.prescaler_bits = s.prescaler_bits;
        self.left_adjust = s.left_adjust;
        self.auto_trigger = s.auto_trigger;
        self.aden = s.aden;
        self.adsc = s.adsc;
        self.adif = s.adif;
        self.adie = s.adie;
        self.channel = s.channel;
        self.data = s.data;
    }
}

impl Default for Adc {
    fn default() -> Self {
        Adc::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn avcc_config() -> AdcConfig {
        AdcConfig {
            reference: Reference::Avcc,
            prescaler: AdcPrescaler::Div64,
            left_adjust: false,
            auto_trigger: false,
            interrupt_enable: false,
            on_conversion: None,
        }
    }

    #[test]
    fn test_blocking_conversion_returns_injected_sample() {
        let mut adc = Adc::new();
        adc.init(avcc_config());
        adc.set_channel_input(3, 512).unwrap();
        assert_eq!(adc.read_channel(3).unwrap(), 512);
        assert_eq!(adc.selected_channel(), 3);
        assert!(adc.conversion_pending());
    }

    #[test]
    fn test_sample_clamped_to_10_bits() {
        let mut adc = Adc::new();
        adc.init(avcc_config());
        adc.set_channel_input(0, 0xFFFF).unwrap();
        assert_eq!(adc.read_channel(0).unwrap(), ADC_MAX);
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let mut adc = Adc::new();
        adc.init(avcc_config());
        assert_eq!(adc.read_channel(8), Err(Error::InvalidAdcChannel(8)));
        assert_eq!(adc.set_channel_input(9, 0), Err(Error::InvalidAdcChannel(9)));
    }

    #[test]
    fn test_left_adjust_shifts_result() {
        let mut adc = Adc::new();
        adc.init(AdcConfig { left_adjust: true, ..avcc_config() });
        adc.set_channel_input(1, 0x200).unwrap();
        adc.read_channel(1).unwrap();
        assert_eq!(adc.data_register(), 0x200 << 6);
    }

    #[test]
    fn test_conversion_callback() {
        let mut adc = Adc::new();
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        adc.init(AdcConfig {
            interrupt_enable: true,
            on_conversion: Some(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })),
            ..avcc_config()
        });
        adc.read_channel(0).unwrap();
        assert!(adc.service_interrupt());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!adc.conversion_pending());
        assert!(!adc.service_interrupt());
    }
}
