//! 24C16-style external EEPROM on the TWI bus.
//!
//! The 11-bit memory address is split across the slave address (page
//! select bits A10..A8 ride in the device address byte) and one word
//! address byte. Every bus step is checked against the datasheet status
//! code before proceeding.

use atmega32_core::peripherals::twi::{
    Twi, TW_MR_DATA_NACK, TW_MR_SLA_ACK, TW_MT_DATA_ACK, TW_MT_SLA_ACK, TW_REP_START, TW_START,
};

use crate::error::{DeviceError, Result};

/// Fixed device-type identifier for 24Cxx EEPROMs.
const DEVICE_ADDRESS: u8 = 0xA0;

pub struct ExtEeprom;

impl ExtEeprom {
    /// SLA+W with the page-select bits folded in.
    fn sla_w(address: u16) -> u8 {
        DEVICE_ADDRESS | (((address & 0x0700) >> 7) as u8)
    }

    fn expect(twi: &Twi, expected: u8) -> Result<()> {
        let got = twi.status();
        if got != expected {
            return Err(DeviceError::Bus { expected, got });
        }
        Ok(())
    }

    /// Byte write: start, SLA+W, word address, data, stop.
    pub fn write_byte(twi: &mut Twi, address: u16, data: u8) -> Result<()> {
        twi.start();
        Self::expect(twi, TW_START)?;
        twi.write_byte(Self::sla_w(address));
        Self::expect(twi, TW_MT_SLA_ACK)?;
        twi.write_byte(address as u8);
        Self::expect(twi, TW_MT_DATA_ACK)?;
        twi.write_byte(data);
        Self::expect(twi, TW_MT_DATA_ACK)?;
        twi.stop();
        Ok(())
    }

    /// Random read: dummy write sets the word address, then a repeated
    /// start switches to SLA+R and the single byte is NACKed.
    pub fn read_byte(twi: &mut Twi, address: u16) -> Result<u8> {
        twi.start();
        Self::expect(twi, TW_START)?;
        twi.write_byte(Self::sla_w(address));
        Self::expect(twi, TW_MT_SLA_ACK)?;
        twi.write_byte(address as u8);
        Self::expect(twi, TW_MT_DATA_ACK)?;
        twi.start();
        Self::expect(twi, TW_REP_START)?;
        twi.write_byte(Self::sla_w(address) | 1);
        Self::expect(twi, TW_MR_SLA_ACK)?;
        let data = twi.read_byte_nack();
        Self::expect(twi, TW_MR_DATA_NACK)?;
        twi.stop();
        Ok(data)
    }
}
