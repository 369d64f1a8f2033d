//! SPI driver.
//!
//! Master or slave configuration with the usual SPCR knobs. The shift
//! register is modeled as an outgoing log plus an injectable incoming
//! queue, so transfers are observable and deterministic on the host.
//! Bus pins: SS = PB4, MOSI = PB5, MISO = PB6, SCK = PB7.
//!
//! String transfer uses the `#` terminator convention shared with USART.

use std::collections::VecDeque;

use crate::error::Result;
use crate::gpio::{Gpio, PinConfig, PinMode, Port};
use crate::snapshot::SpiState;

pub const SS_PIN: PinConfig = PinConfig { port: Port::B, pin: 4, mode: PinMode::Output };
pub const MOSI_PIN: PinConfig = PinConfig { port: Port::B, pin: 5, mode: PinMode::Output };
pub const MISO_PIN: PinConfig = PinConfig { port: Port::B, pin: 6, mode: PinMode::Input };
pub const SCK_PIN: PinConfig = PinConfig { port: Port::B, pin: 7, mode: PinMode::Output };

/// Value shifted in when the incoming queue is empty (idle-high bus).
const IDLE_BYTE: u8 = 0xFF;
/// Terminator for string transfer.
const STRING_TERMINATOR: u8 = b'#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiRole {
    Master,
    Slave,
}

/// SPR1:0 divider (SPI2X not modeled separately; pick the base rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiClockRate {
    Div4,
    Div16,
    Div64,
    Div128,
}

impl SpiClockRate {
    pub fn bits(self) -> u8 {
        match self {
            SpiClockRate::Div4 => 0,
            SpiClockRate::Div16 => 1,
            SpiClockRate::Div64 => 2,
            SpiClockRate::Div128 => 3,
        }
    }
}

pub struct SpiConfig {
    pub role: SpiRole,
    pub lsb_first: bool,
    pub idle_high_clock: bool,
    pub sample_on_trailing_edge: bool,
    pub clock_rate: SpiClockRate,
}

pub struct Spi {
    spe: bool,
    role: SpiRole,
    lsb_first: bool,
    cpol: bool,
    cpha: bool,
    rate_bits: u8,
    spif: bool,
    tx_log: Vec<u8>,
    rx_queue: VecDeque<u8>,
}

impl Spi {
    pub fn new() -> Self {
        Spi {
            spe: false,
            role: SpiRole::Master,
            lsb_first: false,
            cpol: false,
            cpha: false,
            rate_bits: 0,
            spif: false,
            tx_log: Vec::new(),
            rx_queue: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Spi::new();
    }

    /// Configure the bus and claim its pins for the chosen role.
    pub fn init(&mut self, gpio: &mut Gpio, cfg: SpiConfig) -> Result<()> {
        match cfg.role {
            SpiRole::Master => {
                gpio.setup_pin_direction(&SS_PIN)?;
                gpio.setup_pin_direction(&MOSI_PIN)?;
                gpio.setup_pin_direction(&SCK_PIN)?;
                gpio.setup_pin_direction(&MISO_PIN)?;
            }
            SpiRole::Slave => {
                gpio.setup_pin_direction(&PinConfig { mode: PinMode::Input, ..SS_PIN })?;
                gpio.setup_pin_direction(&PinConfig { mode: PinMode::Input, ..MOSI_PIN })?;
                gpio.setup_pin_direction(&PinConfig { mode: PinMode::Input, ..SCK_PIN })?;
                gpio.setup_pin_direction(&PinConfig { mode: PinMode::Output, ..MISO_PIN })?;
            }
        }
        self.role = cfg.role;
        self.lsb_first = cfg.lsb_first;
        self.cpol = cfg.idle_high_clock;
        self.cpha = cfg.sample_on_trailing_edge;
        self.rate_bits = cfg.clock_rate.bits();
        self.spe = true;
        Ok(())
    }

    pub fn deinit(&mut self) {
        self.spe = false;
        self.spif = false;
    }

    pub fn send_byte(&mut self, byte: u8) {
        self.tx_log.push(byte);
        self.spif = true;
    }

    pub fn receive_byte(&mut self) -> u8 {
        self.spif = false;
        self.rx_queue.pop_front().unwrap_or(IDLE_BYTE)
    }

    /// Full-duplex shift: send one byte, return the byte shifted in.
    pub fn transfer(&mut self, byte: u8) -> u8 {
        self.send_byte(byte);
        self.receive_byte()
    }

    pub fn send_string(&mut self, s: &str) {
        for b in s.bytes() {
            self.send_byte(b);
        }
        self.send_byte(STRING_TERMINATOR);
    }

    /// Read until the terminator (or the queue runs dry).
    pub fn receive_string(&mut self) -> String {
        let mut out = Vec::new();
        while let Some(b) = self.rx_queue.pop_front() {
            if b == STRING_TERMINATOR {
                break;
            }
            out.push(b);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Queue bytes the remote end will shift in.
    pub fn inject_rx(&mut self, bytes: &[u8]) {
        self.rx_queue.extend(bytes);
    }

    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx_log)
    }

    pub fn enabled(&self) -> bool {
        self.spe
    }

    pub fn role(&self) -> SpiRole {
        self.role
    }

    pub fn transfer_complete(&self) -> bool {
        self.spif
    }

    pub fn save_state(&self) -> SpiState {
        SpiState {
            spe: self.spe,
            master: self.role == SpiRole::Master,
            lsb_first: self.lsb_first,
            cpol: self.cpol,
            cpha: self.cpha,
            rate_bits: self.rate_bits,
            spif: self.spif,
        }
    }

    pub fn load_state(&mut self, s: &SpiState) {
        self.spe = s.spe;
        self.role = if s.master { SpiRole::Master } else { SpiRole::Slave };
        self.lsb_first = s.lsb_first;
        self.cpol = s.cpol;
        self.cpha = s.cpha;
        self.rate_bits = s.rate_bits;
        self.spif = s.spif;
    }
}

impl Default for Spi {
    fn default() -> Self {
        Spi::new()
    }
}
