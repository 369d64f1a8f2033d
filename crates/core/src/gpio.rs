//! General-purpose I/O ports A–D.
//!
//! Models the DDRx/PORTx/PINx register triple per port. A pin read merges
//! driven output levels with externally injected input levels:
//! `(PORT & DDR) | (EXT & !DDR)`. Pull-up inputs idle high until an
//! external level is injected.

use crate::error::{Error, Result};
use crate::snapshot::GpioState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
    D,
}

impl Port {
    fn idx(self) -> usize {
        match self {
            Port::A => 0,
            Port::B => 1,
            Port::C => 2,
            Port::D => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    Input,
    InputPullUp,
}

/// One pin of one port with its direction mode.
#[derive(Debug, Clone, Copy)]
pub struct PinConfig {
    pub port: Port,
    pub pin: u8,
    pub mode: PinMode,
}

pub struct Gpio {
    ddr: [u8; 4],
    port: [u8; 4],
    // Externally driven input levels (test injection / other devices)
    ext: [u8; 4],
    pub trace_enabled: bool,
    trace: Vec<String>,
}

impl Gpio {
    pub fn new() -> Self {
        Gpio {
            ddr: [0; 4],
            port: [0; 4],
            ext: [0; 4],
            trace_enabled: false,
            trace: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ddr = [0; 4];
        self.port = [0; 4];
        self.ext = [0; 4];
        self.trace.clear();
    }

    fn check(port: Port, pin: u8) -> Result<()> {
        if pin > 7 {
            return Err(Error::InvalidPin { port, pin });
        }
        Ok(())
    }

    fn trace(&mut self, entry: String) {
        if self.trace_enabled {
            self.trace.push(entry);
        }
    }

    pub fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }

    pub fn setup_pin_direction(&mut self, cfg: &PinConfig) -> Result<()> {
        Self::check(cfg.port, cfg.pin)?;
        let i = cfg.port.idx();
        let bit = 1u8 << cfg.pin;
        match cfg.mode {
            PinMode::Output => {
                self.ddr[i] |= bit;
            }
            PinMode::Input => {
                self.ddr[i] &= !bit;
                self.port[i] &= !bit;
            }
            PinMode::InputPullUp => {
                self.ddr[i] &= !bit;
                self.port[i] |= bit;
                // Pull-up idles high until something drives the line
                self.ext[i] |= bit;
            }
        }
        Ok(())
    }

    /// Set a whole port's DDR at once (bit set = output).
    pub fn setup_port_direction(&mut self, port: Port, direction_mask: u8) {
        self.ddr[port.idx()] = direction_mask;
    }

    pub fn write_pin(&mut self, port: Port, pin: u8, level: Level) -> Result<()> {
        Self::check(port, pin)?;
        let i = port.idx();
        let bit = 1u8 << pin;
        match level {
            Level::High => self.port[i] |= bit,
            Level::Low => self.port[i] &= !bit,
        }
        self.trace(format!("P{:?}{}={}", port, pin, level.is_high() as u8));
        Ok(())
    }

    pub fn toggle_pin(&mut self, port: Port, pin: u8) -> Result<()> {
        Self::check(port, pin)?;
        self.port[port.idx()] ^= 1u8 << pin;
        Ok(())
    }

    pub fn read_pin(&self, port: Port, pin: u8) -> Result<Level> {
        Self::check(port, pin)?;
        let i = port.idx();
        let merged = (self.port[i] & self.ddr[i]) | (self.ext[i] & !self.ddr[i]);
        Ok(if merged & (1 << pin) != 0 {
            Level::High
        } else {
            Level::Low
        })
    }

    pub fn write_port(&mut self, port: Port, value: u8) {
        self.port[port.idx()] = value;
        self.trace(format!("PORT{:?}={:02X}", port, value));
    }

    pub fn read_port(&self, port: Port) -> u8 {
        let i = port.idx();
        (self.port[i] & self.ddr[i]) | (self.ext[i] & !self.ddr[i])
    }

    /// Drive an input pin from outside the MCU.
    pub fn set_external(&mut self, port: Port, pin: u8, level: Level) -> Result<()> {
        Self::check(port, pin)?;
        let i = port.idx();
        let bit = 1u8 << pin;
        match level {
            Level::High => self.ext[i] |= bit,
            Level::Low => self.ext[i] &= !bit,
        }
        Ok(())
    }

    pub fn is_output(&self, port: Port, pin: u8) -> bool {
        pin <= 7 && self.ddr[port.idx()] & (1 << pin) != 0
    }

    /// Raw PORT register value (driven levels only, no input merge).
    pub fn output_register(&self, port: Port) -> u8 {
        self.port[port.idx()]
    }

    pub fn save_state(&self) -> GpioState {
        GpioState {
            ddr: self.ddr,
            port: self.port,
            ext: self.ext,
        }
    }

    pub fn load_state(&mut self, s: &GpioState) {
        self.ddr = s.ddr;
        self.port = s.port;
        self.ext = s.ext;
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Gpio::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_pin_drives_level() {
        let mut gpio = Gpio::new();
        let led = PinConfig { port: Port::A, pin: 2, mode: PinMode::Output };
        gpio.setup_pin_direction(&led).unwrap();
        gpio.write_pin(Port::A, 2, Level::High).unwrap();
        assert_eq!(gpio.read_pin(Port::A, 2).unwrap(), Level::High);
        gpio.toggle_pin(Port::A, 2).unwrap();
        assert_eq!(gpio.read_pin(Port::A, 2).unwrap(), Level::Low);
    }

    #[test]
    fn test_input_reads_external_level() {
        let mut gpio = Gpio::new();
        let btn = PinConfig { port: Port::D, pin: 6, mode: PinMode::Input };
        gpio.setup_pin_direction(&btn).unwrap();
        assert_eq!(gpio.read_pin(Port::D, 6).unwrap(), Level::Low);
        gpio.set_external(Port::D, 6, Level::High).unwrap();
        assert_eq!(gpio.read_pin(Port::D, 6).unwrap(), Level::High);
    }

    #[test]
    fn test_pull_up_idles_high() {
        let mut gpio = Gpio::new();
        let col = PinConfig { port: Port::C, pin: 0, mode: PinMode::InputPullUp };
        gpio.setup_pin_direction(&col).unwrap();
        assert_eq!(gpio.read_pin(Port::C, 0).unwrap(), Level::High);
        gpio.set_external(Port::C, 0, Level::Low).unwrap();
        assert_eq!(gpio.read_pin(Port::C, 0).unwrap(), Level::Low);
    }

    #[test]
    fn test_invalid_pin_rejected() {
        let mut gpio = Gpio::new();
        let bad = PinConfig { port: Port::B, pin: 8, mode: PinMode::Output };
        assert_eq!(
            gpio.setup_pin_direction(&bad),
            Err(Error::InvalidPin { port: Port::B, pin: 8 })
        );
        assert!(gpio.write_pin(Port::B, 9, Level::High).is_err());
    }

    #[test]
    fn test_port_wide_access() {
        let mut gpio = Gpio::new();
        gpio.setup_port_direction(Port::C, 0xFF);
        gpio.write_port(Port::C, 0xA5);
        assert_eq!(gpio.read_port(Port::C), 0xA5);
        assert_eq!(gpio.output_register(Port::C), 0xA5);
    }
}
