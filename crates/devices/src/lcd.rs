//! HD44780 character LCD, 4-bit or 8-bit data bus.
//!
//! Writes go through the usual enable-pulse latch: register-select,
//! enable high, data bits on the bus, enable low. In 4-bit mode each
//! byte is sent high nibble first with its own enable pulse.

use atmega32_core::gpio::{Gpio, Level, PinConfig};

use crate::error::Result;

// HD44780 command set.
const CMD_INIT_4BIT_SEQ1: u8 = 0x33;
const CMD_INIT_4BIT_SEQ2: u8 = 0x32;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_FUNCTION_8BIT_2LINE: u8 = 0x38;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_CLEAR: u8 = 0x01;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM address of column 1 per row, for a 20x4 panel.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x10, 0x50];

pub enum DataBus {
    FourBit([PinConfig; 4]),
    EightBit([PinConfig; 8]),
}

pub struct LcdConfig {
    pub register_select: PinConfig,
    pub enable: PinConfig,
    pub bus: DataBus,
}

pub struct Lcd {
    register_select: PinConfig,
    enable: PinConfig,
    bus: DataBus,
}

impl Lcd {
    /// Claim the control and bus pins, then run the panel's power-on
    /// sequence: function set, display on, clear.
    pub fn init(gpio: &mut Gpio, cfg: LcdConfig) -> Result<Self> {
        gpio.setup_pin_direction(&cfg.register_select)?;
        gpio.setup_pin_direction(&cfg.enable)?;
        match &cfg.bus {
            DataBus::FourBit(pins) => {
                for pin in pins {
                    gpio.setup_pin_direction(pin)?;
                }
            }
            DataBus::EightBit(pins) => {
                for pin in pins {
                    gpio.setup_pin_direction(pin)?;
                }
            }
        }
        let lcd = Lcd {
            register_select: cfg.register_select,
            enable: cfg.enable,
            bus: cfg.bus,
        };
        match lcd.bus {
            DataBus::FourBit(_) => {
                lcd.send_command(gpio, CMD_INIT_4BIT_SEQ1)?;
                lcd.send_command(gpio, CMD_INIT_4BIT_SEQ2)?;
                lcd.send_command(gpio, CMD_FUNCTION_4BIT_2LINE)?;
            }
            DataBus::EightBit(_) => {
                lcd.send_command(gpio, CMD_FUNCTION_8BIT_2LINE)?;
            }
        }
        lcd.send_command(gpio, CMD_DISPLAY_ON)?;
        lcd.send_command(gpio, CMD_CLEAR)?;
        Ok(lcd)
    }

    /// Latch `bits` onto `pins` with one enable pulse. The register
    /// select level must already be set.
    fn pulse(&self, gpio: &mut Gpio, pins: &[PinConfig], bits: u8) -> Result<()> {
        gpio.write_pin(self.enable.port, self.enable.pin, Level::High)?;
        for (i, pin) in pins.iter().enumerate() {
            let level = if bits & (1 << i) != 0 { Level::High } else { Level::Low };
            gpio.write_pin(pin.port, pin.pin, level)?;
        }
        gpio.write_pin(self.enable.port, self.enable.pin, Level::Low)?;
        Ok(())
    }

    fn send(&self, gpio: &mut Gpio, byte: u8, rs: Level) -> Result<()> {
        gpio.write_pin(self.register_select.port, self.register_select.pin, rs)?;
        match &self.bus {
            DataBus::FourBit(pins) => {
                self.pulse(gpio, pins, byte >> 4)?;
                self.pulse(gpio, pins, byte & 0x0F)?;
            }
            DataBus::EightBit(pins) => {
                self.pulse(gpio, pins, byte)?;
            }
        }
        Ok(())
    }

    pub fn send_command(&self, gpio: &mut Gpio, command: u8) -> Result<()> {
        self.send(gpio, command, Level::Low)
    }

    pub fn display_char(&self, gpio: &mut Gpio, ch: char) -> Result<()> {
        self.send(gpio, ch as u8, Level::High)
    }

    pub fn display_string(&self, gpio: &mut Gpio, s: &str) -> Result<()> {
        for ch in s.chars() {
            self.display_char(gpio, ch)?;
        }
        Ok(())
    }

    /// Rows and columns are 1-based.
    pub fn move_cursor(&self, gpio: &mut Gpio, row: u8, column: u8) -> Result<()> {
        let offset = ROW_OFFSETS[((row.max(1) - 1) & 3) as usize];
        self.send_command(gpio, CMD_SET_DDRAM | (offset + column.max(1) - 1))
    }

    pub fn display_string_at(
        &self,
        gpio: &mut Gpio,
        row: u8,
        column: u8,
        s: &str,
    ) -> Result<()> {
        self.move_cursor(gpio, row, column)?;
        self.display_string(gpio, s)
    }

    pub fn display_number(&self, gpio: &mut Gpio, value: i32) -> Result<()> {
        self.display_string(gpio, &value.to_string())
    }

    pub fn clear(&self, gpio: &mut Gpio) -> Result<()> {
        self.send_command(gpio, CMD_CLEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmega32_core::gpio::{PinMode, Port};

    fn out(port: Port, pin: u8) -> PinConfig {
        PinConfig { port, pin, mode: PinMode::Output }
    }

    fn four_bit(gpio: &mut Gpio) -> Lcd {
        Lcd::init(gpio, LcdConfig {
            register_select: out(Port::D, 0),
            enable: out(Port::D, 1),
            bus: DataBus::FourBit([out(Port::A, 3), out(Port::A, 4), out(Port::A, 5), out(Port::A, 6)]),
        })
        .unwrap()
    }

    fn enable_pulses(trace: &[String]) -> usize {
        trace.iter().filter(|e| e.as_str() == "PD1=0").count()
    }

    fn bus_nibble(gpio: &Gpio) -> u8 {
        let mut bits = 0;
        for (i, pin) in [3u8, 4, 5, 6].iter().enumerate() {
            if gpio.read_pin(Port::A, *pin).unwrap().is_high() {
                bits |= 1 << i;
            }
        }
        bits
    }

    #[test]
    fn test_four_bit_init_sends_five_commands() {
        let mut gpio = Gpio::new();
        gpio.trace_enabled = true;
        let _lcd = four_bit(&mut gpio);
        // 5 commands, two enable pulses each
        assert_eq!(enable_pulses(&gpio.take_trace()), 10);
    }

    #[test]
    fn test_eight_bit_init_sends_three_commands() {
        let mut gpio = Gpio::new();
        gpio.trace_enabled = true;
        let _lcd = Lcd::init(&mut gpio, LcdConfig {
            register_select: out(Port::D, 0),
            enable: out(Port::D, 1),
            bus: DataBus::EightBit([
                out(Port::A, 0), out(Port::A, 1), out(Port::A, 2), out(Port::A, 3),
                out(Port::A, 4), out(Port::A, 5), out(Port::A, 6), out(Port::A, 7),
            ]),
        })
        .unwrap();
        assert_eq!(enable_pulses(&gpio.take_trace()), 3);
        // Last command latched was clear
        assert_eq!(gpio.read_port(Port::A) & 0xFF, CMD_CLEAR);
    }

    #[test]
    fn test_data_write_leaves_low_nibble_on_bus() {
        let mut gpio = Gpio::new();
        let lcd = four_bit(&mut gpio);
        lcd.display_char(&mut gpio, 'A').unwrap(); // 0x41
        assert_eq!(bus_nibble(&gpio), 0x1);
        assert_eq!(gpio.read_pin(Port::D, 0).unwrap(), Level::High); // RS stays data
    }

    #[test]
    fn test_cursor_addressing() {
        let mut gpio = Gpio::new();
        let lcd = four_bit(&mut gpio);
        lcd.move_cursor(&mut gpio, 2, 5).unwrap(); // 0x80 | (0x40 + 4) = 0xC4
        assert_eq!(bus_nibble(&gpio), 0x4);
        lcd.move_cursor(&mut gpio, 4, 1).unwrap(); // 0x80 | 0x50 = 0xD0
        assert_eq!(bus_nibble(&gpio), 0x0);
        assert_eq!(gpio.read_pin(Port::D, 0).unwrap(), Level::Low); // RS command
    }

    #[test]
    fn test_display_number_writes_digits() {
        let mut gpio = Gpio::new();
        gpio.trace_enabled = true;
        let lcd = four_bit(&mut gpio);
        gpio.take_trace();
        lcd.display_number(&mut gpio, -40).unwrap();
        // 3 characters, two pulses each
        assert_eq!(enable_pulses(&gpio.take_trace()), 6);
        assert_eq!(bus_nibble(&gpio), 0x0); // '0' = 0x30, low nibble 0
    }
}
