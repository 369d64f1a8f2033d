//! 4x4 matrix keypad with active-low row scanning.
//!
//! Columns are pull-up inputs and idle high; each row is driven low in
//! turn and a low column reveals the pressed key. Rows are returned to
//! high-impedance inputs between scans so multiple keypads can share a
//! port with other loads.

use atmega32_core::gpio::{Gpio, Level, PinConfig, PinMode};

use crate::error::Result;

pub const ROWS: usize = 4;
pub const COLUMNS: usize = 4;

/// Key legend of the Proteus calculator keypad used on the reference
/// board.
pub const PROTEUS_LAYOUT: [[char; COLUMNS]; ROWS] = [
    ['7', '8', '9', '/'],
    ['4', '5', '6', '*'],
    ['1', '2', '3', '-'],
    ['C', '0', '=', '+'],
];

pub struct KeypadConfig {
    pub rows: [PinConfig; ROWS],
    pub columns: [PinConfig; COLUMNS],
    pub layout: [[char; COLUMNS]; ROWS],
}

pub struct Keypad {
    rows: [PinConfig; ROWS],
    columns: [PinConfig; COLUMNS],
    layout: [[char; COLUMNS]; ROWS],
}

impl Keypad {
    /// Rows start as plain inputs, columns as pull-up inputs.
    pub fn init(gpio: &mut Gpio, cfg: KeypadConfig) -> Result<Self> {
        for row in &cfg.rows {
            gpio.setup_pin_direction(&PinConfig { mode: PinMode::Input, ..*row })?;
        }
        for col in &cfg.columns {
            gpio.setup_pin_direction(&PinConfig { mode: PinMode::InputPullUp, ..*col })?;
        }
        Ok(Keypad {
            rows: cfg.rows,
            columns: cfg.columns,
            layout: cfg.layout,
        })
    }

    /// Drive one row low and look for a low column.
    fn scan_row(&self, gpio: &mut Gpio, row: usize) -> Result<Option<char>> {
        let r = &self.rows[row];
        gpio.setup_pin_direction(&PinConfig { mode: PinMode::Output, ..*r })?;
        gpio.write_pin(r.port, r.pin, Level::Low)?;

        let mut hit = None;
        for (c, col) in self.columns.iter().enumerate() {
            if !gpio.read_pin(col.port, col.pin)?.is_high() {
                hit = Some(self.layout[row][c]);
                break;
            }
        }

        gpio.setup_pin_direction(&PinConfig { mode: PinMode::Input, ..*r })?;
        Ok(hit)
    }

    /// One full scan pass; `None` when nothing is pressed.
    pub fn get_key(&self, gpio: &mut Gpio) -> Result<Option<char>> {
        for row in 0..ROWS {
            if let Some(key) = self.scan_row(gpio, row)? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmega32_core::gpio::Port;

    fn pin(port: Port, pin: u8) -> PinConfig {
        PinConfig { port, pin, mode: PinMode::Input }
    }

    fn keypad(gpio: &mut Gpio) -> Keypad {
        Keypad::init(gpio, KeypadConfig {
            rows: [pin(Port::B, 4), pin(Port::B, 5), pin(Port::B, 6), pin(Port::B, 7)],
            columns: [pin(Port::B, 0), pin(Port::B, 1), pin(Port::B, 2), pin(Port::B, 3)],
            layout: PROTEUS_LAYOUT,
        })
        .unwrap()
    }

    /// Emulates the switch closing: the key's column goes low while its
    /// row is scanned.
    fn press(gpio: &mut Gpio, keypad: &Keypad, row: usize, col: usize) -> Option<char> {
        let c = &keypad.columns[col];
        gpio.set_external(c.port, c.pin, Level::Low).unwrap();
        let key = keypad.scan_row(gpio, row).unwrap();
        gpio.set_external(c.port, c.pin, Level::High).unwrap();
        key
    }

    #[test]
    fn test_idle_keypad_reads_none() {
        let mut gpio = Gpio::new();
        let keypad = keypad(&mut gpio);
        assert_eq!(keypad.get_key(&mut gpio).unwrap(), None);
    }

    #[test]
    fn test_each_corner_key_decodes() {
        let mut gpio = Gpio::new();
        let keypad = keypad(&mut gpio);
        assert_eq!(press(&mut gpio, &keypad, 0, 0), Some('7'));
        assert_eq!(press(&mut gpio, &keypad, 0, 3), Some('/'));
        assert_eq!(press(&mut gpio, &keypad, 3, 0), Some('C'));
        assert_eq!(press(&mut gpio, &keypad, 3, 3), Some('+'));
    }

    #[test]
    fn test_rows_restored_to_inputs_after_scan() {
        let mut gpio = Gpio::new();
        let keypad = keypad(&mut gpio);
        keypad.get_key(&mut gpio).unwrap();
        for row in &keypad.rows {
            assert!(!gpio.is_output(row.port, row.pin));
        }
    }
}
