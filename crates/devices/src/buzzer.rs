//! Active buzzer on a single output pin (PC7 on the reference board).

use atmega32_core::gpio::{Gpio, Level, PinConfig, PinMode, Port};

use crate::error::Result;

pub const DEFAULT_PIN: PinConfig = PinConfig { port: Port::C, pin: 7, mode: PinMode::Output };

pub struct Buzzer {
    pin: PinConfig,
}

impl Buzzer {
    /// Claim the pin and start silent.
    pub fn init(gpio: &mut Gpio, pin: PinConfig) -> Result<Self> {
        gpio.setup_pin_direction(&pin)?;
        gpio.write_pin(pin.port, pin.pin, Level::Low)?;
        Ok(Buzzer { pin })
    }

    pub fn on(&self, gpio: &mut Gpio) -> Result<()> {
        gpio.write_pin(self.pin.port, self.pin.pin, Level::High)?;
        Ok(())
    }

    pub fn off(&self, gpio: &mut Gpio) -> Result<()> {
        gpio.write_pin(self.pin.port, self.pin.pin, Level::Low)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buzzer_drives_pc7() {
        let mut gpio = Gpio::new();
        let buzzer = Buzzer::init(&mut gpio, DEFAULT_PIN).unwrap();
        assert!(gpio.is_output(Port::C, 7));
        assert_eq!(gpio.read_pin(Port::C, 7).unwrap(), Level::Low);
        buzzer.on(&mut gpio).unwrap();
        assert_eq!(gpio.read_pin(Port::C, 7).unwrap(), Level::High);
        buzzer.off(&mut gpio).unwrap();
        assert_eq!(gpio.read_pin(Port::C, 7).unwrap(), Level::Low);
    }
}
