//! HAL device drivers for the ATmega32 peripheral model.
//!
//! Each driver is a plain value configured with the pins/channels it owns
//! and borrows the MCAL peripherals it needs per call, so one `Atmega32`
//! can back any mix of devices without globals.

pub mod buzzer;
pub mod dc_motor;
pub mod error;
pub mod ext_eeprom;
pub mod keypad;
pub mod lcd;
pub mod lm35;
pub mod ultrasonic;

pub use buzzer::Buzzer;
pub use dc_motor::{DcMotor, MotorState};
pub use error::DeviceError;
pub use ext_eeprom::ExtEeprom;
pub use keypad::Keypad;
pub use lcd::Lcd;
pub use lm35::Lm35;
pub use ultrasonic::Ultrasonic;
