//! DC motor behind an H-bridge: two direction pins, optional Timer0 PWM
//! for speed control.

use atmega32_core::gpio::{Gpio, Level, PinConfig};
use atmega32_core::Timer0;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stop,
    Clockwise,
    AntiClockwise,
}

pub struct DcMotorConfig {
    pub pins: [PinConfig; 2],
}

pub struct DcMotor {
    pins: [PinConfig; 2],
}

impl DcMotor {
    /// Claim both direction pins and start stopped.
    pub fn init(gpio: &mut Gpio, cfg: DcMotorConfig) -> Result<Self> {
        gpio.setup_pin_direction(&cfg.pins[0])?;
        gpio.setup_pin_direction(&cfg.pins[1])?;
        let motor = DcMotor { pins: cfg.pins };
        motor.rotate(gpio, MotorState::Stop)?;
        Ok(motor)
    }

    /// Full-speed drive: direction pins only.
    pub fn rotate(&self, gpio: &mut Gpio, state: MotorState) -> Result<()> {
        let (a, b) = match state {
            MotorState::Stop => (Level::Low, Level::Low),
            MotorState::Clockwise => (Level::High, Level::Low),
            MotorState::AntiClockwise => (Level::Low, Level::High),
        };
        gpio.write_pin(self.pins[0].port, self.pins[0].pin, a)?;
        gpio.write_pin(self.pins[1].port, self.pins[1].pin, b)?;
        Ok(())
    }

    /// Drive with a Timer0 PWM duty as speed; stopping forces duty 0.
    pub fn rotate_with_pwm(
        &self,
        gpio: &mut Gpio,
        timer0: &mut Timer0,
        state: MotorState,
        speed_percent: u8,
    ) -> Result<()> {
        self.rotate(gpio, state)?;
        let duty = if state == MotorState::Stop { 0 } else { speed_percent };
        timer0.pwm_start(duty);
        Ok(())
    }
}
