//! Driver configuration errors.
//!
//! Setters stay infallible; only `init`-time validation and out-of-range
//! indices can fail.

use thiserror::Error;

use crate::gpio::Port;
use crate::peripherals::timer1::WaveformMode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("pin {pin} out of range for port {port:?} (valid 0-7)")]
    InvalidPin { port: Port, pin: u8 },

    #[error("ADC channel {0} out of range (valid 0-7)")]
    InvalidAdcChannel(u8),

    #[error("waveform mode {0:?} does not generate PWM")]
    NotPwm(WaveformMode),
}
