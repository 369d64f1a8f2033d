//! Device-level errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// A bus transaction step reported the wrong status code.
    #[error("unexpected bus status {got:#04x} (expected {expected:#04x})")]
    Bus { expected: u8, got: u8 },

    #[error(transparent)]
    Core(#[from] atmega32_core::Error),
}
