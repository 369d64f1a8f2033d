//! MCAL peripheral drivers.
//!
//! Each driver owns its slice of the register file (control registers as
//! named-field structs, mask/flag bits as bools) plus the callbacks wired
//! at init time. Types shared by more than one timer live here.

pub mod adc;
pub mod spi;
pub mod timer0;
pub mod timer1;
pub mod twi;
pub mod uart;

pub use adc::Adc;
pub use spi::Spi;
pub use timer0::Timer0;
pub use timer1::Timer1;
pub use twi::Twi;
pub use uart::Usart;

/// Interrupt handler slot. Owned by the peripheral; replacing and invoking
/// both need `&mut`, so a swap can never race a dispatch.
pub type Callback = Box<dyn FnMut() + Send>;

/// Clock select field (CS02:00 / CS12:10).
///
/// External sources clock from the Tn pin and do not advance the host
/// counting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Stopped,
    Div1,
    Div8,
    Div64,
    Div256,
    Div1024,
    ExtFalling,
    ExtRising,
}

impl ClockSource {
    pub fn bits(self) -> u8 {
        match self {
            ClockSource::Stopped => 0,
            ClockSource::Div1 => 1,
            ClockSource::Div8 => 2,
            ClockSource::Div64 => 3,
            ClockSource::Div256 => 4,
            ClockSource::Div1024 => 5,
            ClockSource::ExtFalling => 6,
            ClockSource::ExtRising => 7,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => ClockSource::Stopped,
            1 => ClockSource::Div1,
            2 => ClockSource::Div8,
            3 => ClockSource::Div64,
            4 => ClockSource::Div256,
            5 => ClockSource::Div1024,
            6 => ClockSource::ExtFalling,
            _ => ClockSource::ExtRising,
        }
    }

    /// Prescaler divisor, or None when stopped / externally clocked.
    pub fn prescale(self) -> Option<u32> {
        match self {
            ClockSource::Div1 => Some(1),
            ClockSource::Div8 => Some(8),
            ClockSource::Div64 => Some(64),
            ClockSource::Div256 => Some(256),
            ClockSource::Div1024 => Some(1024),
            _ => None,
        }
    }
}

/// Compare-output pin behavior in non-PWM modes (COM bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcMode {
    Disconnected,
    Toggle,
    Clear,
    Set,
}

impl OcMode {
    pub fn bits(self) -> u8 {
        match self {
            OcMode::Disconnected => 0,
            OcMode::Toggle => 1,
            OcMode::Clear => 2,
            OcMode::Set => 3,
        }
    }
}
