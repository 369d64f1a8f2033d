//! ATmega32 MCAL peripheral drivers over a host-testable register model.
//!
//! Each peripheral keeps a logical copy of its register file (control
//! registers as named-field structs with raw-bit conversions) and exposes
//! the driver API that firmware would call: validated `init` per mode
//! family, runtime setters, idempotent `deinit`, and explicit interrupt
//! dispatch that clears flags before running callbacks.
//!
//! Hardware events are driven from tests or a host loop: `advance()` moves
//! the timer counters by elapsed CPU cycles, `icp_edge()` feeds capture
//! edges, `set_external`/`inject_rx`/`set_channel_input` feed pins and
//! buses. [`Atmega32`] bundles one instance of everything and can be
//! snapshotted to a file (see [`snapshot`]).

pub mod error;
pub mod gpio;
pub mod peripherals;
pub mod snapshot;

pub use error::{Error, Result};
pub use gpio::Gpio;
pub use peripherals::{Adc, Callback, ClockSource, OcMode, Spi, Timer0, Timer1, Twi, Usart};
pub use snapshot::{McuState, SnapshotError};

/// System clock in Hz.
pub const CPU_FREQUENCY_HZ: u32 = 8_000_000;

/// Timer tick period in microseconds for a given prescaler divisor.
pub fn period_us(prescaler: u32) -> f64 {
    1_000_000.0 / (CPU_FREQUENCY_HZ as f64 / prescaler as f64)
}

/// The whole MCU peripheral model.
pub struct Atmega32 {
    pub gpio: Gpio,
    pub timer0: Timer0,
    pub timer1: Timer1,
    pub adc: Adc,
    pub spi: Spi,
    pub twi: Twi,
    pub usart: Usart,
}

impl Atmega32 {
    pub fn new() -> Self {
        Atmega32 {
            gpio: Gpio::new(),
            timer0: Timer0::new(),
            timer1: Timer1::new(),
            adc: Adc::new(),
            spi: Spi::new(),
            twi: Twi::new(),
            usart: Usart::new(),
        }
    }

    /// Power-on reset of every peripheral.
    pub fn reset(&mut self) {
        self.gpio.reset();
        self.timer0.reset();
        self.timer1.reset();
        self.adc.reset();
        self.spi.reset();
        self.twi.reset();
        self.usart.reset();
    }

    /// Advance both timers by elapsed CPU cycles and dispatch whatever
    /// became pending. Returns events dispatched.
    pub fn run(&mut self, cpu_cycles: u64) -> u32 {
        self.timer0.advance(cpu_cycles);
        self.timer1.advance(cpu_cycles);
        self.timer0.service_interrupts() + self.timer1.service_interrupts()
    }

    pub fn save_state(&self) -> McuState {
        McuState {
            gpio: self.gpio.save_state(),
            timer0: self.timer0.save_state(),
            timer1: self.timer1.save_state(),
            adc: self.adc.save_state(),
            spi: self.spi.save_state(),
            twi: self.twi.save_state(),
            usart: self.usart.save_state(),
        }
    }

    pub fn load_state(&mut self, s: &McuState) {
        self.gpio.load_state(&s.gpio);
        self.timer0.load_state(&s.timer0);
        self.timer1.load_state(&s.timer1);
        self.adc.load_state(&s.adc);
        self.spi.load_state(&s.spi);
        self.twi.load_state(&s.twi);
        self.usart.load_state(&s.usart);
    }
}

impl Default for Atmega32 {
    fn default() -> Self {
        Atmega32::new()
    }
}
