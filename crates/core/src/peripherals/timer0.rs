//! 8-bit Timer/Counter0 driver.
//!
//! Three waveform families behind one driver: Normal (overflow timing),
//! CTC (compare match), and PWM (fast or phase-correct) on OC0 = PB3.
//! Every init writes the clock-select field last, so the counter only
//! starts once the rest of the configuration is in place.
//!
//! Interrupt dispatch clears the hardware flag before running the
//! registered callback, matching the write-1-to-clear ISR discipline.

use crate::error::Result;
use crate::gpio::{Gpio, PinConfig, PinMode, Port};
use crate::snapshot::Timer0State;

use super::{Callback, ClockSource, OcMode};

/// OC0 output-compare pin.
pub const OC0_PIN: PinConfig = PinConfig { port: Port::B, pin: 3, mode: PinMode::Output };

/// Counter TOP in the fixed-TOP modes.
pub const TOP: u8 = 0xFF;

/// PWM waveform shape (WGM01:00 = 11 fast, 01 phase-correct).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmWaveform {
    Fast,
    PhaseCorrect,
}

/// OC0 behavior in PWM modes. Toggle is reserved on this timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmPinMode {
    Disconnected,
    NonInverting,
    Inverting,
}

impl PwmPinMode {
    pub fn bits(self) -> u8 {
        match self {
            PwmPinMode::Disconnected => 0,
            PwmPinMode::NonInverting => 2,
            PwmPinMode::Inverting => 3,
        }
    }
}

/// TCCR0 as named fields.
///
/// Layout: FOC0 | WGM00 | COM01:00 | WGM01 | CS02:00.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tccr0 {
    pub foc0: bool,
    pub wgm00: bool,
    pub wgm01: bool,
    pub com0: u8,
    pub cs0: u8,
}

impl Tccr0 {
    pub fn to_bits(self) -> u8 {
        ((self.foc0 as u8) << 7)
            | ((self.wgm00 as u8) << 6)
            | ((self.com0 & 3) << 4)
            | ((self.wgm01 as u8) << 3)
            | (self.cs0 & 7)
    }

    pub fn from_bits(b: u8) -> Self {
        Tccr0 {
            foc0: b & 0x80 != 0,
            wgm00: b & 0x40 != 0,
            com0: (b >> 4) & 3,
            wgm01: b & 0x08 != 0,
            cs0: b & 7,
        }
    }
}

pub struct OvfConfig {
    pub clock_source: ClockSource,
    pub interrupt_enable: bool,
    pub on_overflow: Option<Callback>,
}

pub struct CtcConfig {
    pub pin_mode: OcMode,
    pub clock_source: ClockSource,
    pub interrupt_enable: bool,
    pub on_compare: Option<Callback>,
}

pub struct PwmConfig {
    pub waveform: PwmWaveform,
    pub pin_mode: PwmPinMode,
    pub clock_source: ClockSource,
}

pub struct Timer0 {
    tccr0: Tccr0,
    tcnt0: u8,
    ocr0: u8,
    // TIMSK slice
    toie0: bool,
    ocie0: bool,
    // TIFR slice
    tov0: bool,
    ocf0: bool,
    on_overflow: Option<Callback>,
    on_compare: Option<Callback>,
    // CPU cycles not yet consumed by the prescaler
    tick: u64,
    // Debug counters
    pub dbg_ovf_count: u32,
    pub dbg_dispatch_count: u32,
    pub trace_enabled: bool,
    trace: Vec<String>,
}

impl Timer0 {
    pub fn new() -> Self {
        Timer0 {
            tccr0: Tccr0::default(),
            tcnt0: 0,
            ocr0: 0,
            toie0: false,
            ocie0: false,
            tov0: false,
            ocf0: false,
            on_overflow: None,
            on_compare: None,
            tick: 0,
            dbg_ovf_count: 0,
            dbg_dispatch_count: 0,
            trace_enabled: false,
            trace: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        let trace_enabled = self.trace_enabled;
        *self = Timer0::new();
        self.trace_enabled = trace_enabled;
    }

    fn trace(&mut self, reg: &str) {
        if self.trace_enabled {
            self.trace.push(reg.to_string());
        }
    }

    pub fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }

    // ─── Init / deinit ──────────────────────────────────────────────────────

    /// Normal mode: free-running counter with overflow at 0xFF.
    pub fn ovf_init(&mut self, cfg: OvfConfig) -> Result<()> {
        self.tccr0.foc0 = true;
        self.trace("TCCR0.FOC0");
        self.tccr0.wgm00 = false;
        self.tccr0.wgm01 = false;
        self.trace("TCCR0.WGM");
        self.tccr0.com0 = 0;
        self.trace("TCCR0.COM");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        self.toie0 = cfg.interrupt_enable;
        self.trace("TIMSK.TOIE0");
        self.on_overflow = cfg.on_overflow;
        // Clock source last: the counter must not run half-configured
        self.tccr0.cs0 = cfg.clock_source.bits();
        self.trace("TCCR0.CS");
        Ok(())
    }

    /// CTC mode: counter clears on compare match with OCR0.
    pub fn ctc_init(&mut self, gpio: &mut Gpio, cfg: CtcConfig) -> Result<()> {
        self.tccr0.foc0 = true;
        self.trace("TCCR0.FOC0");
        self.tccr0.wgm00 = false;
        self.tccr0.wgm01 = true;
        self.trace("TCCR0.WGM");
        self.tccr0.com0 = cfg.pin_mode.bits();
        self.trace("TCCR0.COM");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        self.ocr0 = 0;
        self.trace("OCR0");
        if cfg.pin_mode != OcMode::Disconnected {
            gpio.setup_pin_direction(&OC0_PIN)?;
        }
        self.ocie0 = cfg.interrupt_enable;
        self.trace("TIMSK.OCIE0");
        self.on_compare = cfg.on_compare;
        self.tccr0.cs0 = cfg.clock_source.bits();
        self.trace("TCCR0.CS");
        Ok(())
    }

    /// PWM mode, fast or phase-correct, TOP fixed at 0xFF.
    pub fn pwm_init(&mut self, gpio: &mut Gpio, cfg: PwmConfig) -> Result<()> {
        self.tccr0.foc0 = false;
        self.trace("TCCR0.FOC0");
        self.tccr0.wgm00 = true;
        self.tccr0.wgm01 = cfg.waveform == PwmWaveform::Fast;
        self.trace("TCCR0.WGM");
        self.tccr0.com0 = cfg.pin_mode.bits();
        self.trace("TCCR0.COM");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        gpio.setup_pin_direction(&OC0_PIN)?;
        self.pwm_start(0);
        self.tccr0.cs0 = cfg.clock_source.bits();
        self.trace("TCCR0.CS");
        Ok(())
    }

    /// Stops the counter and unwires the overflow interrupt. Safe to call
    /// repeatedly or without a prior init.
    pub fn ovf_deinit(&mut self) {
        self.tccr0 = Tccr0::default();
        self.trace("TCCR0");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        self.toie0 = false;
        self.trace("TIMSK.TOIE0");
        self.on_overflow = None;
    }

    pub fn ctc_deinit(&mut self) {
        self.tccr0 = Tccr0::default();
        self.trace("TCCR0");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        self.ocr0 = 0;
        self.trace("OCR0");
        self.ocie0 = false;
        self.trace("TIMSK.OCIE0");
        self.on_compare = None;
    }

    pub fn pwm_deinit(&mut self) {
        self.tccr0 = Tccr0::default();
        self.trace("TCCR0");
        self.tcnt0 = 0;
        self.trace("TCNT0");
        self.ocr0 = 0;
        self.trace("OCR0");
    }

    // ─── Runtime setters ────────────────────────────────────────────────────

    pub fn set_timer_value(&mut self, value: u8) {
        self.tcnt0 = value;
        self.trace("TCNT0");
    }

    pub fn set_compare_value(&mut self, value: u8) {
        self.ocr0 = value;
        self.trace("OCR0");
    }

    pub fn set_overflow_callback(&mut self, cb: Callback) {
        self.on_overflow = Some(cb);
    }

    pub fn set_compare_callback(&mut self, cb: Callback) {
        self.on_compare = Some(cb);
    }

    /// Duty cycle in percent of the 0xFF period; values above 100 saturate.
    pub fn pwm_start(&mut self, duty_percent: u8) {
        let duty = duty_percent.min(100) as f64;
        self.ocr0 = ((duty / 100.0) * TOP as f64).round() as u8;
        self.trace("OCR0");
    }

    // ─── Hardware model ─────────────────────────────────────────────────────

    fn mode(&self) -> u8 {
        ((self.tccr0.wgm01 as u8) << 1) | (self.tccr0.wgm00 as u8)
    }

    /// Advance the counter by elapsed CPU cycles. Wraps at the mode's TOP,
    /// raising TOV0 (non-CTC) or OCF0 (CTC) flags as hardware would.
    pub fn advance(&mut self, cpu_cycles: u64) {
        let Some(prescale) = ClockSource::from_bits(self.tccr0.cs0).prescale() else {
            return;
        };
        self.tick += cpu_cycles;
        let interval = self.tick / prescale as u64;
        self.tick %= prescale as u64;
        if interval == 0 {
            return;
        }

        // CTC wraps at OCR0; everything else at 0xFF
        let ctc = self.mode() == 2;
        let top = if ctc && self.ocr0 > 0 { self.ocr0 as u64 } else { TOP as u64 };
        let span = top + 1;

        let old = self.tcnt0 as u64;
        let new = old + interval;
        let wraps = new / span;

        if ctc {
            if wraps > 0 {
                self.ocf0 = true;
            }
        } else {
            if wraps > 0 {
                self.tov0 = true;
                self.dbg_ovf_count += wraps as u32;
            }
            if self.ocr0 > 0 && (wraps > 0 || (old < self.ocr0 as u64 && new >= self.ocr0 as u64)) {
                self.ocf0 = true;
            }
        }
        self.tcnt0 = (new % span) as u8;
    }

    /// Dispatch pending, enabled interrupts. The flag is cleared before the
    /// callback runs; an event with no callback is still consumed.
    /// Priority: compare match, then overflow. Returns events dispatched.
    pub fn service_interrupts(&mut self) -> u32 {
        let mut fired = 0;
        if self.ocf0 && self.ocie0 {
            self.ocf0 = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_compare.as_mut() {
                cb();
            }
        }
        if self.tov0 && self.toie0 {
            self.tov0 = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_overflow.as_mut() {
                cb();
            }
        }
        fired
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn counter_value(&self) -> u8 {
        self.tcnt0
    }

    pub fn compare_value(&self) -> u8 {
        self.ocr0
    }

    pub fn tccr0(&self) -> Tccr0 {
        self.tccr0
    }

    pub fn clock_source(&self) -> ClockSource {
        ClockSource::from_bits(self.tccr0.cs0)
    }

    pub fn overflow_pending(&self) -> bool {
        self.tov0
    }

    pub fn compare_pending(&self) -> bool {
        self.ocf0
    }

    pub fn overflow_interrupt_enabled(&self) -> bool {
        self.toie0
    }

    pub fn compare_interrupt_enabled(&self) -> bool {
        self.ocie0
    }

    pub fn has_overflow_callback(&self) -> bool {
        self.on_overflow.is_some()
    }

    pub fn has_compare_callback(&self) -> bool {
        self.on_compare.is_some()
    }

    /// Write-1-to-clear analog for the overflow flag.
    pub fn clear_overflow_flag(&mut self) {
        self.tov0 = false;
    }

    pub fn clear_compare_flag(&mut self) {
        self.ocf0 = false;
    }

    pub fn dbg_info(&self) -> String {
        format!(
            "tccr0={:02X} cnt={} ocr={} toie={} ocie={} tov={} ocf={} dispatches={}",
            self.tccr0.to_bits(), self.tcnt0, self.ocr0, self.toie0, self.ocie0,
            self.tov0, self.ocf0, self.dbg_dispatch_count
        )
    }

    // ─── Save state ─────────────────────────────────────────────────────────

    /// Capture register state. Callbacks are not captured; re-register
    /// after a load.
    pub fn save_state(&self) -> Timer0State {
        Timer0State {
            tccr0: self.tccr0.to_bits(),
            tcnt0: self.tcnt0,
            ocr0: self.ocr0,
            toie0: self.toie0,
            ocie0: self.ocie0,
            tov0: self.tov0,
            ocf0: self.ocf0,
            tick: self.tick,
        }
    }

    pub fn load_state(&mut self, s: &Timer0State) {
        self.tccr0 = Tccr0::from_bits(s.tccr0);
        self.tcnt0 = s.tcnt0;
        self.ocr0 = s.ocr0;
        self.toie0 = s.toie0;
        self.ocie0 = s.ocie0;
        self.tov0 = s.tov0;
        self.ocf0 = s.ocf0;
        self.tick = s.tick;
    }
}

impl Default for Timer0 {
    fn default() -> Self {
        Timer0::new()
    }
}
