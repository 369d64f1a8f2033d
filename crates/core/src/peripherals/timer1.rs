//! 16-bit Timer/Counter1 driver.
//!
//! Covers the full 4-bit WGM table: Normal mode with the input capture
//! unit, CTC on OCR1A or ICR1, and every PWM sub-mode (fixed 8/9/10-bit
//! TOP, TOP=ICR1, TOP=OCR1A). Compare channels A (OC1A = PD5) and
//! B (OC1B = PD4) are independently wired.
//!
//! Duty-cycle updates dispatch on the live WGM bits: when ICR1 holds the
//! period the duty goes to OCR1A; when OCR1A holds the period the duty
//! goes to OCR1B.

use crate::error::{Error, Result};
use crate::gpio::{Gpio, PinConfig, PinMode, Port};
use crate::snapshot::Timer1State;

use super::{Callback, ClockSource, OcMode};

/// OC1A output-compare pin.
pub const OC1A_PIN: PinConfig = PinConfig { port: Port::D, pin: 5, mode: PinMode::Output };
/// OC1B output-compare pin.
pub const OC1B_PIN: PinConfig = PinConfig { port: Port::D, pin: 4, mode: PinMode::Output };

/// Waveform generation mode (WGM13:10). Encoding 13 is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformMode {
    Normal,
    Pwm8BitPhaseCorrect,
    Pwm9BitPhaseCorrect,
    Pwm10BitPhaseCorrect,
    CtcOcr1a,
    FastPwm8Bit,
    FastPwm9Bit,
    FastPwm10Bit,
    PwmPhaseFreqCorrectIcr1,
    PwmPhaseFreqCorrectOcr1a,
    PwmPhaseCorrectIcr1,
    PwmPhaseCorrectOcr1a,
    CtcIcr1,
    FastPwmIcr1,
    FastPwmOcr1a,
}

impl WaveformMode {
    pub fn bits(self) -> u8 {
        match self {
            WaveformMode::Normal => 0,
            WaveformMode::Pwm8BitPhaseCorrect => 1,
            WaveformMode::Pwm9BitPhaseCorrect => 2,
            WaveformMode::Pwm10BitPhaseCorrect => 3,
            WaveformMode::CtcOcr1a => 4,
            WaveformMode::FastPwm8Bit => 5,
            WaveformMode::FastPwm9Bit => 6,
            WaveformMode::FastPwm10Bit => 7,
            WaveformMode::PwmPhaseFreqCorrectIcr1 => 8,
            WaveformMode::PwmPhaseFreqCorrectOcr1a => 9,
            WaveformMode::PwmPhaseCorrectIcr1 => 10,
            WaveformMode::PwmPhaseCorrectOcr1a => 11,
            WaveformMode::CtcIcr1 => 12,
            WaveformMode::FastPwmIcr1 => 14,
            WaveformMode::FastPwmOcr1a => 15,
        }
    }

    /// None for the reserved encoding 13.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits & 0xF {
            0 => WaveformMode::Normal,
            1 => WaveformMode::Pwm8BitPhaseCorrect,
            2 => WaveformMode::Pwm9BitPhaseCorrect,
            3 => WaveformMode::Pwm10BitPhaseCorrect,
            4 => WaveformMode::CtcOcr1a,
            5 => WaveformMode::FastPwm8Bit,
            6 => WaveformMode::FastPwm9Bit,
            7 => WaveformMode::FastPwm10Bit,
            8 => WaveformMode::PwmPhaseFreqCorrectIcr1,
            9 => WaveformMode::PwmPhaseFreqCorrectOcr1a,
            10 => WaveformMode::PwmPhaseCorrectIcr1,
            11 => WaveformMode::PwmPhaseCorrectOcr1a,
            12 => WaveformMode::CtcIcr1,
            13 => return None,
            14 => WaveformMode::FastPwmIcr1,
            _ => WaveformMode::FastPwmOcr1a,
        })
    }

    pub fn is_pwm(self) -> bool {
        !matches!(
            self,
            WaveformMode::Normal | WaveformMode::CtcOcr1a | WaveformMode::CtcIcr1
        )
    }

    fn is_ctc(self) -> bool {
        matches!(self, WaveformMode::CtcOcr1a | WaveformMode::CtcIcr1)
    }

    /// True when ICR1 holds the period (capture unit unusable).
    pub fn icr1_is_top(self) -> bool {
        matches!(
            self,
            WaveformMode::CtcIcr1
                | WaveformMode::FastPwmIcr1
                | WaveformMode::PwmPhaseCorrectIcr1
                | WaveformMode::PwmPhaseFreqCorrectIcr1
        )
    }

    fn ocr1a_is_top(self) -> bool {
        matches!(
            self,
            WaveformMode::CtcOcr1a
                | WaveformMode::FastPwmOcr1a
                | WaveformMode::PwmPhaseCorrectOcr1a
                | WaveformMode::PwmPhaseFreqCorrectOcr1a
        )
    }

    /// Counter TOP for this mode given the live period registers.
    pub fn top(self, ocr1a: u16, icr1: u16) -> u16 {
        match self {
            WaveformMode::Normal => 0xFFFF,
            WaveformMode::Pwm8BitPhaseCorrect | WaveformMode::FastPwm8Bit => 0xFF,
            WaveformMode::Pwm9BitPhaseCorrect | WaveformMode::FastPwm9Bit => 0x1FF,
            WaveformMode::Pwm10BitPhaseCorrect | WaveformMode::FastPwm10Bit => 0x3FF,
            m if m.icr1_is_top() => icr1,
            _ => ocr1a,
        }
    }
}

/// Input capture edge select (ICES1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSelect {
    Falling,
    Rising,
}

/// OC1A/OC1B behavior in PWM modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmPinMode {
    Disconnected,
    Toggle,
    NonInverting,
    Inverting,
}

impl PwmPinMode {
    pub fn bits(self) -> u8 {
        match self {
            PwmPinMode::Disconnected => 0,
            PwmPinMode::Toggle => 1,
            PwmPinMode::NonInverting => 2,
            PwmPinMode::Inverting => 3,
        }
    }
}

/// TCCR1A as named fields: COM1A1:0 | COM1B1:0 | FOC1A | FOC1B | WGM11:10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tccr1a {
    pub com1a: u8,
    pub com1b: u8,
    pub foc1a: bool,
    pub foc1b: bool,
    pub wgm11: bool,
    pub wgm10: bool,
}

impl Tccr1a {
    pub fn to_bits(self) -> u8 {
        ((self.com1a & 3) << 6)
            | ((self.com1b & 3) << 4)
            | ((self.foc1a as u8) << 3)
            | ((self.foc1b as u8) << 2)
            | ((self.wgm11 as u8) << 1)
            | (self.wgm10 as u8)
    }

    pub fn from_bits(b: u8) -> Self {
        Tccr1a {
            com1a: (b >> 6) & 3,
            com1b: (b >> 4) & 3,
            foc1a: b & 0x08 != 0,
            foc1b: b & 0x04 != 0,
            wgm11: b & 0x02 != 0,
            wgm10: b & 0x01 != 0,
        }
    }
}

/// TCCR1B as named fields: ICNC1 | ICES1 | – | WGM13:12 | CS12:10.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tccr1b {
    pub icnc1: bool,
    pub ices1: bool,
    pub wgm13: bool,
    pub wgm12: bool,
    pub cs1: u8,
}

impl Tccr1b {
    pub fn to_bits(self) -> u8 {
        ((self.icnc1 as u8) << 7)
            | ((self.ices1 as u8) << 6)
            | ((self.wgm13 as u8) << 4)
            | ((self.wgm12 as u8) << 3)
            | (self.cs1 & 7)
    }

    pub fn from_bits(b: u8) -> Self {
        Tccr1b {
            icnc1: b & 0x80 != 0,
            ices1: b & 0x40 != 0,
            wgm13: b & 0x10 != 0,
            wgm12: b & 0x08 != 0,
            cs1: b & 7,
        }
    }
}

pub struct OvfConfig {
    pub clock_source: ClockSource,
    pub capture_edge: EdgeSelect,
    pub noise_canceler: bool,
    pub overflow_interrupt: bool,
    pub capture_interrupt: bool,
    pub on_overflow: Option<Callback>,
    pub on_capture: Option<Callback>,
}

/// CTC period register selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtcTop {
    Ocr1a,
    Icr1,
}

pub struct CtcConfig {
    pub top: CtcTop,
    pub pin_mode_a: OcMode,
    pub pin_mode_b: OcMode,
    pub clock_source: ClockSource,
    pub compare_a_interrupt: bool,
    pub compare_b_interrupt: bool,
    pub on_compare_a: Option<Callback>,
    pub on_compare_b: Option<Callback>,
}

pub struct PwmConfig {
    pub waveform: WaveformMode,
    pub pin_mode_a: PwmPinMode,
    pub pin_mode_b: PwmPinMode,
    pub clock_source: ClockSource,
}

pub struct Timer1 {
    tccr1a: Tccr1a,
    tccr1b: Tccr1b,
    tcnt1: u16,
    ocr1a: u16,
    ocr1b: u16,
    icr1: u16,
    // TIMSK slice
    toie1: bool,
    ocie1a: bool,
    ocie1b: bool,
    ticie1: bool,
    // TIFR slice
    tov1: bool,
    ocf1a: bool,
    ocf1b: bool,
    icf1: bool,
    on_overflow: Option<Callback>,
    on_compare_a: Option<Callback>,
    on_compare_b: Option<Callback>,
    on_capture: Option<Callback>,
    // CPU cycles not yet consumed by the prescaler
    tick: u64,
    pub dbg_ovf_count: u32,
    pub dbg_dispatch_count: u32,
    pub trace_enabled: bool,
    trace: Vec<String>,
}

impl Timer1 {
    pub fn new() -> Self {
        Timer1 {
            tccr1a: Tccr1a::default(),
            tccr1b: Tccr1b::default(),
            tcnt1: 0,
            ocr1a: 0,
            ocr1b: 0,
            icr1: 0,
            toie1: false,
            ocie1a: false,
            ocie1b: false,
            ticie1: false,
            tov1: false,
            ocf1a: false,
            ocf1b: false,
            icf1: false,
            on_overflow: None,
            on_compare_a: None,
            on_compare_b: None,
            on_capture: None,
            tick: 0,
            dbg_ovf_count: 0,
            dbg_dispatch_count: 0,
            trace_enabled: false,
            trace: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        let trace_enabled = self.trace_enabled;
        *self = Timer1::new();
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

    fn set_wgm(&mut self, bits: u8) {
        self.tccr1a.wgm10 = bits & 1 != 0;
        self.tccr1a.wgm11 = bits & 2 != 0;
        self.tccr1b.wgm12 = bits & 4 != 0;
        self.tccr1b.wgm13 = bits & 8 != 0;
        self.trace("TCCR1.WGM");
    }

    // ─── Init / deinit ──────────────────────────────────────────────────────

    /// Normal mode with the input capture unit. Overflow and capture have
    /// independent enable/callback pairs.
    pub fn ovf_init(&mut self, cfg: OvfConfig) -> Result<()> {
        self.tccr1a.foc1a = true;
        self.tccr1a.foc1b = true;
        self.trace("TCCR1A.FOC");
        self.set_wgm(WaveformMode::Normal.bits());
        self.tccr1a.com1a = 0;
        self.tccr1a.com1b = 0;
        self.trace("TCCR1A.COM");
        self.tccr1b.icnc1 = cfg.noise_canceler;
        self.trace("TCCR1B.ICNC1");
        self.tccr1b.ices1 = cfg.capture_edge == EdgeSelect::Rising;
        self.trace("TCCR1B.ICES1");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.icr1 = 0;
        self.trace("ICR1");
        self.toie1 = cfg.overflow_interrupt;
        self.trace("TIMSK.TOIE1");
        self.ticie1 = cfg.capture_interrupt;
        self.trace("TIMSK.TICIE1");
        self.on_overflow = cfg.on_overflow;
        self.on_capture = cfg.on_capture;
        self.tccr1b.cs1 = cfg.clock_source.bits();
        self.trace("TCCR1B.CS");
        Ok(())
    }

    /// CTC on OCR1A or ICR1, compare channels A and B independently wired.
    pub fn ctc_init(&mut self, gpio: &mut Gpio, cfg: CtcConfig) -> Result<()> {
        self.tccr1a.foc1a = true;
        self.tccr1a.foc1b = true;
        self.trace("TCCR1A.FOC");
        let mode = match cfg.top {
            CtcTop::Ocr1a => WaveformMode::CtcOcr1a,
            CtcTop::Icr1 => WaveformMode::CtcIcr1,
        };
        self.set_wgm(mode.bits());
        self.tccr1a.com1a = cfg.pin_mode_a.bits();
        self.tccr1a.com1b = cfg.pin_mode_b.bits();
        self.trace("TCCR1A.COM");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.ocr1a = 0;
        self.trace("OCR1A");
        self.ocr1b = 0;
        self.trace("OCR1B");
        self.icr1 = 0;
        self.trace("ICR1");
        if cfg.pin_mode_a != OcMode::Disconnected {
            gpio.setup_pin_direction(&OC1A_PIN)?;
        }
        if cfg.pin_mode_b != OcMode::Disconnected {
            gpio.setup_pin_direction(&OC1B_PIN)?;
        }
        self.ocie1a = cfg.compare_a_interrupt;
        self.trace("TIMSK.OCIE1A");
        self.ocie1b = cfg.compare_b_interrupt;
        self.trace("TIMSK.OCIE1B");
        self.on_compare_a = cfg.on_compare_a;
        self.on_compare_b = cfg.on_compare_b;
        self.tccr1b.cs1 = cfg.clock_source.bits();
        self.trace("TCCR1B.CS");
        Ok(())
    }

    /// Any PWM waveform from the WGM table. Rejects Normal/CTC waveforms.
    pub fn pwm_init(&mut self, gpio: &mut Gpio, cfg: PwmConfig) -> Result<()> {
        if !cfg.waveform.is_pwm() {
            return Err(Error::NotPwm(cfg.waveform));
        }
        self.tccr1a.foc1a = false;
        self.tccr1a.foc1b = false;
        self.trace("TCCR1A.FOC");
        self.set_wgm(cfg.waveform.bits());
        self.tccr1a.com1a = cfg.pin_mode_a.bits();
        self.tccr1a.com1b = cfg.pin_mode_b.bits();
        self.trace("TCCR1A.COM");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.ocr1a = 0;
        self.trace("OCR1A");
        self.ocr1b = 0;
        self.trace("OCR1B");
        self.icr1 = 0;
        self.trace("ICR1");
        if cfg.pin_mode_a != PwmPinMode::Disconnected {
            gpio.setup_pin_direction(&OC1A_PIN)?;
        }
        if cfg.pin_mode_b != PwmPinMode::Disconnected {
            gpio.setup_pin_direction(&OC1B_PIN)?;
        }
        self.pwm_start(0);
        self.tccr1b.cs1 = cfg.clock_source.bits();
        self.trace("TCCR1B.CS");
        Ok(())
    }

    /// Tears down Normal-mode wiring: counter, capture register, both
    /// interrupt enables and both handlers. Idempotent.
    pub fn ovf_deinit(&mut self) {
        self.tccr1a = Tccr1a::default();
        self.trace("TCCR1A");
        self.tccr1b = Tccr1b::default();
        self.trace("TCCR1B");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.icr1 = 0;
        self.trace("ICR1");
        self.toie1 = false;
        self.trace("TIMSK.TOIE1");
        self.ticie1 = false;
        self.trace("TIMSK.TICIE1");
        self.on_overflow = None;
        self.on_capture = None;
    }

    /// Narrower than `ovf_deinit`: only the capture unit is unwired; the
    /// counter and overflow side keep running.
    pub fn icu_deinit(&mut self) {
        self.icr1 = 0;
        self.trace("ICR1");
        self.ticie1 = false;
        self.trace("TIMSK.TICIE1");
        self.on_capture = None;
    }

    pub fn ctc_deinit(&mut self) {
        self.tccr1a = Tccr1a::default();
        self.trace("TCCR1A");
        self.tccr1b = Tccr1b::default();
        self.trace("TCCR1B");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.ocr1a = 0;
        self.trace("OCR1A");
        self.ocr1b = 0;
        self.trace("OCR1B");
        self.icr1 = 0;
        self.trace("ICR1");
        self.ocie1a = false;
        self.trace("TIMSK.OCIE1A");
        self.ocie1b = false;
        self.trace("TIMSK.OCIE1B");
        self.on_compare_a = None;
        self.on_compare_b = None;
    }

    pub fn pwm_deinit(&mut self) {
        self.tccr1a = Tccr1a::default();
        self.trace("TCCR1A");
        self.tccr1b = Tccr1b::default();
        self.trace("TCCR1B");
        self.tcnt1 = 0;
        self.trace("TCNT1");
        self.ocr1a = 0;
        self.trace("OCR1A");
        self.ocr1b = 0;
        self.trace("OCR1B");
        self.icr1 = 0;
        self.trace("ICR1");
    }

    // ─── Runtime setters ────────────────────────────────────────────────────

    pub fn set_timer_value(&mut self, value: u16) {
        self.tcnt1 = value;
        self.trace("TCNT1");
    }

    pub fn set_compare_a_value(&mut self, value: u16) {
        self.ocr1a = value;
        self.trace("OCR1A");
    }

    pub fn set_compare_b_value(&mut self, value: u16) {
        self.ocr1b = value;
        self.trace("OCR1B");
    }

    /// Period register for the TOP=ICR1 modes.
    pub fn set_input_capture_value(&mut self, value: u16) {
        self.icr1 = value;
        self.trace("ICR1");
    }

    /// Capture edge can be flipped at any time (echo-pulse measurement
    /// flips it between the rising and falling edge).
    pub fn set_edge_detection_type(&mut self, edge: EdgeSelect) {
        self.tccr1b.ices1 = edge == EdgeSelect::Rising;
        self.trace("TCCR1B.ICES1");
    }

    pub fn input_capture_value(&self) -> u16 {
        self.icr1
    }

    pub fn set_overflow_callback(&mut self, cb: Callback) {
        self.on_overflow = Some(cb);
    }

    pub fn set_capture_callback(&mut self, cb: Callback) {
        self.on_capture = Some(cb);
    }

    pub fn set_compare_a_callback(&mut self, cb: Callback) {
        self.on_compare_a = Some(cb);
    }

    pub fn set_compare_b_callback(&mut self, cb: Callback) {
        self.on_compare_b = Some(cb);
    }

    /// Duty cycle in percent of the active mode's period; values above 100
    /// saturate. The target compare register follows the WGM bits: modes
    /// with TOP=ICR1 drive OCR1A, modes with TOP=OCR1A drive OCR1B, and the
    /// fixed-TOP modes drive OCR1A. Not a PWM mode: no-op.
    pub fn pwm_start(&mut self, duty_percent: u8) {
        let Some(mode) = self.waveform() else { return };
        if !mode.is_pwm() {
            return;
        }
        let duty = duty_percent.min(100) as f64 / 100.0;
        let scale = |top: u16| (duty * top as f64).round() as u16;
        if mode.icr1_is_top() {
            self.ocr1a = scale(self.icr1);
            self.trace("OCR1A");
        } else if mode.ocr1a_is_top() {
            self.ocr1b = scale(self.ocr1a);
            self.trace("OCR1B");
        } else {
            self.ocr1a = scale(mode.top(self.ocr1a, self.icr1));
            self.trace("OCR1A");
        }
    }

    // ─── Hardware model ─────────────────────────────────────────────────────

    pub fn waveform(&self) -> Option<WaveformMode> {
        let bits = ((self.tccr1b.wgm13 as u8) << 3)
            | ((self.tccr1b.wgm12 as u8) << 2)
            | ((self.tccr1a.wgm11 as u8) << 1)
            | (self.tccr1a.wgm10 as u8);
        WaveformMode::from_bits(bits)
    }

    /// Advance the counter by elapsed CPU cycles, wrapping at the active
    /// mode's TOP and raising the corresponding flags.
    pub fn advance(&mut self, cpu_cycles: u64) {
        let Some(prescale) = ClockSource::from_bits(self.tccr1b.cs1).prescale() else {
            return;
        };
        self.tick += cpu_cycles;
        let interval = self.tick / prescale as u64;
        self.tick %= prescale as u64;
        if interval == 0 {
            return;
        }
        let Some(mode) = self.waveform() else { return };

        let top = mode.top(self.ocr1a, self.icr1) as u64;
        let span = top + 1;
        let old = self.tcnt1 as u64;
        let new = old + interval;
        let wraps = new / span;

        if wraps > 0 {
            self.dbg_ovf_count += wraps as u32;
            if !mode.is_ctc() {
                self.tov1 = true;
            }
            if mode == WaveformMode::CtcOcr1a {
                self.ocf1a = true;
            }
            if self.ocr1a > 0 && mode != WaveformMode::CtcOcr1a && self.ocr1a as u64 <= top {
                self.ocf1a = true;
            }
            if self.ocr1b > 0 && self.ocr1b as u64 <= top {
                self.ocf1b = true;
            }
        } else {
            if self.ocr1a > 0 && old < self.ocr1a as u64 && new >= self.ocr1a as u64 {
                self.ocf1a = true;
            }
            if self.ocr1b > 0 && old < self.ocr1b as u64 && new >= self.ocr1b as u64 {
                self.ocf1b = true;
            }
        }
        self.tcnt1 = (new % span) as u16;
    }

    /// Edge on the ICP1 pin. Latches TCNT1 into ICR1 when the edge matches
    /// ICES1 and ICR1 is not serving as the period register.
    pub fn icp_edge(&mut self, rising: bool) {
        match self.waveform() {
            Some(mode) if !mode.icr1_is_top() => {}
            _ => return,
        }
        if rising != self.tccr1b.ices1 {
            return;
        }
        self.icr1 = self.tcnt1;
        self.icf1 = true;
    }

    /// Dispatch pending, enabled interrupts; each flag is cleared before
    /// its callback runs, and an event with no callback is still consumed.
    /// Priority: capture, compare A, compare B, overflow.
    pub fn service_interrupts(&mut self) -> u32 {
        let mut fired = 0;
        if self.icf1 && self.ticie1 {
            self.icf1 = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_capture.as_mut() {
                cb();
            }
        }
        if self.ocf1a && self.ocie1a {
            self.ocf1a = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_compare_a.as_mut() {
                cb();
            }
        }
        if self.ocf1b && self.ocie1b {
            self.ocf1b = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_compare_b.as_mut() {
                cb();
            }
        }
        if self.tov1 && self.toie1 {
            self.tov1 = false;
            fired += 1;
            self.dbg_dispatch_count += 1;
            if let Some(cb) = self.on_overflow.as_mut() {
                cb();
            }
        }
        fired
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn counter_value(&self) -> u16 {
        self.tcnt1
    }

    pub fn compare_a_value(&self) -> u16 {
        self.ocr1a
    }

    pub fn compare_b_value(&self) -> u16 {
        self.ocr1b
    }

    pub fn tccr1a(&self) -> Tccr1a {
        self.tccr1a
    }

    pub fn tccr1b(&self) -> Tccr1b {
        self.tccr1b
    }

    pub fn clock_source(&self) -> ClockSource {
        ClockSource::from_bits(self.tccr1b.cs1)
    }

    pub fn overflow_pending(&self) -> bool {
        self.tov1
    }

    pub fn compare_a_pending(&self) -> bool {
        self.ocf1a
    }

    pub fn compare_b_pending(&self) -> bool {
        self.ocf1b
    }

    pub fn capture_pending(&self) -> bool {
        self.icf1
    }

    pub fn overflow_interrupt_enabled(&self) -> bool {
        self.toie1
    }

    pub fn capture_interrupt_enabled(&self) -> bool {
        self.ticie1
    }

    pub fn has_capture_callback(&self) -> bool {
        self.on_capture.is_some()
    }

    pub fn has_overflow_callback(&self) -> bool {
        self.on_overflow.is_some()
    }

    pub fn clear_overflow_flag(&mut self) {
        self.tov1 = false;
    }

    pub fn clear_capture_flag(&mut self) {
        self.icf1 = false;
    }

    pub fn dbg_info(&self) -> String {
        format!(
            "tccr1a={:02X} tccr1b={:02X} cnt={} ocra={} ocrb={} icr={} tov={} ocfa={} ocfb={} icf={} dispatches={}",
            self.tccr1a.to_bits(), self.tccr1b.to_bits(), self.tcnt1, self.ocr1a,
            self.ocr1b, self.icr1, self.tov1, self.ocf1a, self.ocf1b, self.icf1,
            self.dbg_dispatch_count
        )
    }

    // ─── Save state ─────────────────────────────────────────────────────────

    /// Capture register state. Callbacks are not captured; re-register
    /// after a load.
    pub fn save_state(&self) -> Timer1State {
        Timer1State {
            tccr1a: self.tccr1a.to_bits(),
            tccr1b: self.tccr1b.to_bits(),
            tcnt1: self.tcnt1,
            ocr1a: self.ocr1a,
            ocr1b: self.ocr1b,
            icr1: self.icr1,
            toie1: self.toie1,
            ocie1a: self.ocie1a,
            ocie1b: self.ocie1b,
            ticie1: self.ticie1,
            tov1: self.tov1,
            ocf1a: self.ocf1a,
            ocf1b: self.ocf1b,
            icf1: self.icf1,
            tick: self.tick,
        }
    }

    pub fn load_state(&mut self, s: &Timer1State) {
        self.tccr1a = Tccr1a::from_bits(s.tccr1a);
        self.tccr1b = Tccr1b::from_bits(s.tccr1b);
        self.tcnt1 = s.tcnt1;
        self.ocr1a = s.ocr1a;
        self.ocr1b = s.ocr1b;
        self.icr1 = s.icr1;
        self.toie1 = s.toie1;
        self.ocie1a = s.ocie1a;
        self.ocie1b = s.ocie1b;
        self.ticie1 = s.ticie1;
        self.tov1 = s.tov1;
        self.ocf1a = s.ocf1a;
        self.ocf1b = s.ocf1b;
        self.icf1 = s.icf1;
        self.tick = s.tick;
    }
}

impl Default for Timer1 {
    fn default() -> Self {
        Timer1::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn count_cb(counter: &Arc<AtomicU32>) -> Callback {
        let c = counter.clone();
        Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_waveform_bits_round_trip() {
        for bits in 0..16u8 {
            match WaveformMode::from_bits(bits) {
                Some(m) => assert_eq!(m.bits(), bits),
                None => assert_eq!(bits, 13),
            }
        }
    }

    #[test]
    fn test_tccr1_bit_round_trip() {
        let a = Tccr1a { com1a: 2, com1b: 3, foc1a: true, foc1b: false, wgm11: true, wgm10: false };
        assert_eq!(Tccr1a::from_bits(a.to_bits()), a);
        let b = Tccr1b { icnc1: true, ices1: false, wgm13: true, wgm12: false, cs1: 5 };
        assert_eq!(Tccr1b::from_bits(b.to_bits()), b);
    }

    #[test]
    fn test_pwm_init_rejects_non_pwm_waveform() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        let err = t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::Normal,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        });
        assert_eq!(err, Err(crate::error::Error::NotPwm(WaveformMode::Normal)));
        // Nothing started
        assert_eq!(t.clock_source(), ClockSource::Stopped);
    }

    #[test]
    fn test_fast_pwm_icr1_duty_drives_ocr1a() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        }).unwrap();
        t.set_input_capture_value(20_000);
        t.pwm_start(25);
        assert_eq!(t.compare_a_value(), 5_000);
        assert!(gpio.is_output(Port::D, 5));
        assert!(!gpio.is_output(Port::D, 4));
    }

    #[test]
    fn test_fast_pwm_ocr1a_top_duty_drives_ocr1b() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmOcr1a,
            pin_mode_a: PwmPinMode::Toggle,
            pin_mode_b: PwmPinMode::NonInverting,
            clock_source: ClockSource::Div1,
        }).unwrap();
        t.set_compare_a_value(1_000);
        t.pwm_start(40);
        assert_eq!(t.compare_b_value(), 400);
        // Channel A keeps the period
        assert_eq!(t.compare_a_value(), 1_000);
    }

    #[test]
    fn test_fixed_top_pwm_duty() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwm9Bit,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div64,
        }).unwrap();
        t.pwm_start(50);
        assert_eq!(t.compare_a_value(), 256); // round(0.5 * 0x1FF)
        t.pwm_start(100);
        assert_eq!(t.compare_a_value(), 0x1FF);
    }

    #[test]
    fn test_phase_correct_duty_laws_match_fast() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::PwmPhaseFreqCorrectIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        }).unwrap();
        t.set_input_capture_value(10_000);
        t.pwm_start(75);
        assert_eq!(t.compare_a_value(), 7_500);
    }

    #[test]
    fn test_duty_clamps_above_100() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        }).unwrap();
        t.set_input_capture_value(8_000);
        t.pwm_start(130);
        assert_eq!(t.compare_a_value(), 8_000);
    }

    #[test]
    fn test_init_writes_clock_source_last() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.trace_enabled = true;

        t.ovf_init(OvfConfig {
            clock_source: ClockSource::Div8,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: false,
            overflow_interrupt: true,
            capture_interrupt: true,
            on_overflow: None,
            on_capture: None,
        }).unwrap();
        assert_eq!(t.take_trace().last().map(String::as_str), Some("TCCR1B.CS"));

        t.ctc_init(&mut gpio, CtcConfig {
            top: CtcTop::Ocr1a,
            pin_mode_a: OcMode::Toggle,
            pin_mode_b: OcMode::Disconnected,
            clock_source: ClockSource::Div64,
            compare_a_interrupt: true,
            compare_b_interrupt: false,
            on_compare_a: None,
            on_compare_b: None,
        }).unwrap();
        assert_eq!(t.take_trace().last().map(String::as_str), Some("TCCR1B.CS"));

        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        }).unwrap();
        assert_eq!(t.take_trace().last().map(String::as_str), Some("TCCR1B.CS"));
    }

    #[test]
    fn test_ctc_channels_are_independent() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        let a_hits = Arc::new(AtomicU32::new(0));
        let b_hits = Arc::new(AtomicU32::new(0));
        t.ctc_init(&mut gpio, CtcConfig {
            top: CtcTop::Ocr1a,
            pin_mode_a: OcMode::Disconnected,
            pin_mode_b: OcMode::Disconnected,
            clock_source: ClockSource::Div1,
            compare_a_interrupt: true,
            compare_b_interrupt: false, // B unwired
            on_compare_a: Some(count_cb(&a_hits)),
            on_compare_b: Some(count_cb(&b_hits)),
        }).unwrap();
        t.set_compare_a_value(1_000);
        t.set_compare_b_value(500);
        t.advance(1_000);
        t.service_interrupts();
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 0);
        // B's flag raised but not dispatched while masked
        assert!(t.compare_b_pending());
        assert!(!t.compare_a_pending());
    }

    #[test]
    fn test_ctc_toggle_claims_oc1a_only() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.ctc_init(&mut gpio, CtcConfig {
            top: CtcTop::Ocr1a,
            pin_mode_a: OcMode::Toggle,
            pin_mode_b: OcMode::Disconnected,
            clock_source: ClockSource::Div8,
            compare_a_interrupt: false,
            compare_b_interrupt: false,
            on_compare_a: None,
            on_compare_b: None,
        }).unwrap();
        assert!(gpio.is_output(Port::D, 5));
        assert!(!gpio.is_output(Port::D, 4));
        assert_eq!(t.tccr1a().com1a, 1);
    }

    #[test]
    fn test_capture_latches_on_selected_edge_only() {
        let mut t = Timer1::new();
        let captures = Arc::new(AtomicU32::new(0));
        t.ovf_init(OvfConfig {
            clock_source: ClockSource::Div1,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: true,
            overflow_interrupt: false,
            capture_interrupt: true,
            on_overflow: None,
            on_capture: Some(count_cb(&captures)),
        }).unwrap();

        t.advance(1_234);
        t.icp_edge(false); // wrong edge, ignored
        assert!(!t.capture_pending());
        assert_eq!(t.input_capture_value(), 0);

        t.icp_edge(true);
        assert!(t.capture_pending());
        assert_eq!(t.input_capture_value(), 1_234);

        t.service_interrupts();
        assert_eq!(captures.load(Ordering::SeqCst), 1);

        // Latched value survives further counting until the next edge
        t.advance(500);
        assert_eq!(t.input_capture_value(), 1_234);
    }

    #[test]
    fn test_capture_disabled_when_icr1_is_top() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div1,
        }).unwrap();
        t.set_input_capture_value(5_000);
        t.advance(100);
        t.icp_edge(true);
        assert_eq!(t.input_capture_value(), 5_000); // period register untouched
        assert!(!t.capture_pending());
    }

    #[test]
    fn test_edge_select_flips_at_runtime() {
        let mut t = Timer1::new();
        t.ovf_init(OvfConfig {
            clock_source: ClockSource::Div1,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: false,
            overflow_interrupt: false,
            capture_interrupt: true,
            on_overflow: None,
            on_capture: None,
        }).unwrap();
        t.set_edge_detection_type(EdgeSelect::Falling);
        t.advance(42);
        t.icp_edge(false);
        assert_eq!(t.input_capture_value(), 42);
    }

    #[test]
    fn test_overflow_at_16_bit_boundary() {
        let mut t = Timer1::new();
        t.ovf_init(OvfConfig {
            clock_source: ClockSource::Div1,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: false,
            overflow_interrupt: true,
            capture_interrupt: false,
            on_overflow: None,
            on_capture: None,
        }).unwrap();
        t.advance(0xFFFF);
        assert!(!t.overflow_pending());
        t.advance(1);
        assert!(t.overflow_pending());
        assert_eq!(t.counter_value(), 0);
    }

    #[test]
    fn test_icu_deinit_is_narrower_than_ovf_deinit() {
        let mut t = Timer1::new();
        t.ovf_init(OvfConfig {
            clock_source: ClockSource::Div8,
            capture_edge: EdgeSelect::Rising,
            noise_canceler: false,
            overflow_interrupt: true,
            capture_interrupt: true,
            on_overflow: Some(Box::new(|| {})),
            on_capture: Some(Box::new(|| {})),
        }).unwrap();

        t.icu_deinit();
        assert!(!t.capture_interrupt_enabled());
        assert!(!t.has_capture_callback());
        // Overflow side untouched, counter still clocked
        assert!(t.overflow_interrupt_enabled());
        assert!(t.has_overflow_callback());
        assert_eq!(t.clock_source(), ClockSource::Div8);

        t.ovf_deinit();
        assert!(!t.overflow_interrupt_enabled());
        assert!(!t.has_overflow_callback());
        assert_eq!(t.clock_source(), ClockSource::Stopped);

        // Idempotent, safe without init
        t.ovf_deinit();
        t.icu_deinit();
        t.ctc_deinit();
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut gpio = Gpio::new();
        let mut t = Timer1::new();
        t.pwm_init(&mut gpio, PwmConfig {
            waveform: WaveformMode::FastPwmIcr1,
            pin_mode_a: PwmPinMode::NonInverting,
            pin_mode_b: PwmPinMode::Disconnected,
            clock_source: ClockSource::Div8,
        }).unwrap();
        t.set_input_capture_value(20_000);
        t.pwm_start(50);
        let s = t.save_state();
        let mut t2 = Timer1::new();
        t2.load_state(&s);
        assert_eq!(t2.waveform(), Some(WaveformMode::FastPwmIcr1));
        assert_eq!(t2.compare_a_value(), 10_000);
        assert_eq!(t2.input_capture_value(), 20_000);
    }
}
