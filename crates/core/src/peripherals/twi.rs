//! TWI (I2C) master driver.
//!
//! Tracks bus phases (start, SLA, data) and reports the datasheet status
//! codes after each operation, so callers can run the usual
//! check-status-after-every-step protocol. The wire itself is modeled as
//! an event log plus an injectable read queue.

use std::collections::VecDeque;

use crate::snapshot::TwiState;
use crate::CPU_FREQUENCY_HZ;

// Master status codes (prescaler 1, TWSR upper bits).
pub const TW_START: u8 = 0x08;
pub const TW_REP_START: u8 = 0x10;
pub const TW_MT_SLA_ACK: u8 = 0x18;
pub const TW_MT_DATA_ACK: u8 = 0x28;
pub const TW_MR_SLA_ACK: u8 = 0x40;
pub const TW_MR_DATA_ACK: u8 = 0x50;
pub const TW_MR_DATA_NACK: u8 = 0x58;
/// No relevant state (bus idle).
pub const TW_NO_INFO: u8 = 0xF8;

/// Observable bus activity, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwiEvent {
    Start,
    RepeatedStart,
    Stop,
    Write(u8),
    ReadAck(u8),
    ReadNack(u8),
}

pub struct TwiConfig {
    /// Desired SCL frequency in Hz.
    pub scl_hz: u32,
}

pub struct Twi {
    twen: bool,
    twbr: u8,
    status: u8,
    started: bool,
    // Next write is a slave address, not data
    sla_phase: bool,
    events: Vec<TwiEvent>,
    rx_queue: VecDeque<u8>,
}

impl Twi {
    pub fn new() -> Self {
        Twi {
            twen: false,
            twbr: 0,
            status: TW_NO_INFO,
            started: false,
            sla_phase: false,
            events: Vec::new(),
            rx_queue: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Twi::new();
    }

    pub fn init(&mut self, cfg: TwiConfig) {
        self.set_bit_rate(cfg.scl_hz);
        self.twen = true;
    }

    pub fn deinit(&mut self) {
        self.twen = false;
        self.started = false;
        self.status = TW_NO_INFO;
    }

    /// TWBR from the SCL target: SCL = F_CPU / (16 + 2·TWBR) at prescaler 1.
    pub fn set_bit_rate(&mut self, scl_hz: u32) {
        let twbr = (CPU_FREQUENCY_HZ / scl_hz).saturating_sub(16) / 2;
        self.twbr = twbr.min(255) as u8;
    }

    /// Issue a (repeated) start condition.
    pub fn start(&mut self) {
        self.status = if self.started { TW_REP_START } else { TW_START };
        self.events.push(if self.started {
            TwiEvent::RepeatedStart
        } else {
            TwiEvent::Start
        });
        self.started = true;
        self.sla_phase = true;
    }

    pub fn stop(&mut self) {
        self.events.push(TwiEvent::Stop);
        self.started = false;
        self.sla_phase = false;
        self.status = TW_NO_INFO;
    }

    /// Shift out one byte. Directly after a start this is SLA+R/W and the
    /// status reflects the address ACK; afterwards it is data.
    pub fn write_byte(&mut self, byte: u8) {
        self.events.push(TwiEvent::Write(byte));
        if self.sla_phase {
            self.status = if byte & 1 != 0 { TW_MR_SLA_ACK } else { TW_MT_SLA_ACK };
            self.sla_phase = false;
        } else {
            self.status = TW_MT_DATA_ACK;
        }
    }

    /// Read one byte, replying with ACK (more to come).
    pub fn read_byte_ack(&mut self) -> u8 {
        let b = self.rx_queue.pop_front().unwrap_or(0xFF);
        self.events.push(TwiEvent::ReadAck(b));
        self.status = TW_MR_DATA_ACK;
        b
    }

    /// Read one byte, replying with NACK (last byte).
    pub fn read_byte_nack(&mut self) -> u8 {
        let b = self.rx_queue.pop_front().unwrap_or(0xFF);
        self.events.push(TwiEvent::ReadNack(b));
        self.status = TW_MR_DATA_NACK;
        b
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn enabled(&self) -> bool {
        self.twen
    }

    pub fn bit_rate_register(&self) -> u8 {
        self.twbr
    }

    /// Queue bytes a slave will return on reads.
    pub fn inject_rx(&mut self, bytes: &[u8]) {
        self.rx_queue.extend(bytes);
    }

    pub fn take_events(&mut self) -> Vec<TwiEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn save_state(&self) -> TwiState {
        TwiState {
            twen: self.twen,
            twbr: self.twbr,
            status: self.status,
            started: self.started,
            sla_phase: self.sla_phase,
        }
    }

    pub fn load_state(&mut self, s: &TwiState) {
        self.twen = s.twen;
        self.twbr = s.twbr;
        self.status = s.status;
        self.started = s.started;
        self.sla_phase = s.sla_phase;
    }
}

impl Default for Twi {
    fn default() -> Self {
        Twi::new()
    }
}
