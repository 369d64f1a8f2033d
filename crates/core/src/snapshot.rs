//! MCU state snapshots.
//!
//! Captures the whole peripheral model to a file using bincode
//! serialization with deflate compression. Callbacks are never part of a
//! snapshot; re-register them after a load.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "M32S"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Magic bytes identifying a snapshot file.
const MAGIC: &[u8; 4] = b"M32S";
/// Current snapshot format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot file too small")]
    TooSmall,
    #[error("invalid snapshot file (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Encode(String),
    #[error("deserialize error: {0}")]
    Decode(String),
    #[error("decompress error: {0}")]
    Inflate(String),
}

// ─── Per-peripheral state structs ───────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct GpioState {
    pub ddr: [u8; 4],
    pub port: [u8; 4],
    pub ext: [u8; 4],
}

#[derive(Serialize, Deserialize)]
pub struct Timer0State {
    pub tccr0: u8,
    pub tcnt0: u8,
    pub ocr0: u8,
    pub toie0: bool,
    pub ocie0: bool,
    pub tov0: bool,
    pub ocf0: bool,
    pub tick: u64,
}

#[derive(Serialize, Deserialize)]
pub struct Timer1State {
    pub tccr1a: u8,
    pub tccr1b: u8,
    pub tcnt1: u16,
    pub ocr1a: u16,
    pub ocr1b: u16,
    pub icr1: u16,
    pub toie1: bool,
    pub ocie1a: bool,
    pub ocie1b: bool,
    pub ticie1: bool,
    pub tov1: bool,
    pub ocf1a: bool,
    pub ocf1b: bool,
    pub icf1: bool,
    pub tick: u64,
}

#[derive(Serialize, Deserialize)]
pub struct AdcState {
    pub reference_bits: u8,
    pub prescaler_bits: u8,
    pub left_adjust: bool,
    pub auto_trigger: bool,
    pub aden: bool,
    pub adsc: bool,
    pub adif: bool,
    pub adie: bool,
    pub channel: u8,
    pub data: u16,
}

#[derive(Serialize, Deserialize)]
pub struct SpiState {
    pub spe: bool,
    pub master: bool,
    pub lsb_first: bool,
    pub cpol: bool,
    pub cpha: bool,
    pub rate_bits: u8,
    pub spif: bool,
}

#[derive(Serialize, Deserialize)]
pub struct TwiState {
    pub twen: bool,
    pub twbr: u8,
    pub status: u8,
    pub started: bool,
    pub sla_phase: bool,
}

#[derive(Serialize, Deserialize)]
pub struct UsartState {
    pub ubrr: u16,
    pub u2x: bool,
    pub rxen: bool,
    pub txen: bool,
    pub parity_bits: u8,
    pub two_stop_bits: bool,
    pub char_size_bits: u8,
    pub rxcie: bool,
    pub rxc: bool,
    pub txc: bool,
}

// ─── Top-level snapshot ─────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct McuState {
    pub gpio: GpioState,
    pub timer0: Timer0State,
    pub timer1: Timer1State,
    pub adc: AdcState,
    pub spi: SpiState,
    pub twi: TwiState,
    pub usart: UsartState,
}

// ─── Encoding and file I/O ──────────────────────────────────────────────────

pub fn to_bytes(state: &McuState) -> Result<Vec<u8>, SnapshotError> {
    let payload = bincode::serialize(state).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

pub fn from_bytes(data: &[u8]) -> Result<McuState, SnapshotError> {
    if data.len() < 8 {
        return Err(SnapshotError::TooSmall);
    }
    if &data[0..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
        .map_err(|e| SnapshotError::Inflate(format!("{:?}", e)))?;

    bincode::deserialize(&decompressed).map_err(|e| SnapshotError::Decode(e.to_string()))
}

pub fn save_to_file(state: &McuState, path: &Path) -> Result<(), SnapshotError> {
    let bytes = to_bytes(state)?;
    std::fs::write(path, &bytes)?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<McuState, SnapshotError> {
    let data = std::fs::read(path)?;
    from_bytes(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Atmega32;

    #[test]
    fn test_bytes_round_trip() {
        let mut mcu = Atmega32::new();
        mcu.gpio.setup_port_direction(crate::gpio::Port::A, 0x0F);
        mcu.gpio.write_port(crate::gpio::Port::A, 0x05);
        mcu.timer0.set_timer_value(77);
        mcu.timer1.set_input_capture_value(4_321);
        let bytes = to_bytes(&mcu.save_state()).unwrap();

        let restored = from_bytes(&bytes).unwrap();
        let mut mcu2 = Atmega32::new();
        mcu2.load_state(&restored);
        assert_eq!(mcu2.timer0.counter_value(), 77);
        assert_eq!(mcu2.timer1.input_capture_value(), 4_321);
        assert_eq!(mcu2.gpio.read_port(crate::gpio::Port::A), 0x05);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mcu = Atmega32::new();
        let mut bytes = to_bytes(&mcu.save_state()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(from_bytes(&bytes), Err(SnapshotError::BadMagic)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mcu = Atmega32::new();
        let mut bytes = to_bytes(&mcu.save_state()).unwrap();
        bytes[4] = 9;
        assert!(matches!(
            from_bytes(&bytes),
            Err(SnapshotError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_input_rejected() {
        assert!(matches!(from_bytes(b"M32"), Err(SnapshotError::TooSmall)));
    }
}
