// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register encodings
//!
//! ## Float32
//!
//! A value is narrowed to an IEEE-754 single, serialized big-endian and
//! split into two 16-bit words:
//!
//! | Bytes | Word |
//! |-------|------|
//! | 0..2  | most-significant word (MSW) |
//! | 2..4  | least-significant word (LSW) |
//!
//! [`WordOrder`] decides which word lands in the first register of the
//! pair. Byte order inside a word never changes. Decoding with the wrong
//! order yields a different float, not an error, so the order must be fixed
//! per device.
//!
//! ## Text block
//!
//! The older slot format stores UTF-8 text (a small JSON object) two bytes
//! per register, big-endian, NUL padded to the slot size.

use serde::{Deserialize, Serialize};

/// Placement of the two 16-bit halves of a 32-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    /// `[MSW, LSW]`, what most devices expect.
    #[default]
    HighWordFirst,
    /// `[LSW, MSW]`, the "word swapped" layout some device families need.
    LowWordFirst,
}

impl WordOrder {
    /// Map the `word_swap` configuration flag onto an order.
    pub fn from_word_swap(word_swap: bool) -> Self {
        if word_swap {
            WordOrder::LowWordFirst
        } else {
            WordOrder::HighWordFirst
        }
    }

    pub fn is_swapped(self) -> bool {
        self == WordOrder::LowWordFirst
    }
}

/// Encode `value` into a register pair.
///
/// The value is narrowed to `f32` first; precision beyond single precision
/// is lost.
pub fn encode_f32(value: f64, order: WordOrder) -> [u16; 2] {
    let bytes = (value as f32).to_be_bytes();
    let msw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let lsw = u16::from_be_bytes([bytes[2], bytes[3]]);
    match order {
        WordOrder::HighWordFirst => [msw, lsw],
        WordOrder::LowWordFirst => [lsw, msw],
    }
}

/// Decode a register pair written with `order`.
///
/// Every 32-bit pattern is a valid `f32` (NaN and infinities included),
/// so `None` is only returned for a pair that could not be reassembled.
pub fn decode_f32(registers: [u16; 2], order: WordOrder) -> Option<f32> {
    let (msw, lsw) = match order {
        WordOrder::HighWordFirst => (registers[0], registers[1]),
        WordOrder::LowWordFirst => (registers[1], registers[0]),
    };
    let mut bytes = [0u8; 4];
    bytes[..2].copy_from_slice(&msw.to_be_bytes());
    bytes[2..].copy_from_slice(&lsw.to_be_bytes());
    Some(f32::from_be_bytes(bytes))
}

/// Decode the pair at the start of `registers`, if there is one.
pub fn decode_f32_slice(registers: &[u16], order: WordOrder) -> Option<f32> {
    match registers {
        [first, second, ..] => decode_f32([*first, *second], order),
        _ => None,
    }
}

/// Pack `text` into exactly `register_count` registers.
///
/// Text longer than the slot is cut at `register_count * 2` bytes, shorter
/// text is padded with NUL bytes.
pub fn encode_text_block(text: &str, register_count: usize) -> Vec<u16> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(register_count * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Inverse of [`encode_text_block`]: trailing NULs and surrounding
/// whitespace are dropped, invalid UTF-8 (e.g. a cut multi-byte char) is
/// replaced.
pub fn decode_text_block(registers: &[u16]) -> String {
    let bytes: Vec<u8> = registers.iter().flat_map(|r| r.to_be_bytes()).collect();
    String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
