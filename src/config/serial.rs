// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Serial line configuration
//!
//! Shared by the slave's RTU listener and the dumper's serial mode.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SerialParity {
    None,
    #[default]
    Even,
    Odd,
}

impl SerialParity {
    fn letter(self) -> char {
        match self {
            SerialParity::None => 'N',
            SerialParity::Even => 'E',
            SerialParity::Odd => 'O',
        }
    }
}

/// Serial port settings, 8E1 at 19200 baud by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Open the RTU listener next to the TCP one.
    pub enabled: bool,

    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,

    pub baud_rate: u32,

    pub parity: SerialParity,

    /// 5 to 8
    pub data_bits: u8,

    /// 1 or 2
    pub stop_bits: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 19200,
            parity: SerialParity::Even,
            data_bits: 8,
            stop_bits: 1,
        }
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {}{}{}",
            self.port,
            self.baud_rate,
            self.data_bits,
            self.parity.letter(),
            self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_line_notation() {
        assert_eq!(
            SerialConfig::default().to_string(),
            "/dev/ttyUSB0 @ 19200 8E1"
        );
    }
}
