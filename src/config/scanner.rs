// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register dumper defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modbus::{ScanOptions, WordOrder};

/// Settings of a scan against a remote slave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// TCP host of the slave to scan.
    pub host: String,

    pub port: u16,

    /// Modbus unit id addressed by every request.
    pub unit_id: u8,

    /// Highest address scanned.
    pub max_address: u16,

    /// Registers per read request, at most 125.
    pub chunk_size: u16,

    /// Bound on connect and on every request.
    pub timeout_secs: u64,

    pub decode_floats: bool,

    /// Word order assumed when decoding floats. Must match the device.
    pub word_swap: bool,

    /// Bisect the rejected chunk to recover its readable prefix.
    pub refine_boundary: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 502,
            unit_id: 1,
            max_address: 1024,
            chunk_size: 100,
            timeout_secs: 3,
            decode_floats: false,
            word_swap: false,
            refine_boundary: true,
        }
    }
}

impl ScannerConfig {
    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            max_address: self.max_address,
            chunk_size: self.chunk_size,
            refine_boundary: self.refine_boundary,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn word_order(&self) -> WordOrder {
        WordOrder::from_word_swap(self.word_swap)
    }
}
