// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus slave configuration
//!
//! This module defines the register layout of the slave and the binding
//! parameters of its TCP listener.

use serde::{Deserialize, Serialize};

use crate::modbus::{ParameterEncoding, ParameterLayout, WordOrder};

/// Configuration for the Modbus slave.
///
/// # Fields
///
/// * `address` - Network address the TCP listener binds to (default: 0.0.0.0)
/// * `port` - TCP port number (default: 502)
/// * `num_params` - Number of parameter slots exposed (default: 20)
/// * `registers_per_param` - Registers per slot, 2 for the float-only layout
/// * `reserve_registers` - Extra zeroed registers after the last slot (default: 100)
/// * `word_swap` - Store the low word of each float first
/// * `encoding` - Slot format, `float32` or the older `json_text`
///
/// # Example
///
/// ```
/// use rust_modbusinator::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     port: 1502,
///     num_params: 3,
///     ..ModbusConfig::default()
/// };
/// assert_eq!(modbus_config.layout().table_len(), Some(106));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// The network address the TCP listener binds to.
    ///
    /// Can be an IPv4/IPv6 address or a hostname.
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,

    /// The TCP port the listener binds to. 502 is the standard Modbus TCP port.
    pub port: u16,

    pub num_params: usize,

    pub registers_per_param: usize,

    pub reserve_registers: usize,

    /// Word order of every float in the table.
    ///
    /// Fixed for the lifetime of the table: flipping it after values were
    /// written makes every stored value read back wrong.
    pub word_swap: bool,

    pub encoding: ParameterEncoding,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 502,
            num_params: 20,
            registers_per_param: 2,
            reserve_registers: 100,
            word_swap: false,
            encoding: ParameterEncoding::Float32,
        }
    }
}

impl ModbusConfig {
    pub fn word_order(&self) -> WordOrder {
        WordOrder::from_word_swap(self.word_swap)
    }

    /// Parameter layout described by this configuration.
    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout {
            num_params: self.num_params,
            registers_per_param: self.registers_per_param,
            reserve_registers: self.reserve_registers,
            word_order: self.word_order(),
            encoding: self.encoding,
        }
    }
}
