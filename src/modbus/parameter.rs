// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Parameter slots and update payloads
//!
//! A parameter is a logical slot `i` of `registers_per_param` registers
//! starting at `i * registers_per_param`. Parameters are not stored on
//! their own: writing one rewrites its whole slot in the [`RegisterTable`].
//!
//! ## Update payload
//!
//! The application feeds values as JSON text in one of these shapes:
//!
//! ```text
//! 25.34
//! {"v": 25.34, "ts": 1739999999}
//! [25.34, {"v": 26.1}, 27]
//! ```
//!
//! A missing `"v"` means `0.0`. Entries beyond `num_params` are dropped.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{decode_f32_slice, decode_text_block, encode_f32, encode_text_block, WordOrder};
use super::error::ModbusError;
use super::register_table::RegisterTable;

/// How a parameter value is laid out inside its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterEncoding {
    /// IEEE-754 single in the first two registers, rest of the slot zeroed.
    #[default]
    Float32,
    /// `{"ts":..,"v":..}` as UTF-8 text over the whole slot.
    JsonText,
}

/// One normalized entry of an update payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameter {
    pub value: f64,
    pub timestamp: Option<i64>,
}

impl Parameter {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            timestamp: None,
        }
    }
}

/// Accepted shapes of a single payload entry.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PayloadEntry {
    Scalar(f64),
    Object { v: Option<f64>, ts: Option<i64> },
}

impl TryFrom<&Value> for PayloadEntry {
    type Error = ModbusError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n.as_f64().map(PayloadEntry::Scalar).ok_or_else(|| {
                shape_error(format!("number {n} is not representable as a float"))
            }),
            Value::Object(map) => {
                let v = match map.get("v") {
                    None | Some(Value::Null) => None,
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(other) => {
                        return Err(shape_error(format!("\"v\" must be numeric, got {other}")))
                    }
                };
                let ts = match map.get("ts") {
                    None | Some(Value::Null) => None,
                    Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                    Some(other) => {
                        return Err(shape_error(format!("\"ts\" must be numeric, got {other}")))
                    }
                };
                Ok(PayloadEntry::Object { v, ts })
            }
            other => Err(shape_error(format!(
                "expected a number or an object with a \"v\" field, got {other}"
            ))),
        }
    }
}

impl From<PayloadEntry> for Parameter {
    fn from(entry: PayloadEntry) -> Self {
        match entry {
            PayloadEntry::Scalar(value) => Parameter::new(value),
            PayloadEntry::Object { v, ts } => Parameter {
                value: v.unwrap_or(0.0),
                timestamp: ts,
            },
        }
    }
}

fn shape_error(reason: String) -> ModbusError {
    ModbusError::PayloadParse { reason }
}

/// Parse an update payload into an ordered list of parameters.
///
/// A payload that is not a list is treated as a one-element list. Syntax
/// errors and unsupported shapes (strings, booleans, nested lists,
/// non-numeric `"v"`) are both reported as [`ModbusError::PayloadParse`].
pub fn parse_payload(payload: &str) -> Result<Vec<Parameter>, ModbusError> {
    let value: Value = serde_json::from_str(payload)?;
    let entries = match &value {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };
    entries
        .into_iter()
        .map(|entry| PayloadEntry::try_from(entry).map(Parameter::from))
        .collect()
}

/// Geometry of the parameter area of a register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    pub num_params: usize,
    pub registers_per_param: usize,
    pub reserve_registers: usize,
    pub word_order: WordOrder,
    pub encoding: ParameterEncoding,
}

impl ParameterLayout {
    /// Float-only layout: two registers per parameter, no reserve.
    pub fn float32(num_params: usize, word_order: WordOrder) -> Self {
        Self {
            num_params,
            registers_per_param: 2,
            reserve_registers: 0,
            word_order,
            encoding: ParameterEncoding::Float32,
        }
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.num_params == 0 {
            return Err(ModbusError::configuration("num_params must be greater than 0"));
        }
        if self.registers_per_param < 2 {
            return Err(ModbusError::configuration(format!(
                "registers_per_param must be at least 2, got {}",
                self.registers_per_param
            )));
        }
        let len = self.table_len().ok_or_else(|| {
            ModbusError::configuration("register table length overflows")
        })?;
        if len > usize::from(u16::MAX) + 1 {
            return Err(ModbusError::configuration(format!(
                "{} parameters of {} registers plus {} reserved need {} registers, more than the 65536 addressable",
                self.num_params, self.registers_per_param, self.reserve_registers, len
            )));
        }
        Ok(())
    }

    /// `registers_per_param * num_params + reserve_registers`
    pub fn table_len(&self) -> Option<usize> {
        self.registers_per_param
            .checked_mul(self.num_params)?
            .checked_add(self.reserve_registers)
    }

    pub fn base_address(&self, index: usize) -> usize {
        index * self.registers_per_param
    }
}

/// Writes parameter values into a shared [`RegisterTable`].
#[derive(Debug, Clone)]
pub struct ParameterWriter {
    table: RegisterTable,
    layout: ParameterLayout,
}

impl ParameterWriter {
    pub fn new(table: RegisterTable, layout: ParameterLayout) -> Result<Self, ModbusError> {
        layout.validate()?;
        let needed = layout.num_params * layout.registers_per_param;
        if table.len() < needed {
            return Err(ModbusError::configuration(format!(
                "register table of {} cells cannot hold {} parameters of {} registers",
                table.len(),
                layout.num_params,
                layout.registers_per_param
            )));
        }
        Ok(Self { table, layout })
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn table(&self) -> &RegisterTable {
        &self.table
    }

    fn slot_base(&self, index: usize) -> Result<usize, ModbusError> {
        let base = self.layout.base_address(index);
        if index >= self.layout.num_params {
            return Err(ModbusError::Addressing {
                address: base,
                end: base + self.layout.registers_per_param,
                len: self.layout.num_params * self.layout.registers_per_param,
            });
        }
        Ok(base)
    }

    /// Cells of one slot for `param`, always `registers_per_param` long.
    fn encode(&self, param: &Parameter) -> Vec<u16> {
        let slot = self.layout.registers_per_param;
        match self.layout.encoding {
            ParameterEncoding::Float32 => {
                let mut cells = vec![0u16; slot];
                cells[..2].copy_from_slice(&encode_f32(param.value, self.layout.word_order));
                cells
            }
            ParameterEncoding::JsonText => {
                let ts = param.timestamp.unwrap_or_else(|| Utc::now().timestamp());
                let text = serde_json::json!({ "ts": ts, "v": param.value }).to_string();
                encode_text_block(&text, slot)
            }
        }
    }

    /// Write a single parameter value into slot `index`.
    pub fn write(&self, index: usize, value: f64) -> Result<(), ModbusError> {
        self.write_parameter(index, &Parameter::new(value))
    }

    pub fn write_parameter(&self, index: usize, param: &Parameter) -> Result<(), ModbusError> {
        let base = self.slot_base(index)?;
        let cells = self.encode(param);
        self.table.write(base, &cells)
    }

    /// Parse `payload` and write its entries to slots `0..`.
    ///
    /// Returns the number of parameters written. On a parse error the table
    /// is left untouched; otherwise the whole batch is written under a
    /// single table lock.
    pub fn ingest(&self, payload: &str) -> Result<usize, ModbusError> {
        let params = parse_payload(payload)?;
        let received = params.len();
        let accepted = received.min(self.layout.num_params);
        if received > accepted {
            debug!(
                "Discarding {} parameters beyond the {} configured slots",
                received - accepted,
                self.layout.num_params
            );
        }

        let encoded: Vec<(usize, Vec<u16>)> = params
            .iter()
            .take(accepted)
            .enumerate()
            .map(|(i, p)| (self.layout.base_address(i), self.encode(p)))
            .collect();

        {
            let mut bank = self.table.lock();
            for (address, cells) in &encoded {
                bank.write(*address, cells)?;
            }
        }

        info!("Updated {} parameters", accepted);
        Ok(accepted)
    }

    /// Raw cells of slot `index`.
    pub fn read_slot(&self, index: usize) -> Result<Vec<u16>, ModbusError> {
        let base = self.slot_base(index)?;
        self.table.read(base, self.layout.registers_per_param)
    }

    /// Current float value of slot `index` (float layout only).
    pub fn read_value(&self, index: usize) -> Result<Option<f32>, ModbusError> {
        let cells = self.read_slot(index)?;
        Ok(decode_f32_slice(&cells, self.layout.word_order))
    }

    /// Current text of slot `index` (text layout only).
    pub fn read_text(&self, index: usize) -> Result<String, ModbusError> {
        Ok(decode_text_block(&self.read_slot(index)?))
    }
}
