// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus register exchange
//!
//! This module holds everything that touches holding registers, on both
//! sides of the wire:
//!
//! ## Key Components
//!
//! - [`RegisterTable`]: the slave's shared, mutex-guarded register cells.
//! - [`codec`]: float <-> register-pair encoding with a configurable
//!   [`WordOrder`], plus the older text-block slot format.
//! - [`ParameterWriter`]: maps parameter slots onto the table and ingests
//!   JSON update payloads.
//! - [`RegisterModbusService`]: the `tokio-modbus` service both slave
//!   listeners (TCP and RTU) answer with.
//! - [`Scanner`]: the client-side chunked walk of an unknown device.
//!
//! ## Usage
//!
//! ```
//! use rust_modbusinator::modbus::{ParameterLayout, ParameterWriter, RegisterTable, WordOrder};
//!
//! let layout = ParameterLayout::float32(3, WordOrder::HighWordFirst);
//! let table = RegisterTable::new(layout.table_len().unwrap()).unwrap();
//! let writer = ParameterWriter::new(table.clone(), layout).unwrap();
//! writer.ingest("[25.34, 26.1, 27.0]").unwrap();
//! assert_eq!(table.read(0, 2).unwrap(), vec![0x41CA, 0xB852]);
//! ```

pub mod codec;
pub mod error;
pub mod modbus_server;
pub mod parameter;
pub mod register_table;
pub mod scanner;
pub mod transport;

pub use codec::{decode_f32, encode_f32, WordOrder};
pub use error::ModbusError;
pub use modbus_server::RegisterModbusService;
pub use parameter::{parse_payload, Parameter, ParameterEncoding, ParameterLayout, ParameterWriter};
pub use register_table::RegisterTable;
pub use scanner::{DecodedFloat, ScanOptions, ScanReport, ScanState, Scanner, MAX_READ_REGISTERS};
pub use transport::{HoldingRegisterSource, ModbusSession, ScanTarget};
