// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy shared by the register table, the parameter writer,
//! the slave listeners and the scanner.

use thiserror::Error;
use tokio_modbus::ExceptionCode;

/// Errors raised by the register exchange.
///
/// `DeviceProtocol` and `Transport` are kept apart on purpose: the first is
/// an explicit rejection from a responding device (the normal end of a
/// scan), the second means the conversation itself broke down.
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Malformed update payload: {reason}")]
    PayloadParse { reason: String },

    #[error("Device rejected request at address {address} (count {count}): {code}")]
    DeviceProtocol {
        address: u16,
        count: u16,
        code: ExceptionCode,
    },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Address range {address}..{end} outside register table of length {len}")]
    Addressing { address: usize, end: usize, len: usize },
}

impl ModbusError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        ModbusError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        ModbusError::Transport {
            reason: reason.into(),
        }
    }

    /// Exception code a listener answers with for this error.
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            ModbusError::Addressing { .. } => ExceptionCode::IllegalDataAddress,
            ModbusError::DeviceProtocol { code, .. } => *code,
            _ => ExceptionCode::ServerDeviceFailure,
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::transport(err.to_string())
    }
}

impl From<tokio_modbus::Error> for ModbusError {
    fn from(err: tokio_modbus::Error) -> Self {
        ModbusError::transport(err.to_string())
    }
}

impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        ModbusError::PayloadParse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressing_maps_to_illegal_data_address() {
        let err = ModbusError::Addressing {
            address: 10,
            end: 12,
            len: 11,
        };
        assert_eq!(err.exception_code(), ExceptionCode::IllegalDataAddress);
    }

    #[test]
    fn io_errors_are_transport_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: ModbusError = io.into();
        assert!(matches!(err, ModbusError::Transport { .. }));
        assert!(err.to_string().contains("reset by peer"));
    }
}
