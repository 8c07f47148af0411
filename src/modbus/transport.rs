// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Client-side transport plumbing
//!
//! [`HoldingRegisterSource`] is the seam between the scanner and the wire:
//! a real [`ModbusSession`] over TCP or RTU in production, a simulated
//! device in tests. Implementations must report explicit device rejections
//! as [`ModbusError::DeviceProtocol`] and everything else as
//! [`ModbusError::Transport`].

use std::{fmt, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use log::{debug, info};
use tokio::time;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialPortBuilder, SerialStream, StopBits};

use super::error::ModbusError;
use crate::config::{SerialConfig, SerialParity};

/// Something that answers "read holding registers" requests.
#[async_trait]
pub trait HoldingRegisterSource: Send {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError>;
}

/// Where a scan connects to.
#[derive(Debug, Clone)]
pub enum ScanTarget {
    Tcp(SocketAddr),
    Serial(SerialConfig),
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Tcp(addr) => write!(f, "TCP {addr}"),
            ScanTarget::Serial(serial) => write!(f, "Serial {serial}"),
        }
    }
}

/// A connected Modbus client session where every request is bounded by
/// `timeout`.
pub struct ModbusSession {
    ctx: Context,
    timeout: Duration,
}

impl fmt::Debug for ModbusSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusSession")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ModbusSession {
    /// Connect to `target` addressing `unit_id`.
    ///
    /// A connect that does not finish within `timeout` is a transport
    /// error, as is any refusal.
    pub async fn connect(
        target: &ScanTarget,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Self, ModbusError> {
        info!("Connecting {} (unit {})", target, unit_id);
        let ctx = match target {
            ScanTarget::Tcp(addr) => time::timeout(timeout, tcp::connect_slave(*addr, Slave(unit_id)))
                .await
                .map_err(|_| {
                    ModbusError::transport(format!("connect to {addr} timed out after {timeout:?}"))
                })??,
            ScanTarget::Serial(serial) => {
                let port = open_serial(serial, timeout)?;
                rtu::attach_slave(port, Slave(unit_id))
            }
        };
        Ok(Self { ctx, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write holding registers, bounded by the session timeout.
    pub async fn write_holding(&mut self, address: u16, values: &[u16]) -> Result<(), ModbusError> {
        match time::timeout(self.timeout, self.ctx.write_multiple_registers(address, values)).await {
            Err(_) => Err(self.timed_out(address)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(Err(code))) => Err(ModbusError::DeviceProtocol {
                address,
                count: values.len() as u16,
                code,
            }),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }

    pub async fn disconnect(mut self) -> Result<(), ModbusError> {
        self.ctx.disconnect().await?;
        Ok(())
    }

    fn timed_out(&self, address: u16) -> ModbusError {
        ModbusError::transport(format!(
            "no response for address {address} within {:?}",
            self.timeout
        ))
    }
}

#[async_trait]
impl HoldingRegisterSource for ModbusSession {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        debug!("Reading {} holding registers from {}", count, address);
        match time::timeout(self.timeout, self.ctx.read_holding_registers(address, count)).await {
            Err(_) => Err(self.timed_out(address)),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(Err(code))) => Err(ModbusError::DeviceProtocol {
                address,
                count,
                code,
            }),
            Ok(Ok(Ok(registers))) => Ok(registers),
        }
    }
}

fn map_parity(parity: SerialParity) -> Parity {
    match parity {
        SerialParity::None => Parity::None,
        SerialParity::Even => Parity::Even,
        SerialParity::Odd => Parity::Odd,
    }
}

fn map_data_bits(bits: u8) -> Result<DataBits, ModbusError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(ModbusError::configuration(format!(
            "unsupported data bits: {other}"
        ))),
    }
}

fn map_stop_bits(bits: u8) -> Result<StopBits, ModbusError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(ModbusError::configuration(format!(
            "unsupported stop bits: {other}"
        ))),
    }
}

/// Line settings for `serial`, validated.
pub fn serial_builder(serial: &SerialConfig, timeout: Duration) -> Result<SerialPortBuilder, ModbusError> {
    Ok(tokio_serial::new(&serial.port, serial.baud_rate)
        .parity(map_parity(serial.parity))
        .data_bits(map_data_bits(serial.data_bits)?)
        .stop_bits(map_stop_bits(serial.stop_bits)?)
        .timeout(timeout))
}

/// Open the serial line described by `serial`.
pub fn open_serial(serial: &SerialConfig, timeout: Duration) -> Result<SerialStream, ModbusError> {
    let builder = serial_builder(serial, timeout)?;
    SerialStream::open(&builder)
        .map_err(|e| ModbusError::transport(format!("cannot open {}: {e}", serial.port)))
}
