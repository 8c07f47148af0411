// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus service answering holding-register requests from a [`RegisterTable`]
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! The same service type is handed to the TCP listener (one instance per
//! accepted connection) and to the RTU listener; every instance shares the
//! one register table of the slave.
//!
//! ## Supported function codes
//!
//! | Code | Request | Behaviour |
//! |------|---------|-----------|
//! | 0x03 | Read Holding Registers | contiguous range or `IllegalDataAddress` |
//! | 0x06 | Write Single Register | write under lock or `IllegalDataAddress` |
//! | 0x10 | Write Multiple Registers | write under lock or `IllegalDataAddress` |
//!
//! Anything else is answered with `IllegalFunction`.

use std::{
    future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use log::{debug, error, warn};
use tokio_modbus::prelude::*;

use super::error::ModbusError;
use super::register_table::{RegisterBank, RegisterTable};

/// A Modbus request handler bound to one slave's holding registers.
///
/// ### Thread Safety
///
/// Cloning is cheap: clones share the table and the `accepting` flag.
/// Once the owning server stops, `accepting` is cleared and every request
/// is refused with `ServerDeviceFailure` without touching the table. The
/// flag is checked while the table lock is held, so a stop that takes the
/// lock afterwards is ordered after every in-flight write.
#[derive(Debug, Clone)]
pub struct RegisterModbusService {
    table: RegisterTable,
    accepting: Arc<AtomicBool>,
}

impl tokio_modbus::server::Service for RegisterModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                self.with_bank(|bank| register_read(bank, addr, cnt))
                    .map(Response::ReadHoldingRegisters)
            }
            Request::WriteMultipleRegisters(addr, values) => {
                debug!(
                    "Writing {} values to holding registers starting from address {}",
                    values.len(),
                    addr
                );
                self.with_bank(|bank| register_write(bank, addr, &values))
                    .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleRegister(addr, value) => {
                debug!("Writing value {} to holding register {}", value, addr);
                self.with_bank(|bank| register_write(bank, addr, std::slice::from_ref(&value)))
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

impl RegisterModbusService {
    /// Create a service over `table` that stops answering once `accepting`
    /// is cleared.
    pub fn new(table: RegisterTable, accepting: Arc<AtomicBool>) -> Self {
        Self { table, accepting }
    }

    /// Service that always accepts, for tests and one-off listeners.
    pub fn always_accepting(table: RegisterTable) -> Self {
        Self::new(table, Arc::new(AtomicBool::new(true)))
    }

    pub fn table(&self) -> &RegisterTable {
        &self.table
    }

    fn with_bank<T>(
        &self,
        op: impl FnOnce(&mut RegisterBank) -> Result<T, ExceptionCode>,
    ) -> Result<T, ExceptionCode> {
        let mut bank = self.table.lock();
        if !self.accepting.load(Ordering::SeqCst) {
            warn!("Refusing Modbus request: server is stopping");
            return Err(ExceptionCode::ServerDeviceFailure);
        }
        op(&mut bank)
    }
}

/// Read `cnt` holding registers starting at `addr`.
///
/// Any address outside the table answers `IllegalDataAddress` for the whole
/// request.
fn register_read(bank: &RegisterBank, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
    bank.read(usize::from(addr), usize::from(cnt))
        .map_err(|e| exception_for(&e))
}

/// Write holding registers. Used by both the write single register
/// and write multiple registers requests.
fn register_write(bank: &mut RegisterBank, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
    bank.write(usize::from(addr), values)
        .map_err(|e| exception_for(&e))
}

fn exception_for(err: &ModbusError) -> ExceptionCode {
    error!("SERVER: {err}");
    err.exception_code()
}
