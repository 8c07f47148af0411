// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared holding-register table
//!
//! The table is a fixed-length vector of 16-bit cells addressed from 0.
//! Every listener and the parameter writer share one `RegisterTable`
//! handle; cloning the handle never copies the cells.
//!
//! ### Thread Safety
//!
//! The cells live behind a single `Mutex`. Each logical read (a whole
//! requested range) and each logical write (a whole parameter batch or a
//! whole remote write) happens under one acquisition, so a float stored in
//! a register pair is never observed half-updated. The lock is never held
//! across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::error::ModbusError;

/// The cells themselves, only reachable through a [`RegisterTable`] lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    cells: Vec<u16>,
}

impl RegisterBank {
    fn new(len: usize) -> Self {
        Self {
            cells: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn check_range(&self, address: usize, count: usize) -> Result<std::ops::Range<usize>, ModbusError> {
        let end = address.checked_add(count).unwrap_or(usize::MAX);
        if count == 0 || end > self.cells.len() {
            return Err(ModbusError::Addressing {
                address,
                end,
                len: self.cells.len(),
            });
        }
        Ok(address..end)
    }

    /// Copy out `count` cells starting at `address`.
    pub fn read(&self, address: usize, count: usize) -> Result<Vec<u16>, ModbusError> {
        let range = self.check_range(address, count)?;
        Ok(self.cells[range].to_vec())
    }

    /// Overwrite cells starting at `address`. Nothing is written when any
    /// part of the range is out of bounds.
    pub fn write(&mut self, address: usize, values: &[u16]) -> Result<(), ModbusError> {
        let range = self.check_range(address, values.len())?;
        self.cells[range].copy_from_slice(values);
        Ok(())
    }
}

/// Shared handle to the holding registers of one slave.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    bank: Arc<Mutex<RegisterBank>>,
    len: usize,
}

impl RegisterTable {
    /// Create a zero-filled table of `len` registers.
    ///
    /// Modbus addresses are 16 bits wide, so a table can hold at most
    /// 65536 cells.
    pub fn new(len: usize) -> Result<Self, ModbusError> {
        if len == 0 || len > usize::from(u16::MAX) + 1 {
            return Err(ModbusError::configuration(format!(
                "register table length must be in 1..=65536, got {len}"
            )));
        }
        debug!("Allocating register table with {} holding registers", len);
        Ok(Self {
            bank: Arc::new(Mutex::new(RegisterBank::new(len))),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lock the table for a multi-step operation.
    ///
    /// A writer that panicked cannot leave a pair half-written (every write
    /// is a single `copy_from_slice`), so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, RegisterBank> {
        self.bank.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self, address: usize, count: usize) -> Result<Vec<u16>, ModbusError> {
        self.lock().read(address, count)
    }

    pub fn write(&self, address: usize, values: &[u16]) -> Result<(), ModbusError> {
        self.lock().write(address, values)
    }

    /// Copy of every cell, mostly for diagnostics and tests.
    pub fn snapshot(&self) -> Vec<u16> {
        self.lock().cells.clone()
    }

    /// Whether two handles point at the same cells.
    pub fn same_table(&self, other: &RegisterTable) -> bool {
        Arc::ptr_eq(&self.bank, &other.bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_zero_filled() {
        let table = RegisterTable::new(8).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.snapshot(), vec![0; 8]);
    }

    #[test]
    fn rejects_empty_and_oversized_tables() {
        assert!(matches!(
            RegisterTable::new(0),
            Err(ModbusError::Configuration { .. })
        ));
        assert!(RegisterTable::new(65536).is_ok());
        assert!(RegisterTable::new(65537).is_err());
    }

    #[test]
    fn read_back_what_was_written() {
        let table = RegisterTable::new(10).unwrap();
        table.write(3, &[11, 22, 33]).unwrap();
        assert_eq!(table.read(2, 5).unwrap(), vec![0, 11, 22, 33, 0]);
    }

    #[test]
    fn out_of_range_access_is_an_error_not_a_wrap() {
        let table = RegisterTable::new(4).unwrap();
        assert!(matches!(
            table.read(3, 2),
            Err(ModbusError::Addressing { address: 3, end: 5, len: 4 })
        ));
        assert!(table.read(4, 1).is_err());
        assert!(table.read(0, 0).is_err());
        assert!(table.read(usize::MAX, 2).is_err());
    }

    #[test]
    fn failed_write_leaves_cells_untouched() {
        let table = RegisterTable::new(4).unwrap();
        table.write(0, &[1, 2, 3, 4]).unwrap();
        assert!(table.write(2, &[9, 9, 9]).is_err());
        assert_eq!(table.snapshot(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn clones_share_cells() {
        let table = RegisterTable::new(2).unwrap();
        let handle = table.clone();
        handle.write(1, &[7]).unwrap();
        assert_eq!(table.read(1, 1).unwrap(), vec![7]);
        assert!(table.same_table(&handle));
    }
}
