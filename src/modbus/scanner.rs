// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Chunked holding-register scanner
//!
//! The scanner acts as a Modbus client against any server and walks
//! addresses `0..=max_address` in chunks of at most `chunk_size`
//! registers, until the device rejects a request or the transport fails.
//!
//! ```text
//! Idle -> Connecting -> Scanning -> Finished
//!                    \           \-> Aborted
//!                     \-> Aborted (connect failure)
//! ```
//!
//! * A device rejection ends the scan normally (`Finished`): it is how an
//!   unknown device tells us where its register space ends.
//! * A transport failure ends it as `Aborted`; whatever was gathered so far
//!   is still returned.
//!
//! With `refine_boundary`, a rejected chunk is bisected with shorter reads
//! that continue from the same address, so the readable prefix of the
//! failing chunk is recovered before stopping.

use std::{collections::BTreeMap, time::Duration};

use log::{debug, info, warn};

use super::codec::{decode_f32, WordOrder};
use super::error::ModbusError;
use super::transport::{HoldingRegisterSource, ModbusSession, ScanTarget};

/// Largest register count a single "read holding registers" may ask for.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Lifecycle of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Connecting,
    Scanning,
    Finished,
    Aborted,
}

/// Scan bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_address: u16,
    pub chunk_size: u16,
    pub refine_boundary: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_address: 1024,
            chunk_size: 100,
            refine_boundary: true,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_READ_REGISTERS {
            return Err(ModbusError::configuration(format!(
                "chunk size must be in 1..={MAX_READ_REGISTERS}, got {}",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A float decoded from the register pair `(address, address + 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedFloat {
    pub address: u16,
    pub value: f32,
}

/// What a scan recovered.
#[derive(Debug)]
pub struct ScanReport {
    /// Every register read, keyed by absolute address.
    pub registers: BTreeMap<u16, u16>,
    /// Highest address successfully read, `None` when nothing was.
    pub last_good_address: Option<u16>,
    /// `Finished` or `Aborted`.
    pub state: ScanState,
    /// The error that ended the scan early, if any.
    pub stopped_by: Option<ModbusError>,
    /// Number of read requests issued.
    pub requests: usize,
}

impl ScanReport {
    fn new() -> Self {
        Self {
            registers: BTreeMap::new(),
            last_good_address: None,
            state: ScanState::Scanning,
            stopped_by: None,
            requests: 0,
        }
    }

    /// Values past the end of the address space are dropped.
    fn record(&mut self, address: u16, values: &[u16]) {
        let addresses = (u32::from(address)..=u32::from(u16::MAX)).map(|a| a as u16);
        for (reg_addr, value) in addresses.zip(values) {
            debug!("HR {:05} : {:6} (0x{:04X})", reg_addr, value, value);
            self.registers.insert(reg_addr, *value);
            self.last_good_address = Some(reg_addr);
        }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Decode every pair `(i, i + 1)` with `i` even and below the last good
    /// address. The order must be the one the device writes with; it cannot
    /// be inferred from the data. Pairs with a missing half are skipped.
    pub fn decoded_floats(&self, order: WordOrder) -> Vec<DecodedFloat> {
        let Some(last_good) = self.last_good_address else {
            return Vec::new();
        };
        if self.registers.len() < 2 {
            return Vec::new();
        }
        (0..last_good)
            .step_by(2)
            .filter_map(|address| {
                let first = self.registers.get(&address)?;
                let second = self.registers.get(&(address + 1))?;
                decode_f32([*first, *second], order).map(|value| DecodedFloat { address, value })
            })
            .collect()
    }
}

/// Walks a device's holding registers.
#[derive(Debug)]
pub struct Scanner {
    options: ScanOptions,
    state: ScanState,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Result<Self, ModbusError> {
        options.validate()?;
        Ok(Self {
            options,
            state: ScanState::Idle,
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Connect to `target` and scan it.
    ///
    /// A failed connect returns the transport error and no scan happens.
    pub async fn run(
        &mut self,
        target: &ScanTarget,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<ScanReport, ModbusError> {
        self.state = ScanState::Connecting;
        let mut session = match ModbusSession::connect(target, unit_id, timeout).await {
            Ok(session) => session,
            Err(err) => {
                warn!("Failed to connect to {}: {}", target, err);
                self.state = ScanState::Aborted;
                return Err(err);
            }
        };
        info!("Connected. Scanning holding registers from 0");
        let report = self.scan(&mut session).await;
        if let Err(err) = session.disconnect().await {
            debug!("Disconnect after scan failed: {}", err);
        }
        Ok(report)
    }

    /// Scan an already connected source.
    pub async fn scan<S>(&mut self, source: &mut S) -> ScanReport
    where
        S: HoldingRegisterSource + ?Sized,
    {
        self.state = ScanState::Scanning;
        let mut report = ScanReport::new();
        let max_address = u32::from(self.options.max_address);
        let mut current: u32 = 0;

        while current <= max_address {
            let count = u32::from(self.options.chunk_size).min(max_address - current + 1) as u16;
            let address = current as u16;
            report.requests += 1;

            match read_exact(source, address, count).await {
                Ok(values) => {
                    report.record(address, &values);
                    current += u32::from(count);
                }
                Err(err @ ModbusError::DeviceProtocol { .. }) => {
                    info!("Server returned error at address {} -> stopping scan", address);
                    report.stopped_by = Some(err);
                    if self.options.refine_boundary && count > 1 {
                        if let Err(abort) = refine(source, address, count, &mut report).await {
                            warn!("Exception while refining at address {}: {}", address, abort);
                            report.stopped_by = Some(abort);
                            report.state = ScanState::Aborted;
                        }
                    }
                    break;
                }
                Err(err) => {
                    warn!("Exception at address {}: {}", address, err);
                    report.stopped_by = Some(err);
                    report.state = ScanState::Aborted;
                    break;
                }
            }
        }

        if report.state == ScanState::Scanning {
            report.state = ScanState::Finished;
        }
        self.state = report.state;
        info!(
            "Scan {:?}: dumped {} holding registers in {} requests",
            report.state,
            report.len(),
            report.requests
        );
        report
    }
}

/// Bisect the rejected chunk `[address, address + count)`.
///
/// `good` registers from `address` are known readable, everything from
/// `address + bad` on is not. Each bisection step reads only the registers between
/// the known-good prefix and the midpoint, so no register is recorded twice.
async fn refine<S>(
    source: &mut S,
    address: u16,
    count: u16,
    report: &mut ScanReport,
) -> Result<(), ModbusError>
where
    S: HoldingRegisterSource + ?Sized,
{
    let (mut good, mut bad) = (0u16, count);
    while bad - good > 1 {
        let mid = good + (bad - good) / 2;
        let sub_address = address + good;
        report.requests += 1;
        match read_exact(source, sub_address, mid - good).await {
            Ok(values) => {
                report.record(sub_address, &values);
                good = mid;
            }
            Err(ModbusError::DeviceProtocol { .. }) => bad = mid,
            Err(err) => return Err(err),
        }
    }
    debug!(
        "Readable prefix of chunk at {} is {} registers",
        address, good
    );
    Ok(())
}

/// One read that must answer exactly `count` registers.
///
/// A short or long response is a transport failure: the addresses it
/// covers cannot be trusted.
async fn read_exact<S>(source: &mut S, address: u16, count: u16) -> Result<Vec<u16>, ModbusError>
where
    S: HoldingRegisterSource + ?Sized,
{
    let values = source.read_holding(address, count).await?;
    if values.len() != usize::from(count) {
        return Err(ModbusError::transport(format!(
            "malformed response at address {address}: asked for {count} registers, got {}",
            values.len()
        )));
    }
    Ok(values)
}

/// Read `count` registers from `start` with requests of at most
/// `max_per_read` registers. The first error of any kind is returned.
pub async fn read_range<S>(
    source: &mut S,
    start: u16,
    count: usize,
    max_per_read: u16,
) -> Result<Vec<u16>, ModbusError>
where
    S: HoldingRegisterSource + ?Sized,
{
    if max_per_read == 0 {
        return Err(ModbusError::configuration("max_per_read must be positive"));
    }
    let end = usize::from(start) + count;
    if end > usize::from(u16::MAX) + 1 {
        return Err(ModbusError::configuration(format!(
            "range {start}+{count} exceeds the Modbus address space"
        )));
    }
    let mut registers = Vec::with_capacity(count);
    let mut address = usize::from(start);
    while address < end {
        let chunk = (end - address).min(usize::from(max_per_read)) as u16;
        let values = read_exact(source, address as u16, chunk).await?;
        registers.extend(values);
        address += usize::from(chunk);
    }
    Ok(registers)
}
