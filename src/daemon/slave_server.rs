// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Slave server lifecycle
//!
//! [`SlaveServer`] owns one [`RegisterTable`] and runs up to two listeners
//! against it:
//!
//! - a Modbus TCP listener, always started
//! - a Modbus RTU listener on a serial line, when a serial configuration is given
//!
//! Both listeners hand out clones of the same [`RegisterModbusService`], so
//! a value written over TCP is visible over RTU and vice versa.
//!
//! ## Shutdown
//!
//! [`SlaveServer::stop`] is synchronous. It clears the `accepting` flag of
//! the current run, aborts the listener tasks and then takes the table lock
//! once. When it returns no request can mutate the table any more:
//! connections accepted earlier stay open but are answered with
//! `ServerDeviceFailure`. [`SlaveServer::wait_stopped`] then joins the
//! aborted tasks, each bounded by a five second timeout.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::config::{Config, ModbusConfig, SerialConfig};
use crate::modbus::transport::{open_serial, serial_builder};
use crate::modbus::{ModbusError, ParameterWriter, RegisterModbusService, RegisterTable};

/// Bound on each task join in [`SlaveServer::wait_stopped`].
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout handed to the serial port builder.
const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Listeners of one `start()`..`stop()` run.
struct Listeners {
    accepting: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<Result<()>>>,
    local_addr: SocketAddr,
}

/// A Modbus slave exposing one register table over TCP and optionally RTU.
///
/// # Thread Safety
///
/// Every method takes `&self`; the server can be shared in an `Arc` and
/// stopped from any thread, including a signal handler.
pub struct SlaveServer {
    modbus: ModbusConfig,
    serial: Option<SerialConfig>,
    table: RegisterTable,
    writer: ParameterWriter,
    listeners: Mutex<Option<Listeners>>,
    stopped: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl SlaveServer {
    /// Build the register table and parameter writer for `modbus`.
    ///
    /// Nothing is bound or opened until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`ModbusError::Configuration`] when the register layout does not fit
    /// the address space or the serial line settings are unsupported.
    pub fn new(modbus: ModbusConfig, serial: Option<SerialConfig>) -> Result<Self, ModbusError> {
        let layout = modbus.layout();
        layout.validate()?;
        let len = layout
            .table_len()
            .ok_or_else(|| ModbusError::configuration("register table length overflows"))?;
        if let Some(serial) = &serial {
            serial_builder(serial, SERIAL_TIMEOUT)?;
        }

        let table = RegisterTable::new(len)?;
        let writer = ParameterWriter::new(table.clone(), layout)?;
        debug!(
            "Slave configured with {} parameters ({} registers each, {:?}), {} registers total",
            modbus.num_params, modbus.registers_per_param, modbus.encoding, len
        );

        Ok(Self {
            modbus,
            serial,
            table,
            writer,
            listeners: Mutex::new(None),
            stopped: Mutex::new(Vec::new()),
        })
    }

    /// Build a server from the `modbus` and, when enabled, `serial` sections.
    pub fn from_config(config: &Config) -> Result<Self, ModbusError> {
        let serial = config.serial.enabled.then(|| config.serial.clone());
        Self::new(config.modbus.clone(), serial)
    }

    pub fn table(&self) -> &RegisterTable {
        &self.table
    }

    pub fn writer(&self) -> &ParameterWriter {
        &self.writer
    }

    pub fn is_running(&self) -> bool {
        self.lock_listeners().is_some()
    }

    /// Address the TCP listener is bound to while running.
    ///
    /// Useful when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_listeners().as_ref().map(|l| l.local_addr)
    }

    /// Bind the TCP listener, open the serial line if configured and start
    /// serving.
    ///
    /// Both resources are acquired before any task is spawned, so a failure
    /// leaves nothing running. Starting a running server only logs a warning.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            warn!("Modbus slave already running, ignoring start request");
            return Ok(());
        }

        info!(
            "Starting Modbus slave on {}:{}",
            self.modbus.address, self.modbus.port
        );
        let listener = TcpListener::bind((self.modbus.address.as_str(), self.modbus.port))
            .await
            .with_context(|| {
                format!(
                    "Failed to bind Modbus TCP listener on {}:{}",
                    self.modbus.address, self.modbus.port
                )
            })?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read Modbus TCP listener address")?;

        let serial_port = match &self.serial {
            Some(serial) => {
                info!("Opening Modbus RTU line {}", serial);
                Some(open_serial(serial, SERIAL_TIMEOUT)?)
            }
            None => None,
        };

        let mut listeners = self.lock_listeners();
        if listeners.is_some() {
            warn!("Modbus slave was started concurrently, dropping the new listeners");
            return Ok(());
        }

        let accepting = Arc::new(AtomicBool::new(true));
        let service = RegisterModbusService::new(self.table.clone(), accepting.clone());
        let mut tasks = vec![spawn_tcp_listener(listener, service.clone())];
        if let Some(port) = serial_port {
            tasks.push(spawn_rtu_listener(port, service));
        }

        info!("Modbus slave listening on {}", local_addr);
        *listeners = Some(Listeners {
            accepting,
            tasks,
            local_addr,
        });
        Ok(())
    }

    /// Stop serving. Idempotent, never blocks on network I/O.
    ///
    /// When this returns no listener mutates the table any more and new
    /// connections are refused.
    ///
    /// TCP connections accepted before the stop are served by per-connection
    /// tasks that tokio-modbus detaches, so their sockets stay open until the
    /// peer hangs up. Every request they still carry is answered with
    /// `ServerDeviceFailure` and leaves the table untouched.
    pub fn stop(&self) {
        let Some(listeners) = self.lock_listeners().take() else {
            debug!("Modbus slave is not running, nothing to stop");
            return;
        };

        info!("Shutting down Modbus slave on {}", listeners.local_addr);
        listeners.accepting.store(false, Ordering::SeqCst);
        for task in &listeners.tasks {
            task.abort();
        }
        // Requests check `accepting` under this lock; wait for the last one.
        drop(self.table.lock());

        self.lock_stopped().extend(listeners.tasks);
    }

    /// Wait for the tasks aborted by [`stop`](Self::stop) to finish.
    pub async fn wait_stopped(&self) {
        let tasks: Vec<_> = self.lock_stopped().drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => debug!("Modbus listener finished"),
                Ok(Ok(Err(e))) => warn!("Modbus listener ended with an error: {:#}", e),
                Ok(Err(e)) if e.is_cancelled() => debug!("Modbus listener aborted"),
                Ok(Err(e)) => error!("Modbus listener panicked: {}", e),
                Err(_) => {
                    warn!("Modbus listener did not complete within timeout period, may be hung")
                }
            }
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Option<Listeners>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stopped(&self) -> MutexGuard<'_, Vec<JoinHandle<Result<()>>>> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SlaveServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_tcp_listener(listener: TcpListener, service: RegisterModbusService) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let server = Server::new(listener);

        let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
            let service = service.clone();
            async move {
                debug!("Modbus TCP client connected from {}", socket_addr);
                accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                    Ok(Some(service.clone()))
                })
            }
        };

        let on_process_error = |err| {
            error!("Modbus TCP server error: {err}");
        };

        server
            .serve(&on_connected, on_process_error)
            .await
            .context("Modbus TCP listener failed")?;
        Ok(())
    })
}

fn spawn_rtu_listener(
    port: tokio_serial::SerialStream,
    service: RegisterModbusService,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let server = tokio_modbus::server::rtu::Server::new(port);
        server
            .serve_forever(service)
            .await
            .context("Modbus RTU listener failed")?;
        Ok(())
    })
}
