// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Background services of the slave: the Modbus listeners serving the
//! register table and the feed that keeps the table up to date.
//!
//! ## Components
//!
//! * **Slave server**: starts, stops and joins the TCP and RTU listeners
//! * **Feed**: ingests update payloads from stdin or from the simulator
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbusinator::{config::Config, daemon::SlaveServer};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let server = SlaveServer::from_config(&config)?;
//!     server.start().await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     server.stop();
//!     server.wait_stopped().await;
//!
//!     Ok(())
//! }
//! ```

pub mod feed;
pub mod slave_server;

pub use feed::{spawn_feed, spawn_stdin_reader};
pub use slave_server::SlaveServer;
