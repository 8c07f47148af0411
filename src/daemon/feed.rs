// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Update feed of the slave
//!
//! Keeps the register table fresh from one of two sources:
//!
//! - `stdin`: every input line is one JSON payload
//! - `simulate`: a [`SimulatedFeed`] snapshot every `interval_secs`
//!
//! A payload that fails to parse is logged and skipped; it never stops the
//! feed and never touches the table. Both loops poll the shared `running`
//! flag at least once a second.

use std::{
    io::BufRead,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{FeedConfig, FeedSource};
use crate::modbus::ParameterWriter;
use crate::utility::SimulatedFeed;

/// How often the loops look at the `running` flag while idle.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the feed selected by `config`, or `None` for [`FeedSource::None`].
pub fn spawn_feed(
    config: &FeedConfig,
    writer: ParameterWriter,
    running: Arc<AtomicBool>,
) -> Option<JoinHandle<Result<()>>> {
    match config.source {
        FeedSource::None => {
            info!("No update feed configured, serving registers as they are");
            None
        }
        FeedSource::Stdin => {
            info!("Reading update payloads from stdin, one JSON document per line");
            let lines = spawn_stdin_reader();
            Some(tokio::spawn(async move {
                ingest_lines(&writer, lines, running).await;
                Ok(())
            }))
        }
        FeedSource::Simulate => {
            let interval = config.interval();
            info!("Simulating update payloads every {:?}", interval);
            let generator = SimulatedFeed::new(writer.layout().num_params);
            Some(tokio::spawn(async move {
                simulate(&writer, &generator, interval, running).await
            }))
        }
    }
}

/// Forward stdin lines to a channel from a dedicated thread.
///
/// Blocking stdin reads must not sit on a runtime worker; the thread ends
/// with stdin or when the receiver is dropped.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader finished");
    });
    rx
}

/// Ingest every line received on `lines` until the channel closes or
/// `running` is cleared. Blank lines are ignored.
///
/// Returns the number of payloads that were applied.
pub async fn ingest_lines(
    writer: &ParameterWriter,
    mut lines: mpsc::Receiver<String>,
    running: Arc<AtomicBool>,
) -> usize {
    let mut applied = 0;
    while running.load(Ordering::SeqCst) {
        let line = match time::timeout(POLL_INTERVAL, lines.recv()).await {
            Err(_) => continue,
            Ok(None) => {
                info!("Update feed closed");
                break;
            }
            Ok(Some(line)) => line,
        };

        let payload = line.trim();
        if payload.is_empty() {
            continue;
        }
        match writer.ingest(payload) {
            Ok(_) => applied += 1,
            Err(e) => warn!("Ignoring update payload: {}", e),
        }
    }
    applied
}

/// Ingest a simulated snapshot every `interval` until `running` is cleared.
pub async fn simulate(
    writer: &ParameterWriter,
    generator: &SimulatedFeed,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let mut ticker = time::interval(interval);
    while running.load(Ordering::SeqCst) {
        if time::timeout(POLL_INTERVAL, ticker.tick()).await.is_err() {
            continue;
        }
        let payload = generator.payload()?;
        debug!("Simulated payload: {}", payload);
        if let Err(e) = writer.ingest(&payload) {
            warn!("Ignoring simulated payload: {}", e);
        }
    }
    debug!("Simulated feed stopped");
    Ok(())
}
