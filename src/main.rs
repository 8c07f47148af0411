// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus parameter slave
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use rust_modbusinator::config::{self, Config, FeedSource};
use rust_modbusinator::daemon::{spawn_feed, SlaveServer};

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::signal;

/// Modbus slave publishing parameter values as holding registers
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Modbus TCP listener address
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus TCP listener port
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Number of parameter slots
    #[arg(long)]
    num_params: Option<usize>,

    /// Store the low word of each float first
    #[arg(long)]
    word_swap: Option<bool>,

    /// Serial device for the Modbus RTU listener (enables it)
    #[arg(long)]
    serial_port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Source of update payloads
    #[arg(long, value_enum)]
    feed: Option<FeedSource>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            anyhow::bail!(
                "Configuration file does not exist: {}",
                validate_path.display()
            );
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    // Apply command line overrides
    config.apply_args(
        args.modbus_address.clone(),
        args.modbus_port,
        args.num_params,
        args.word_swap,
        args.serial_port.clone(),
        args.baud_rate,
        args.feed,
    );

    let server = SlaveServer::from_config(&config).context("Invalid Modbus slave configuration")?;
    server.start().await?;

    let running = Arc::new(AtomicBool::new(true));
    let feed = spawn_feed(&config.feed, server.writer().clone(), running.clone());

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, terminating"),
        Err(err) => error!("Error waiting for shutdown signal: {}", err),
    }

    running.store(false, Ordering::SeqCst);
    if let Some(feed) = feed {
        match tokio::time::timeout(Duration::from_secs(5), feed).await {
            Ok(Ok(Err(e))) => error!("Update feed failed: {:#}", e),
            Ok(Err(e)) => error!("Update feed panicked: {}", e),
            Ok(Ok(Ok(()))) => {}
            Err(_) => log::warn!("Update feed did not complete within timeout period"),
        }
    }

    server.stop();
    server.wait_stopped().await;
    info!("Modbus slave stopped");
    Ok(())
}
