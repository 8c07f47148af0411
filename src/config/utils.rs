// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{Config, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line. It outputs the full JSON schema for the configuration
/// to stdout, formatted for readability.
///
/// # Example
///
/// ```bash
/// ./rust_modbusinator --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Register layout**: at least one parameter, at least two registers per
///   parameter, and a table that fits the 16-bit address space
/// - **Port Range**: the slave port is within 1-65534
/// - **IP Address Format**: an unusual listener address is only reported
/// - **Scanner**: chunk size within 1-125 and a non-zero timeout
/// - **Serial line**: 5 to 8 data bits, 1 or 2 stop bits
/// - **Feed**: a non-zero simulation period
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    config
        .modbus
        .layout()
        .validate()
        .context("Invalid Modbus register layout")?;

    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid port number: {}", config.modbus.port);
    }

    if !is_valid_ip_address(&config.modbus.address) {
        // Hostnames are allowed, only flag them
        warn!(
            "Potentially invalid address format: {}",
            config.modbus.address
        );
    }

    config
        .scanner
        .options()
        .validate()
        .context("Invalid scanner settings")?;

    if config.scanner.timeout_secs == 0 {
        anyhow::bail!("Scanner timeout must be at least one second");
    }

    if !(5..=8).contains(&config.serial.data_bits) {
        anyhow::bail!("Invalid serial data bits: {}", config.serial.data_bits);
    }
    if !(1..=2).contains(&config.serial.stop_bits) {
        anyhow::bail!("Invalid serial stop bits: {}", config.serial.stop_bits);
    }
    if config.serial.baud_rate == 0 {
        anyhow::bail!("Serial baud rate must be greater than 0");
    }

    if config.feed.interval_secs == 0 {
        anyhow::bail!("Feed interval must be at least one second");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn oversized_table_is_rejected() {
        let mut config = Config::default();
        config.modbus.num_params = 40_000;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn single_register_slots_are_rejected() {
        let mut config = Config::default();
        config.modbus.registers_per_param = 1;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let mut config = Config::default();
        config.scanner.chunk_size = 126;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn serial_bits_are_checked() {
        let mut config = Config::default();
        config.serial.stop_bits = 3;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn ip_addresses() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("not an address"));
    }
}
