// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the register exchange
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the slave daemon and the register dumper. The
//! configuration is backed by a YAML file and validated against a JSON schema
//! for robustness.
//!
//! ## Configuration Structure
//!
//! - `modbus`: register layout and TCP listener of the slave
//! - `serial`: optional RTU listener of the slave (also the dumper's serial line)
//! - `scanner`: defaults for the register dumper
//! - `feed`: where the slave gets its update payloads from
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbusinator::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("0.0.0.0".to_string()),    // Modbus address
//!     Some(1502),                     // Modbus port
//!     Some(3),                        // Number of parameters
//!     Some(true),                     // Word swap
//!     None,                           // Serial port
//!     None,                           // Baud rate
//!     None,                           // Feed source
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod feed;
pub mod modbus;
pub mod scanner;
pub mod serial;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use feed::{FeedConfig, FeedSource};
pub use modbus::ModbusConfig;
pub use scanner::ScannerConfig;
pub use serial::{SerialConfig, SerialParity};
pub use utils::{is_valid_ip_address, output_config_schema};

/// Embedded JSON schema every configuration file is validated against.
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure.
///
/// # Structure
///
/// The configuration is designed to be deserialized from and serialized to YAML
/// using the serde framework. The structure is validated against a JSON schema
/// to ensure all required fields are present and have valid values.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the configuration
/// file, allowing for minimal configuration when custom settings are not required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Register layout and TCP listener of the slave.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Serial line settings. The slave only opens it when `enabled` is set;
    /// the dumper uses it in serial mode.
    #[serde(default)]
    pub serial: SerialConfig,

    /// Defaults for the register dumper.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Source of update payloads for the slave.
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file that fails
    /// schema validation, deserialization or the specific rules is rejected
    /// and a `*.sample.yaml` with defaults is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        Self::from_yaml_str(&contents).inspect_err(|_| {
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
        })
    }

    /// Parse, validate and deserialize a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_yml::from_str(contents).map_err(|err| {
            error!("Configuration deserialization error: {}", err);
            anyhow::anyhow!("Failed to deserialize configuration: {}", err)
        })?;

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration. Providing a serial port also enables the serial
    /// listener.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        num_params: Option<usize>,
        word_swap: Option<bool>,
        serial_port: Option<String>,
        baud_rate: Option<u32>,
        feed_source: Option<FeedSource>,
    ) {
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(num_params) = num_params {
            debug!("Overriding parameter count from command line: {}", num_params);
            self.modbus.num_params = num_params;
        }
        if let Some(word_swap) = word_swap {
            debug!("Overriding word swap from command line: {}", word_swap);
            self.modbus.word_swap = word_swap;
        }
        if let Some(port) = serial_port {
            debug!("Overriding serial port from command line: {}", port);
            self.serial.port = port;
            self.serial.enabled = true;
        }
        if let Some(baud) = baud_rate {
            debug!("Overriding baud rate from command line: {}", baud);
            self.serial.baud_rate = baud;
        }
        if let Some(source) = feed_source {
            debug!("Overriding feed source from command line: {:?}", source);
            self.feed.source = source;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_yaml_round_trip() {
        let yaml = serde_yml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.num_params, 20);
        assert_eq!(config.scanner.chunk_size, 100);
        assert!(!config.serial.enabled);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let config = Config::from_yaml_str("modbus:\n  port: 1502\n").unwrap();
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.registers_per_param, 2);
        assert_eq!(config.feed.source, FeedSource::Stdin);
    }

    #[test]
    fn apply_args_overrides_only_what_is_given() {
        let mut config = Config::default();
        config.apply_args(
            None,
            Some(1502),
            None,
            Some(true),
            Some("/dev/ttyS1".to_string()),
            None,
            None,
        );
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.address, ModbusConfig::default().address);
        assert!(config.modbus.word_swap);
        assert!(config.serial.enabled);
        assert_eq!(config.serial.port, "/dev/ttyS1");
        assert_eq!(config.serial.baud_rate, 19200);
    }
}
