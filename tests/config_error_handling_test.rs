// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_modbusinator::config::{Config, FeedSource, SerialParity};
use rust_modbusinator::modbus::{ParameterEncoding, WordOrder};
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_missing_config_file_is_created_with_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let config = Config::from_file(&config_path)?;
    assert!(config_path.exists(), "Default config file was not created");
    assert_eq!(config.modbus.port, 502);

    // The file written must load back
    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded.modbus.num_params, config.modbus.num_params);
    Ok(())
}

#[test]
fn test_config_deserialization_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Valid YAML, wrong types
    let invalid_yaml = r#"
modbus:
  port: "not-an-integer"
  address: 12345
  word_swap: "yes"
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );

    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config.modbus.port, 502);
    Ok(())
}

#[test]
fn test_config_validation_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Chunk size above the 125 register limit of one request
    let invalid_config = r#"
scanner:
  chunk_size: 200
"#;
    fs::write(&config_path, invalid_config)?;

    assert!(Config::from_file(&config_path).is_err());
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_layout_that_overflows_the_address_space_is_rejected() -> Result<()> {
    setup();
    // Passes the schema, fails the specific rules
    let yaml = r#"
modbus:
  num_params: 30000
  registers_per_param: 2
  reserve_registers: 10000
"#;
    let err = Config::from_yaml_str(yaml).unwrap_err();
    assert!(format!("{err:#}").contains("65536"), "{err:#}");
    Ok(())
}

#[test]
fn test_unknown_keys_are_rejected() {
    setup();
    assert!(Config::from_yaml_str("modbus:\n  prot: 1502\n").is_err());
    assert!(Config::from_yaml_str("visualization:\n  port: 8080\n").is_err());
}

#[test]
fn test_full_config_is_loaded() -> Result<()> {
    setup();
    let yaml = r#"
modbus:
  address: 127.0.0.1
  port: 1502
  num_params: 4
  registers_per_param: 8
  reserve_registers: 0
  word_swap: true
  encoding: json_text
serial:
  enabled: true
  port: /dev/ttyS0
  baud_rate: 9600
  parity: none
  data_bits: 8
  stop_bits: 2
scanner:
  host: 192.168.1.10
  port: 5020
  unit_id: 3
  max_address: 200
  chunk_size: 50
  timeout_secs: 1
  decode_floats: true
  word_swap: true
  refine_boundary: false
feed:
  source: simulate
  interval_secs: 5
"#;
    let config = Config::from_yaml_str(yaml)?;

    assert_eq!(config.modbus.encoding, ParameterEncoding::JsonText);
    assert_eq!(config.modbus.word_order(), WordOrder::LowWordFirst);
    assert_eq!(config.modbus.layout().table_len(), Some(32));
    assert_eq!(config.serial.parity, SerialParity::None);
    assert_eq!(config.serial.to_string(), "/dev/ttyS0 @ 9600 8N2");
    assert_eq!(config.scanner.options().chunk_size, 50);
    assert!(!config.scanner.options().refine_boundary);
    assert_eq!(config.feed.source, FeedSource::Simulate);
    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("saved.yaml");

    let mut config = Config::default();
    config.apply_args(None, Some(1502), Some(8), None, None, None, Some(FeedSource::None));
    config.save_to_file(&config_path)?;

    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded.modbus.port, 1502);
    assert_eq!(reloaded.modbus.num_params, 8);
    assert_eq!(reloaded.feed.source, FeedSource::None);
    Ok(())
}
