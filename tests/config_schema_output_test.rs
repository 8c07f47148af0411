// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_modbusinator::config;

#[test]
fn test_config_schema_output() -> Result<()> {
    // Output goes to stdout; only check that the embedded schema parses
    config::output_config_schema()?;
    Ok(())
}

#[test]
fn test_schema_covers_every_section() -> Result<()> {
    let schema: serde_json::Value = serde_json::from_str(config::CONFIG_SCHEMA)?;
    for section in ["modbus", "serial", "scanner", "feed"] {
        assert!(
            schema["properties"][section].is_object(),
            "schema has no {section} section"
        );
    }
    assert_eq!(
        schema["properties"]["scanner"]["properties"]["chunk_size"]["maximum"],
        125
    );
    Ok(())
}
