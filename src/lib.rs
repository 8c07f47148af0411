// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Modbusinator library
//!
//! A small Modbus register exchange: a slave that publishes parameter values
//! as holding registers over TCP and RTU, and a dumper that walks an unknown
//! slave's register space in bounded chunks.

pub mod config;
pub mod daemon;
pub mod modbus;
pub mod utility;
