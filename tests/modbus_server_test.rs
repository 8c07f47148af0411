// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the SlaveServer implementation
//!
//! These tests start a slave on a loopback port chosen by the OS and talk to
//! it with a real `tokio-modbus` client: reading and writing holding
//! registers, the error conditions, and the start/stop lifecycle.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time;
use tokio_modbus::prelude::*;

use rust_modbusinator::config::ModbusConfig;
use rust_modbusinator::daemon::SlaveServer;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Start a float slave with `num_params` slots and no reserve on 127.0.0.1:0.
async fn start_test_server(
    num_params: usize,
) -> Result<(SlaveServer, SocketAddr), Box<dyn std::error::Error>> {
    init_logger();
    let config = ModbusConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        num_params,
        reserve_registers: 0,
        ..ModbusConfig::default()
    };
    let server = SlaveServer::new(config, None)?;
    server.start().await?;
    let socket_addr = server.local_addr().ok_or("server has no local address")?;
    println!("Test server started on: {}", socket_addr);
    Ok((server, socket_addr))
}

#[tokio::test]
async fn test_read_holding_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(2).await?;
    server.table().write(0, &[10, 20, 30, 40])?;

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_holding_registers(0, 4).await??;
    assert_eq!(data, vec![10, 20, 30, 40]);

    ctx.disconnect().await?;
    server.stop();
    server.wait_stopped().await;
    Ok(())
}

#[tokio::test]
async fn test_write_single_register() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(2).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_single_register(2, 999).await??;

    let data = ctx.read_holding_registers(2, 1).await??;
    assert_eq!(data, vec![999]);
    assert_eq!(server.table().read(2, 1)?, vec![999]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_multiple_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(2).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_multiple_registers(1, &[101, 202, 303]).await??;

    let data = ctx.read_holding_registers(1, 3).await??;
    assert_eq!(data, vec![101, 202, 303]);
    assert_eq!(server.table().snapshot(), vec![0, 101, 202, 303]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_register_address() -> Result<(), Box<dyn std::error::Error>> {
    let (_server, socket_addr) = start_test_server(2).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    // Table holds 4 registers: 3..5 straddles the end
    let result = ctx.read_holding_registers(3, 2).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    let result = ctx.write_single_register(4, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_function() -> Result<(), Box<dyn std::error::Error>> {
    let (_server, socket_addr) = start_test_server(2).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_coils(0, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    let result = ctx.read_input_registers(0, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_clients_share_one_table() -> Result<(), Box<dyn std::error::Error>> {
    let (_server, socket_addr) = start_test_server(2).await?;
    let mut first = tcp::connect(socket_addr).await?;
    let mut second = tcp::connect(socket_addr).await?;

    first.write_single_register(0, 4242).await??;
    let data = second.read_holding_registers(0, 1).await??;
    assert_eq!(data, vec![4242]);

    first.disconnect().await?;
    second.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_ingested_floats_are_served() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(3).await?;
    assert_eq!(server.writer().ingest("[25.34, 26.1, 27.0]")?, 3);

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_holding_registers(0, 6).await??;
    assert_eq!(&data[..2], &[0x41CA, 0xB852]);
    assert_eq!(
        rust_modbusinator::modbus::decode_f32(
            [data[4], data[5]],
            rust_modbusinator::modbus::WordOrder::HighWordFirst
        ),
        Some(27.0)
    );

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_second_start_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(1).await?;
    server.start().await?;
    assert_eq!(server.local_addr(), Some(socket_addr));

    server.stop();
    server.stop();
    server.wait_stopped().await;
    assert!(!server.is_running());
    Ok(())
}

#[tokio::test]
async fn test_no_writes_after_stop() -> Result<(), Box<dyn std::error::Error>> {
    let (server, socket_addr) = start_test_server(2).await?;
    let mut ctx = tcp::connect(socket_addr).await?;
    ctx.write_single_register(0, 1).await??;

    server.stop();
    server.wait_stopped().await;

    // The connection opened before the stop is still answered, only with
    // an exception; the table keeps its last value.
    let write = time::timeout(Duration::from_secs(2), ctx.write_single_register(0, 2)).await??;
    assert_eq!(write, Err(ExceptionCode::ServerDeviceFailure));
    let read = time::timeout(Duration::from_secs(2), ctx.read_holding_registers(0, 1)).await??;
    assert_eq!(read, Err(ExceptionCode::ServerDeviceFailure));
    assert_eq!(server.table().read(0, 1)?, vec![1]);

    // New connections are refused
    assert!(
        time::timeout(Duration::from_secs(2), tcp::connect(socket_addr))
            .await
            .map(|connected| connected.is_err())
            .unwrap_or(true)
    );
    Ok(())
}

#[tokio::test]
async fn test_bind_failure_leaves_nothing_running() -> Result<(), Box<dyn std::error::Error>> {
    let (_server, socket_addr) = start_test_server(1).await?;

    let config = ModbusConfig {
        address: socket_addr.ip().to_string(),
        port: socket_addr.port(),
        num_params: 1,
        ..ModbusConfig::default()
    };
    let clashing = SlaveServer::new(config, None)?;
    assert!(clashing.start().await.is_err());
    assert!(!clashing.is_running());
    Ok(())
}
