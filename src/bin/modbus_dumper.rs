// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbusinator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rust_modbusinator::config::{Config, SerialConfig, SerialParity};
use rust_modbusinator::modbus::codec::decode_f32_slice;
use rust_modbusinator::modbus::scanner::read_range;
use rust_modbusinator::modbus::{
    ModbusSession, ScanOptions, ScanReport, ScanState, ScanTarget, Scanner, WordOrder,
};
use std::{fmt::Write as _, net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::lookup_host;

/// Largest read used when verifying parameter slots.
const VERIFY_READ_REGISTERS: u16 = 124;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Tcp,
    Serial,
}

/// Scan and dump every holding register a Modbus server exposes
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Transport to use
    #[clap(long, value_enum, default_value = "tcp")]
    mode: Mode,

    /// TCP host
    #[clap(long)]
    host: Option<String>,

    /// TCP port
    #[clap(long)]
    port: Option<u16>,

    /// Serial port e.g. COM3 or /dev/ttyUSB0 (required in serial mode)
    #[clap(long)]
    com: Option<String>,

    /// Serial baud rate
    #[clap(long)]
    baud: Option<u32>,

    /// Serial parity
    #[clap(long, value_enum)]
    parity: Option<SerialParity>,

    /// Modbus unit id
    #[clap(long)]
    unit: Option<u8>,

    /// Maximum address to scan
    #[clap(long = "max-addr")]
    max_addr: Option<u16>,

    /// Registers per read request (at most 125)
    #[clap(long)]
    chunk: Option<u16>,

    /// Connect and request timeout in seconds
    #[clap(long)]
    timeout: Option<u64>,

    /// Also decode every register pair as a float (overrides the configuration file)
    #[clap(long, num_args = 0..=1, default_missing_value = "true")]
    decode_floats: Option<bool>,

    /// Decode floats with the low word first (overrides the configuration file)
    #[clap(long, num_args = 0..=1, default_missing_value = "true")]
    word_swap: Option<bool>,

    /// Stop at the first rejected chunk without bisecting it
    #[clap(long)]
    no_refine: bool,

    /// Instead of scanning, read and decode the first N parameter slots
    #[clap(long, value_name = "N")]
    verify_params: Option<usize>,

    /// Configuration file providing the defaults (YAML format)
    #[clap(long)]
    config: Option<PathBuf>,
}

/// Settings after merging the configuration file and the command line.
struct Settings {
    target: ScanTarget,
    unit: u8,
    timeout: Duration,
    options: ScanOptions,
    decode_floats: bool,
    word_order: WordOrder,
    registers_per_param: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let settings = merge_settings(&args, &config).await?;

    match args.verify_params {
        Some(num_params) => verify_params(&settings, num_params).await,
        None => dump(&settings).await,
    }
}

async fn merge_settings(args: &Args, config: &Config) -> Result<Settings> {
    let scanner = &config.scanner;
    let timeout = Duration::from_secs(args.timeout.unwrap_or(scanner.timeout_secs));
    if timeout.is_zero() {
        anyhow::bail!("--timeout must be at least one second");
    }

    let target = match args.mode {
        Mode::Tcp => {
            let host = args.host.clone().unwrap_or_else(|| scanner.host.clone());
            let port = args.port.unwrap_or(scanner.port);
            ScanTarget::Tcp(resolve(&host, port).await?)
        }
        Mode::Serial => {
            let Some(com) = args.com.clone() else {
                anyhow::bail!("--com is required when using --mode serial");
            };
            ScanTarget::Serial(SerialConfig {
                enabled: true,
                port: com,
                baud_rate: args.baud.unwrap_or(config.serial.baud_rate),
                parity: args.parity.unwrap_or(config.serial.parity),
                ..config.serial.clone()
            })
        }
    };

    let options = ScanOptions {
        max_address: args.max_addr.unwrap_or(scanner.max_address),
        chunk_size: args.chunk.unwrap_or(scanner.chunk_size),
        refine_boundary: scanner.refine_boundary && !args.no_refine,
    };
    options.validate()?;

    Ok(Settings {
        target,
        unit: args.unit.unwrap_or(scanner.unit_id),
        timeout,
        options,
        decode_floats: args.decode_floats.unwrap_or(scanner.decode_floats),
        word_order: WordOrder::from_word_swap(args.word_swap.unwrap_or(scanner.word_swap)),
        registers_per_param: config.modbus.registers_per_param,
    })
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", host, port))
}

async fn dump(settings: &Settings) -> Result<()> {
    let mut scanner = Scanner::new(settings.options)?;
    let report = scanner
        .run(&settings.target, settings.unit, settings.timeout)
        .await
        .context("Failed to connect to the Modbus server")?;

    print_report(&report);
    if settings.decode_floats {
        print_floats(&report, settings.word_order);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    print!("{}", format_report(report));
}

fn print_floats(report: &ScanReport, order: WordOrder) {
    let floats = format_floats(report, order);
    if floats.is_empty() {
        return;
    }
    println!("\n=== Decoded Floats ===");
    print!("{}", floats);
}

/// One line per register, the stop reason, then the summary.
fn format_report(report: &ScanReport) -> String {
    let mut out = String::new();
    for (address, value) in &report.registers {
        let _ = writeln!(out, "HR {:05} :  {:6}  (0x{:04X})", address, value, value);
    }
    match (&report.state, &report.stopped_by) {
        (ScanState::Aborted, Some(err)) => {
            let _ = writeln!(out, "Exception: {}", err);
        }
        (_, Some(err)) => {
            let _ = writeln!(out, "Server returned error -> stopping scan ({})", err);
        }
        _ => {}
    }

    out.push_str("\n=== Scan finished ===\n");
    let _ = match report.last_good_address {
        Some(last_good) => writeln!(
            out,
            "Dumped {} holding registers (0-{})",
            report.len(),
            last_good
        ),
        None => writeln!(out, "Dumped {} holding registers", report.len()),
    };
    out
}

fn format_floats(report: &ScanReport, order: WordOrder) -> String {
    let mut out = String::new();
    for float in report.decoded_floats(order) {
        let a = u32::from(float.address);
        let _ = writeln!(
            out,
            "Float {:05}-{:05} :  {:.6}   (HR{} + HR{})",
            a,
            a + 1,
            float.value,
            a,
            a + 1
        );
    }
    out
}

async fn verify_params(settings: &Settings, num_params: usize) -> Result<()> {
    let count = num_params
        .checked_mul(settings.registers_per_param)
        .context("Parameter range overflows")?;
    let mut session = ModbusSession::connect(&settings.target, settings.unit, settings.timeout)
        .await
        .context("Failed to connect to the Modbus server")?;

    let registers = read_range(&mut session, 0, count, VERIFY_READ_REGISTERS).await?;
    println!("Read {} registers for {} parameters\n", registers.len(), num_params);
    for (index, slot) in registers.chunks(settings.registers_per_param).enumerate() {
        match decode_f32_slice(slot, settings.word_order) {
            Some(value) => println!("Param {:03} : {:.6}", index, value),
            None => println!("Param {:03} : incomplete slot {:04X?}", index, slot),
        }
    }

    session.disconnect().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_modbusinator::modbus::{encode_f32, ModbusError};
    use std::collections::BTreeMap;
    use tokio_modbus::ExceptionCode;

    fn report(registers: &[(u16, u16)], state: ScanState, stopped_by: Option<ModbusError>) -> ScanReport {
        let registers: BTreeMap<u16, u16> = registers.iter().copied().collect();
        ScanReport {
            last_good_address: registers.keys().next_back().copied(),
            registers,
            state,
            stopped_by,
            requests: 1,
        }
    }

    fn config_with_flags(decode_floats: bool, word_swap: bool) -> Config {
        let mut config = Config::default();
        config.scanner.host = "127.0.0.1".to_string();
        config.scanner.decode_floats = decode_floats;
        config.scanner.word_swap = word_swap;
        config
    }

    async fn settings_for(cli: &[&str], config: &Config) -> Settings {
        let args = Args::try_parse_from(std::iter::once("modbus_dumper").chain(cli.iter().copied())).unwrap();
        merge_settings(&args, config).await.unwrap()
    }

    #[test]
    fn register_lines_are_padded() {
        let report = report(&[(12, 345), (13, 0xBEEF)], ScanState::Finished, None);
        assert_eq!(
            format_report(&report),
            "HR 00012 :     345  (0x0159)\n\
             HR 00013 :   48879  (0xBEEF)\n\
             \n\
             === Scan finished ===\n\
             Dumped 2 holding registers (0-13)\n"
        );
    }

    #[test]
    fn stop_reason_precedes_the_summary() {
        let rejected = ModbusError::DeviceProtocol {
            address: 2,
            count: 2,
            code: ExceptionCode::IllegalDataAddress,
        };
        let text = format_report(&report(&[(0, 1), (1, 2)], ScanState::Finished, Some(rejected)));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].starts_with("Server returned error -> stopping scan ("));
        assert_eq!(lines.last(), Some(&"Dumped 2 holding registers (0-1)"));

        let text = format_report(&report(&[], ScanState::Aborted, Some(ModbusError::transport("connection reset"))));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Exception: "));
        assert_eq!(lines.last(), Some(&"Dumped 0 holding registers"));
    }

    #[test]
    fn float_lines_name_both_registers() {
        let [hi, lo] = encode_f32(25.34, WordOrder::HighWordFirst);
        let report = report(&[(0, hi), (1, lo), (2, 7)], ScanState::Finished, None);
        assert_eq!(
            format_floats(&report, WordOrder::HighWordFirst),
            "Float 00000-00001 :  25.340000   (HR0 + HR1)\n"
        );
        assert!(format_floats(&self::report(&[(0, 1)], ScanState::Finished, None), WordOrder::HighWordFirst).is_empty());
    }

    #[tokio::test]
    async fn configured_flags_apply_without_command_line() {
        let settings = settings_for(&[], &config_with_flags(true, true)).await;
        assert!(settings.decode_floats);
        assert_eq!(settings.word_order, WordOrder::LowWordFirst);
    }

    #[tokio::test]
    async fn command_line_can_turn_configured_flags_off() {
        let config = config_with_flags(true, true);
        let settings = settings_for(&["--decode-floats=false", "--word-swap", "false"], &config).await;
        assert!(!settings.decode_floats);
        assert_eq!(settings.word_order, WordOrder::HighWordFirst);
    }

    #[tokio::test]
    async fn bare_flags_turn_options_on() {
        let settings = settings_for(&["--decode-floats", "--word-swap"], &config_with_flags(false, false)).await;
        assert!(settings.decode_floats);
        assert_eq!(settings.word_order, WordOrder::LowWordFirst);
    }
}
