use std::path::PathBuf;

use brickpi_frame::command;
use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod estop;
pub mod frame;
pub mod poll;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a request frame and print it as hex.
    Frame(FrameArgs),
    /// Feed hex bytes through the response frame assembler.
    Decode(DecodeArgs),
    /// Open the board, apply a config and poll sensors and encoders.
    Poll(PollArgs),
    /// Broadcast an emergency stop to both controllers.
    Estop(EstopArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Frame(args) => frame::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Poll(args) => poll::run(args, format),
        Command::Estop(args) => estop::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Destination address (0 broadcasts).
    #[arg(long, short = 'a', default_value = "1")]
    pub address: u8,
    /// Command code or name (e.g. 3, 0x03, read-sensor-values, estop).
    #[arg(long, short = 'c', value_parser = parse_command)]
    pub command: u8,
    /// Command data as hex.
    #[arg(long, default_value = "")]
    pub data: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Response bytes as hex.
    pub hex: String,
    /// Feed the bytes in chunks of this size instead of all at once.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub chunk: Option<u16>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Board config file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Serial device; overrides the config file.
    #[arg(long, value_name = "PATH", env = "BRICKPI_SERIAL")]
    pub port: Option<String>,
    /// Baud rate; overrides the config file.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Stop after N polls. Default: poll until interrupted.
    #[arg(long)]
    pub count: Option<u64>,
    /// Delay between polls (e.g. 100ms, 1s).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// Motor speed as PORT=SPEED (port 0-3, speed -255..=255). Repeatable.
    #[arg(long, value_parser = parse_speed)]
    pub speed: Vec<(u8, i32)>,
}

#[derive(Args, Debug)]
pub struct EstopArgs {
    /// Serial device.
    #[arg(long, value_name = "PATH", env = "BRICKPI_SERIAL", default_value = brickpi_link::DEFAULT_SERIAL_PATH)]
    pub port: String,
    /// Baud rate.
    #[arg(long, default_value_t = brickpi_link::DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_command(input: &str) -> Result<u8, String> {
    let input = input.trim();
    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        return u8::from_str_radix(hex, 16).map_err(|err| format!("invalid command code: {err}"));
    }
    if let Ok(code) = input.parse::<u8>() {
        return Ok(code);
    }

    let wanted = input.replace('-', "_").to_ascii_uppercase();
    if wanted == "ESTOP" {
        return Ok(command::EMERGENCY_STOP);
    }
    (0..=u8::MAX)
        .filter(|code| command::is_known(*code))
        .find(|code| command::command_name(*code) == wanted)
        .ok_or_else(|| format!("unknown command: {input}"))
}

fn parse_speed(input: &str) -> Result<(u8, i32), String> {
    let (port, speed) = input
        .split_once('=')
        .ok_or_else(|| format!("expected PORT=SPEED, got {input}"))?;
    let port: u8 = port
        .trim()
        .parse()
        .map_err(|_| format!("invalid motor port: {port}"))?;
    let speed: i32 = speed
        .trim()
        .parse()
        .map_err(|_| format!("invalid motor speed: {speed}"))?;
    Ok((port, speed))
}
