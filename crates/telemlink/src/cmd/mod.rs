use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read frames from a link and print them.
    Listen(ListenArgs),
    /// Encode and send a single frame.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where link bytes come from or go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `-`
    Stdio,
    /// Anything else: a file or device path.
    File(PathBuf),
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err("endpoint must not be empty".to_string());
        }
        if input == "-" {
            return Ok(Endpoint::Stdio);
        }
        if let Some(addr) = input.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(format!("tcp endpoint needs host:port, got {input:?}"));
            }
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        Ok(Endpoint::File(PathBuf::from(input)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Stdio => write!(f, "-"),
            Endpoint::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parse a message type or sender id, decimal or `0x`-prefixed hex.
pub fn parse_u16(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse::<u16>(),
    };
    parsed.map_err(|_| format!("expected a 16-bit id (e.g. 21 or 0x15), got {input:?}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Source: a file or device path, tcp://host:port, or - for stdin.
    pub source: Endpoint,
    /// Only print these message types (comma-separated, decimal or 0x hex).
    #[arg(long = "msg-type", value_delimiter = ',', value_parser = parse_u16)]
    pub msg_types: Vec<u16>,
    /// Exit after printing N frames.
    #[arg(
        long,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub count: Option<usize>,
    /// Append the raw bytes of every delimited frame to this file.
    #[arg(long, value_name = "FILE")]
    pub capture: Option<PathBuf>,
    /// Only capture frames whose CRC verified.
    #[arg(long, requires = "capture")]
    pub capture_valid_only: bool,
    /// Read timeout for tcp sources (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s", env = "TELEMLINK_READ_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination: a file or device path, tcp://host:port, or - for stdout.
    pub dest: Endpoint,
    /// Message type of the frame.
    #[arg(long = "msg-type", value_parser = parse_u16)]
    pub msg_type: u16,
    /// Sender id stamped on the frame.
    #[arg(long, default_value = "0", value_parser = parse_u16, env = "TELEMLINK_SENDER")]
    pub sender: u16,
    /// Payload as hex bytes (whitespace allowed).
    #[arg(long, conflicts_with = "text")]
    pub data: Option<String>,
    /// Payload as UTF-8 text.
    #[arg(long, conflicts_with = "data")]
    pub text: Option<String>,
    /// Append to a destination file instead of truncating it.
    #[arg(long)]
    pub append: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
