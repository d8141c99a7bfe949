use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use telemlink_frame::Frame;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    msg_type: u16,
    sender: u16,
    length: u8,
    crc: String,
    payload: String,
    timestamp: String,
}

impl FrameOutput {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            msg_type: frame.msg_type(),
            sender: frame.sender(),
            length: frame.length(),
            crc: format!("{:#06x}", frame.crc()),
            payload: to_hex(frame.payload()),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&FrameOutput::from_frame(frame))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MSG TYPE", "SENDER", "LEN", "CRC", "PAYLOAD"])
                .add_row(vec![
                    format!("{:#06x}", frame.msg_type()),
                    frame.sender().to_string(),
                    frame.length().to_string(),
                    format!("{:#06x}", frame.crc()),
                    to_hex(frame.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "msg_type={:#06x} sender={} len={} crc={:#06x} payload={}",
                frame.msg_type(),
                frame.sender(),
                frame.length(),
                frame.crc(),
                to_hex(frame.payload())
            );
        }
        OutputFormat::Raw => {
            print_raw(&frame.to_bytes());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
