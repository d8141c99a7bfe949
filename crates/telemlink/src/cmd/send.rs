use std::fs::OpenOptions;
use std::io::Write;

use telemlink_frame::{Frame, FrameWriter};
use telemlink_transport::tcp;

use crate::cmd::{Endpoint, SendArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let frame = Frame::new(args.msg_type, args.sender, payload)
        .map_err(|err| frame_error("invalid frame", err))?;

    let sink: Box<dyn Write> = match &args.dest {
        Endpoint::Tcp(addr) => Box::new(
            tcp::connect_sink(addr).map_err(|err| transport_error("connect failed", err))?,
        ),
        Endpoint::Stdio => Box::new(std::io::stdout()),
        Endpoint::File(path) => Box::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .append(args.append)
                .truncate(!args.append)
                .open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
    };

    let mut writer = FrameWriter::new(sink, args.sender);
    writer
        .write_frame(&frame)
        .map_err(|err| frame_error("send failed", err))?;
    tracing::info!(
        dest = %args.dest,
        msg_type = frame.msg_type(),
        sender = frame.sender(),
        length = frame.length(),
        "frame sent"
    );

    // Frame bytes already went to stdout; don't interleave a report with them.
    if args.dest != Endpoint::Stdio {
        print_frame(&frame, format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.data {
        return parse_hex(hex).map_err(|err| CliError::new(USAGE, format!("--data: {err}")));
    }
    if let Some(text) = &args.text {
        return Ok(text.as_bytes().to_vec());
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err("hex payload has an odd number of digits".to_string());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_value(digit: u8) -> Result<u8, String> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(format!("invalid hex digit {:?}", other as char)),
    }
}
