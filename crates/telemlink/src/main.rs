mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "telemlink", version, about = "Telemetry link framing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Overridden by TELEMLINK_LOG.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "telemlink",
            "listen",
            "tcp://127.0.0.1:55555",
            "--msg-type",
            "0x15,0x100",
            "--count",
            "3",
        ])
        .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.msg_types, vec![0x15, 0x100]);
                assert_eq!(args.count, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_count() {
        let err = Cli::try_parse_from(["telemlink", "listen", "-", "--count", "0"])
            .expect_err("zero count should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "telemlink",
            "send",
            "-",
            "--msg-type",
            "1",
            "--text",
            "hi",
            "--data",
            "00",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn capture_valid_only_requires_capture() {
        let err = Cli::try_parse_from(["telemlink", "listen", "-", "--capture-valid-only"])
            .expect_err("missing --capture should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_bad_msg_type() {
        let err = Cli::try_parse_from(["telemlink", "send", "-", "--msg-type", "0x10000"])
            .expect_err("out of range msg type should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
