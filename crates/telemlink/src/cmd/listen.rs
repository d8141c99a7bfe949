use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use telemlink_dispatch::{Handler, ListenerConfig, MsgFilter, ReceiveLoop};
use telemlink_frame::{Frame, Framer, FramerConfig};
use telemlink_transport::{file, tcp, ByteSource};

use crate::cmd::{parse_duration, Endpoint, ListenArgs};
use crate::exit::{dispatch_error, io_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const EXIT_GRACE: Duration = Duration::from_millis(500);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let source = open_source(&args)?;

    let config = FramerConfig {
        capture_invalid: !args.capture_valid_only,
    };
    let mut framer = Framer::with_config(source, config);
    if let Some(path) = &args.capture {
        let mut capture = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
        framer = framer.raw_sink(move |raw: &[u8]| {
            if let Err(err) = capture.write_all(raw) {
                tracing::warn!(error = %err, "raw capture write failed");
            }
        });
    }

    let handler = Arc::new(Handler::new());
    let printed = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let printer = {
        let printed = Arc::clone(&printed);
        let done = Arc::clone(&done);
        let limit = args.count;
        Arc::new(move |frame: &Frame| {
            let n = printed.fetch_add(1, Ordering::SeqCst);
            if limit.is_some_and(|limit| n >= limit) {
                return;
            }
            print_frame(frame, format);
            if limit.is_some_and(|limit| n + 1 >= limit) {
                done.store(true, Ordering::SeqCst);
            }
        })
    };
    if args.msg_types.is_empty() {
        handler.add_callback(printer, MsgFilter::All);
    } else {
        for msg_type in &args.msg_types {
            handler.add_callback(printer.clone(), *msg_type);
        }
    }

    let exhausted = Arc::new(AtomicBool::new(false));
    let producer = {
        let exhausted = Arc::clone(&exhausted);
        move || {
            let frame = framer.receive();
            if frame.is_none() && framer.is_exhausted() && !exhausted.swap(true, Ordering::SeqCst)
            {
                let stats = framer.stats();
                tracing::debug!(
                    frames = stats.frames,
                    crc_errors = stats.crc_errors,
                    truncated = stats.truncated,
                    skipped_bytes = stats.skipped_bytes,
                    "source exhausted"
                );
            }
            frame
        }
    };

    let listener_config = ListenerConfig {
        idle_backoff: Some(Duration::from_millis(1)),
        ..ListenerConfig::default()
    };
    let mut rx_loop = {
        let handler = Arc::clone(&handler);
        ReceiveLoop::with_config(
            producer,
            move |frame: Frame| {
                handler.call(&frame);
                Ok(())
            },
            listener_config,
        )
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    rx_loop
        .start()
        .map_err(|err| dispatch_error("receive loop failed to start", err))?;
    tracing::info!(source = %args.source, "listening");

    while running.load(Ordering::SeqCst)
        && !done.load(Ordering::SeqCst)
        && !exhausted.load(Ordering::SeqCst)
        && rx_loop.is_alive()
    {
        thread::sleep(POLL_INTERVAL);
    }

    rx_loop.stop();
    let deadline = Instant::now() + EXIT_GRACE;
    while rx_loop.is_alive() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }
    if !rx_loop.is_alive() {
        rx_loop
            .join()
            .map_err(|err| dispatch_error("receive loop failed", err))?;
    }

    tracing::debug!(frames = rx_loop.frames_delivered(), "listen finished");
    Ok(SUCCESS)
}

fn open_source(args: &ListenArgs) -> CliResult<Box<dyn ByteSource>> {
    let source: Box<dyn ByteSource> = match &args.source {
        Endpoint::Tcp(addr) => {
            let timeout = parse_duration(&args.timeout)?;
            Box::new(
                tcp::connect(addr, Some(timeout))
                    .map_err(|err| transport_error("connect failed", err))?,
            )
        }
        Endpoint::Stdio => Box::new(file::stdin()),
        Endpoint::File(path) => {
            Box::new(file::open(path).map_err(|err| transport_error("open failed", err))?)
        }
    };
    Ok(source)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
