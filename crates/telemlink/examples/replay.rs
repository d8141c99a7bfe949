//! Replay a capture file through the full pipeline and tally message types.
//!
//! Run with:
//!   cargo run --example replay -- capture.bin
//!
//! A capture can be produced with:
//!   cargo run --features cli -- listen tcp://192.168.0.222:55555 --capture capture.bin

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use telemlink::dispatch::{Handler, MsgFilter, ReceiveLoop};
use telemlink::frame::{Frame, Framer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: replay <capture-file>")?;

    let mut framer = Framer::new(telemlink::transport::file::open(&path)?);
    let handler = Arc::new(Handler::new());

    let tally = Arc::new(Mutex::new(BTreeMap::<u16, usize>::new()));
    {
        let tally = Arc::clone(&tally);
        handler.add_callback(
            Arc::new(move |frame: &Frame| {
                if let Ok(mut tally) = tally.lock() {
                    *tally.entry(frame.msg_type()).or_default() += 1;
                }
            }),
            MsgFilter::All,
        );
    }

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let mut rx = ReceiveLoop::with_handler(
        move || {
            let frame = framer.receive();
            if frame.is_none() && framer.is_exhausted() {
                let _ = done_tx.send(framer.stats());
                thread::sleep(Duration::from_millis(10));
            }
            frame
        },
        Arc::clone(&handler),
    );
    rx.start()?;

    let stats = done_rx.recv()?;
    rx.stop();
    rx.join()?;

    eprintln!(
        "{} frames, {} crc errors, {} truncated, {} noise bytes",
        stats.frames, stats.crc_errors, stats.truncated, stats.skipped_bytes
    );
    if let Ok(tally) = tally.lock() {
        for (msg_type, count) in tally.iter() {
            println!("{msg_type:#06x}\t{count}");
        }
    }
    Ok(())
}
