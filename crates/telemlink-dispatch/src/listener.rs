use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use telemlink_frame::Frame;
use tracing::{error, info};

use crate::error::{DispatchError, Result, SinkError};
use crate::handler::Handler;

type Producer = Box<dyn FnMut() -> Option<Frame> + Send>;
type Sink = Box<dyn FnMut(Frame) -> std::result::Result<(), SinkError> + Send>;

/// Receive loop configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Name given to the background thread.
    pub thread_name: String,
    /// Sleep after a producer attempt that yielded no frame. `None` retries
    /// immediately, leaving pacing to the byte source's blocking reads.
    pub idle_backoff: Option<Duration>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            thread_name: "telemlink-rx".to_string(),
            idle_backoff: None,
        }
    }
}

/// Lifecycle of a [`ReceiveLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Created,
    Running,
    StopRequested,
    Stopped,
}

#[derive(Debug, Default)]
struct Shared {
    cancel: AtomicBool,
    alive: AtomicBool,
    delivered: AtomicU64,
}

/// Clears `alive` when the loop thread exits, including by panic.
struct AliveGuard(Arc<Shared>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.alive.store(false, Ordering::Release);
    }
}

/// Pumps frames from a producer into a sink on a dedicated thread.
///
/// Stopping is cooperative: [`stop`](ReceiveLoop::stop) raises a flag that
/// the loop checks between iterations, so one in-flight frame may still be
/// delivered afterwards. Poll [`is_alive`](ReceiveLoop::is_alive) or call
/// [`join`](ReceiveLoop::join) to observe the exit. A loop runs at most once.
pub struct ReceiveLoop {
    parts: Option<(Producer, Sink)>,
    config: ListenerConfig,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<std::result::Result<(), SinkError>>>,
    started: bool,
}

impl ReceiveLoop {
    /// Create a loop with default configuration.
    pub fn new<P, K>(producer: P, sink: K) -> Self
    where
        P: FnMut() -> Option<Frame> + Send + 'static,
        K: FnMut(Frame) -> std::result::Result<(), SinkError> + Send + 'static,
    {
        Self::with_config(producer, sink, ListenerConfig::default())
    }

    /// Create a loop with explicit configuration.
    pub fn with_config<P, K>(producer: P, sink: K, config: ListenerConfig) -> Self
    where
        P: FnMut() -> Option<Frame> + Send + 'static,
        K: FnMut(Frame) -> std::result::Result<(), SinkError> + Send + 'static,
    {
        Self {
            parts: Some((Box::new(producer), Box::new(sink))),
            config,
            shared: Arc::new(Shared::default()),
            handle: None,
            started: false,
        }
    }

    /// Create a loop whose sink dispatches every frame through `handler`.
    pub fn with_handler<P>(producer: P, handler: Arc<Handler>) -> Self
    where
        P: FnMut() -> Option<Frame> + Send + 'static,
    {
        Self::new(producer, move |frame: Frame| {
            handler.call(&frame);
            Ok(())
        })
    }

    /// Spawn the background thread.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(if self.is_alive() {
                DispatchError::AlreadyStarted
            } else {
                DispatchError::NotRestartable
            });
        }
        let Some((mut producer, mut sink)) = self.parts.take() else {
            return Err(DispatchError::NotRestartable);
        };

        self.started = true;
        self.shared.alive.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let idle_backoff = self.config.idle_backoff;
        let name = self.config.thread_name.clone();
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let _alive = AliveGuard(Arc::clone(&shared));
            info!(thread = %name, "receive loop started");

            while !shared.cancel.load(Ordering::Acquire) {
                match producer() {
                    Some(frame) => {
                        shared.delivered.fetch_add(1, Ordering::Relaxed);
                        if let Err(err) = sink(frame) {
                            error!(
                                thread = %name,
                                error = %err,
                                "sink failed; receive loop exiting"
                            );
                            return Err(err);
                        }
                    }
                    None => {
                        if let Some(backoff) = idle_backoff {
                            thread::sleep(backoff);
                        }
                    }
                }
            }

            info!(thread = %name, "receive loop stopped");
            Ok(())
        });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.alive.store(false, Ordering::Release);
                Err(DispatchError::Spawn(err))
            }
        }
    }

    /// Ask the loop to exit after its current iteration.
    pub fn stop(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// True while the background thread is executing the loop.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ListenerState {
        if !self.started {
            ListenerState::Created
        } else if !self.is_alive() {
            ListenerState::Stopped
        } else if self.shared.cancel.load(Ordering::Acquire) {
            ListenerState::StopRequested
        } else {
            ListenerState::Running
        }
    }

    /// Frames handed to the sink so far.
    pub fn frames_delivered(&self) -> u64 {
        self.shared.delivered.load(Ordering::Relaxed)
    }

    /// Wait for the loop thread to exit and report how it ended.
    ///
    /// Does not request a stop by itself. Returns the sink's error if one
    /// ended the loop, or [`DispatchError::Panicked`] if the thread panicked.
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return if self.started {
                Ok(())
            } else {
                Err(DispatchError::NotStarted)
            };
        };

        match handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(DispatchError::Sink(err)),
            Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

impl Drop for ReceiveLoop {
    // The thread is detached, not joined: it may be parked in a blocking read.
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ReceiveLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveLoop")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("frames_delivered", &self.frames_delivered())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
