use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use telemlink_frame::Frame;
use tracing::trace;

use crate::error::{DispatchError, Result};

/// Something that wants to see frames.
///
/// Implemented for every `Fn(&Frame)` closure; implement it directly for
/// stateful observers.
pub trait Callback: Send + Sync {
    fn invoke(&self, frame: &Frame);
}

impl<F> Callback for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn invoke(&self, frame: &Frame) {
        self(frame)
    }
}

/// Which frames a registration receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MsgFilter {
    /// Every frame, regardless of type.
    #[default]
    All,
    /// Only frames with this message type.
    Type(u16),
}

impl MsgFilter {
    pub fn matches(self, msg_type: u16) -> bool {
        match self {
            MsgFilter::All => true,
            MsgFilter::Type(wanted) => wanted == msg_type,
        }
    }
}

impl From<u16> for MsgFilter {
    fn from(msg_type: u16) -> Self {
        MsgFilter::Type(msg_type)
    }
}

impl From<Option<u16>> for MsgFilter {
    fn from(msg_type: Option<u16>) -> Self {
        msg_type.map_or(MsgFilter::All, MsgFilter::Type)
    }
}

impl fmt::Display for MsgFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgFilter::All => write!(f, "all message types"),
            MsgFilter::Type(msg_type) => write!(f, "message type {msg_type:#06x}"),
        }
    }
}

struct Registration {
    callback: Arc<dyn Callback>,
    filter: MsgFilter,
}

impl Registration {
    fn is(&self, callback: *const (), filter: MsgFilter) -> bool {
        self.filter == filter && Arc::as_ptr(&self.callback).cast::<()>() == callback
    }
}

/// Ordered callback registry that fans frames out to subscribers.
///
/// Registrations are kept in insertion order. The same callback may be
/// registered any number of times; each registration is invoked on its own.
/// `Handler` is meant to be shared (`Arc<Handler>`): registration and
/// dispatch may happen concurrently from different threads.
#[derive(Default)]
pub struct Handler {
    registrations: Mutex<Vec<Registration>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration for `callback` under `filter`.
    ///
    /// `filter` accepts a [`MsgFilter`], a bare message type, or an
    /// `Option<u16>` where `None` means every frame.
    pub fn add_callback(&self, callback: Arc<dyn Callback>, filter: impl Into<MsgFilter>) {
        let filter = filter.into();
        trace!(%filter, "adding callback");
        self.lock().push(Registration { callback, filter });
    }

    /// Remove the earliest registration of `callback` under exactly `filter`.
    ///
    /// Callbacks are identified by the `Arc` allocation they were registered
    /// with, so pass a clone of the same `Arc`.
    pub fn remove_callback<C>(&self, callback: &Arc<C>, filter: impl Into<MsgFilter>) -> Result<()>
    where
        C: ?Sized,
    {
        let filter = filter.into();
        let target = Arc::as_ptr(callback).cast::<()>();
        let mut registrations = self.lock();
        match registrations.iter().position(|r| r.is(target, filter)) {
            Some(index) => {
                registrations.remove(index);
                trace!(%filter, "removed callback");
                Ok(())
            }
            None => Err(DispatchError::NoSuchRegistration(filter)),
        }
    }

    /// Invoke every registration whose filter matches `frame`, in
    /// registration order. Returns how many invocations were made.
    ///
    /// Dispatch works on a snapshot taken under the lock, so callbacks may
    /// add or remove registrations; those changes apply from the next frame.
    /// A panicking callback propagates to the caller.
    pub fn call(&self, frame: &Frame) -> usize {
        let matched: Vec<Arc<dyn Callback>> = self
            .lock()
            .iter()
            .filter(|r| r.filter.matches(frame.msg_type()))
            .map(|r| Arc::clone(&r.callback))
            .collect();

        for callback in &matched {
            callback.invoke(frame);
        }
        matched.len()
    }

    /// Block until a frame matching `filter` is dispatched, or `timeout`
    /// elapses.
    pub fn wait_for(&self, filter: impl Into<MsgFilter>, timeout: Duration) -> Option<Frame> {
        let filter = filter.into();
        let (tx, rx) = mpsc::sync_channel::<Frame>(1);
        let callback: Arc<dyn Callback> = Arc::new(move |frame: &Frame| {
            let _ = tx.try_send(frame.clone());
        });

        self.add_callback(Arc::clone(&callback), filter);
        let received = rx.recv_timeout(timeout).ok();
        let _ = self.remove_callback(&callback, filter);
        received
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.lock().clear();
    }

    // Registration edits cannot leave the list half-updated, so a poisoned
    // lock still guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<MsgFilter> = self.lock().iter().map(|r| r.filter).collect();
        f.debug_struct("Handler")
            .field("registrations", &filters)
            .finish()
    }
}
