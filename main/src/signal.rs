//! Handshake messages exchanged between the long-lived tasks.
//!
//! Each channel has exactly one sending role and one receiving role for the
//! lifetime of the process.

use crate::service::DiscoveredService;
use futures_channel::mpsc::UnboundedReceiver;
use futures_channel::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// Feeds discovery responses from every lookup to the catalog updater.
pub type EntrySender = UnboundedSender<DiscoveredService>;
pub type EntryReceiver = UnboundedReceiver<DiscoveredService>;

pub fn entry_channel() -> (EntrySender, EntryReceiver) {
    futures_channel::mpsc::unbounded()
}

/// Scheduler → updater: clear every tracked category.
#[derive(Debug)]
pub struct ResetSignal {
    pub applied: oneshot::Sender<ResetApplied>,
}

impl ResetSignal {
    pub fn pair() -> (Self, oneshot::Receiver<ResetApplied>) {
        let (applied, receiver) = oneshot::channel();
        (Self { applied }, receiver)
    }
}

/// Updater → scheduler: the reset has been written to the catalog.
#[derive(Debug, PartialEq, Eq)]
pub struct ResetApplied;

/// Shutdown coordinator → scheduler: stop refreshing.
#[derive(Debug, PartialEq, Eq)]
pub struct QueryDone;

/// Scheduler → shutdown coordinator: no further lookups will be issued.
#[derive(Debug, PartialEq, Eq)]
pub struct RefreshStopped;
