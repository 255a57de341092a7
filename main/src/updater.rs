use crate::catalog::ServiceCatalog;
use crate::service::Category;
use crate::service::ServiceEntry;
use crate::signal::EntryReceiver;
use crate::signal::ResetApplied;
use crate::signal::ResetSignal;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UpdaterState {
    Running,
    Stopped,
}

/// Sole writer of the [`ServiceCatalog`].
pub struct CatalogUpdater {
    catalog: Arc<ServiceCatalog>,
    entries: EntryReceiver,
    resets: Receiver<ResetSignal>,
    state: UpdaterState,
}

impl CatalogUpdater {
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        entries: EntryReceiver,
        resets: Receiver<ResetSignal>,
    ) -> Self {
        Self {
            catalog,
            entries,
            resets,
            state: UpdaterState::Running,
        }
    }

    /// Applies resets and entries until the entry channel is closed.
    pub async fn run(mut self) -> UpdaterState {
        log::debug!("Catalog updater started");
        let mut resets_open = true;
        while self.state == UpdaterState::Running {
            tokio::select! {
                signal = self.resets.recv(), if resets_open => match signal {
                    Some(signal) => self.reset(signal).await,
                    None => {
                        log::debug!("Reset channel closed, only ingesting entries from now on");
                        resets_open = false;
                    }
                },
                entry = self.entries.next() => match entry {
                    Some(discovered) => match ServiceEntry::try_from(discovered) {
                        Ok(entry) => self.catalog.append(entry).await,
                        Err(e) => log::warn!("Discarding discovery response: {}", e),
                    },
                    None => self.state = UpdaterState::Stopped,
                },
            }
        }
        log::info!("Catalog updater stopped");
        self.state
    }

    async fn reset(&mut self, signal: ResetSignal) {
        self.catalog.reset(&Category::ALL).await;
        log::debug!("Catalog reset");
        if signal.applied.send(ResetApplied).is_err() {
            log::debug!("Reset requester no longer waiting");
        }
    }
}
