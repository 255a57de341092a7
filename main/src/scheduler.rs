use crate::discovery::DiscoveryClient;
use crate::discovery::DiscoveryError;
use crate::service::Category;
use crate::signal::EntrySender;
use crate::signal::QueryDone;
use crate::signal::RefreshStopped;
use crate::signal::ResetSignal;
use futures_util::Stream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SchedulerState {
    Running,
    Draining,
    Stopped,
}

/// Ticks every `period`, starting one period from now.
pub fn ticks(period: Duration) -> impl Stream<Item = ()> + Unpin + Send + 'static {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    IntervalStream::new(interval).map(|_| ())
}

/// Issues a lookup for every tracked category.
pub fn lookup_all(
    discovery: &dyn DiscoveryClient,
    entries: &EntrySender,
) -> Result<(), DiscoveryError> {
    Category::ALL
        .into_iter()
        .try_for_each(|category| discovery.lookup(category, entries.clone()))
}

/// Periodically wipes the catalog and re-subscribes to every category.
pub struct RefreshScheduler<T> {
    ticks: T,
    discovery: Arc<dyn DiscoveryClient + Send + Sync>,
    entries: EntrySender,
    resets: Sender<ResetSignal>,
    state: SchedulerState,
}

impl<T> RefreshScheduler<T>
where
    T: Stream<Item = ()> + Unpin,
{
    pub fn new(
        ticks: T,
        discovery: Arc<dyn DiscoveryClient + Send + Sync>,
        entries: EntrySender,
        resets: Sender<ResetSignal>,
    ) -> Self {
        Self {
            ticks,
            discovery,
            entries,
            resets,
            state: SchedulerState::Running,
        }
    }

    /// Refreshes on every tick until `QueryDone` arrives, then confirms through `stopped`.
    ///
    /// A lookup that cannot be started aborts the scheduler with the error.
    pub async fn run(
        mut self,
        mut quit: oneshot::Receiver<QueryDone>,
        stopped: oneshot::Sender<RefreshStopped>,
    ) -> Result<SchedulerState, DiscoveryError> {
        let mut stopped = Some(stopped);
        let mut ticks_open = true;
        loop {
            match self.state {
                SchedulerState::Running => tokio::select! {
                    done = &mut quit => {
                        if done.is_err() {
                            log::warn!("Shutdown coordinator vanished, stopping refresh");
                        }
                        self.state = SchedulerState::Draining;
                    }
                    tick = self.ticks.next(), if ticks_open => match tick {
                        Some(()) => self.refresh().await?,
                        None => {
                            log::debug!("Refresh timer ended");
                            ticks_open = false;
                        }
                    },
                },
                SchedulerState::Draining => {
                    if let Some(stopped) = stopped.take() {
                        if stopped.send(RefreshStopped).is_err() {
                            log::debug!("Nobody is waiting for the refresh scheduler to stop");
                        }
                    }
                    self.state = SchedulerState::Stopped;
                }
                SchedulerState::Stopped => {
                    log::info!("Refresh scheduler stopped");
                    return Ok(self.state);
                }
            }
        }
    }

    async fn refresh(&mut self) -> Result<(), DiscoveryError> {
        log::info!("Refreshing service catalog");
        let (signal, applied) = ResetSignal::pair();
        if self.resets.send(signal).await.is_err() || applied.await.is_err() {
            log::warn!("Catalog updater is gone, refreshing without a reset");
        }
        lookup_all(self.discovery.as_ref(), &self.entries)
    }
}
