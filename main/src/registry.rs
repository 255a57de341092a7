use crate::catalog::ServiceCatalog;
use crate::config::ConfigError;
use crate::config::RegistryConfig;
use crate::discovery::DiscoveryClient;
use crate::discovery::DiscoveryError;
use crate::scheduler::RefreshScheduler;
use crate::scheduler::SchedulerState;
use crate::signal::EntrySender;
use crate::signal::QueryDone;
use crate::signal::RefreshStopped;
use crate::updater::CatalogUpdater;
use crate::updater::UpdaterState;
use futures_util::Stream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio::task::JoinHandle;

/// How long in-flight HTTP requests may take to finish once shutdown begins.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// The running coordinator: HTTP listener, refresh scheduler and catalog updater.
pub struct Registry {
    #[cfg(test)]
    catalog: Arc<ServiceCatalog>,
    local_address: SocketAddr,
    http: JoinHandle<()>,
    http_quit: oneshot::Sender<()>,
    scheduler: Option<JoinHandle<Result<SchedulerState, DiscoveryError>>>,
    query_done: oneshot::Sender<QueryDone>,
    refresh_stopped: oneshot::Receiver<RefreshStopped>,
    entries: EntrySender,
    updater: JoinHandle<UpdaterState>,
}

impl Registry {
    pub async fn start(
        config: RegistryConfig,
        discovery: Arc<dyn DiscoveryClient + Send + Sync>,
    ) -> Result<Self, StartError> {
        let ticks = crate::scheduler::ticks(config.refresh_interval);
        Self::start_with_ticks(config, discovery, ticks).await
    }

    pub(crate) async fn start_with_ticks(
        config: RegistryConfig,
        discovery: Arc<dyn DiscoveryClient + Send + Sync>,
        ticks: impl Stream<Item = ()> + Unpin + Send + 'static,
    ) -> Result<Self, StartError> {
        config.validate()?;
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(StartError::Bind)?;
        let local_address = listener.local_addr().map_err(StartError::Bind)?;

        let catalog = Arc::new(ServiceCatalog::new());
        let (entries, entry_receiver) = crate::signal::entry_channel();
        let (reset_sender, reset_receiver) = tokio::sync::mpsc::channel(1);
        let updater = tokio::spawn(
            CatalogUpdater::new(catalog.clone(), entry_receiver, reset_receiver).run(),
        );

        log::info!("Looking up stream publishers and proxy caches");
        if let Err(e) = crate::scheduler::lookup_all(discovery.as_ref(), &entries) {
            entries.close_channel();
            return Err(e.into());
        }

        let (query_done, query_done_receiver) = oneshot::channel();
        let (refresh_stopped_sender, refresh_stopped) = oneshot::channel();
        let scheduler = tokio::spawn(
            RefreshScheduler::new(ticks, discovery, entries.clone(), reset_sender)
                .run(query_done_receiver, refresh_stopped_sender),
        );

        let (http_quit, http_quit_receiver) = oneshot::channel();
        let router = crate::http::router(catalog.clone(), &config.static_dir);
        let http = crate::http::serve(
            listener,
            router,
            http_quit_receiver,
            SHUTDOWN_GRACE_PERIOD,
        );
        log::info!("Started server at {}", local_address);

        Ok(Self {
            #[cfg(test)]
            catalog,
            local_address,
            http,
            http_quit,
            scheduler: Some(scheduler),
            query_done,
            refresh_stopped,
            entries,
            updater,
        })
    }

    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    #[cfg(test)]
    fn catalog(&self) -> Arc<ServiceCatalog> {
        self.catalog.clone()
    }

    /// Resolves only if the refresh scheduler dies, which is fatal to the process.
    pub async fn failure(&mut self) -> RuntimeError {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = scheduler.await;
        self.scheduler = None;
        match outcome {
            Ok(Err(e)) => RuntimeError::Refresh(e),
            Err(e) => RuntimeError::SchedulerPanicked(e),
            Ok(Ok(state)) => {
                log::warn!("Refresh scheduler ended on its own in state {:?}", state);
                std::future::pending().await
            }
        }
    }

    /// Stops the HTTP listener, then the refresh scheduler, then the catalog updater.
    ///
    /// Failures along the way are logged and do not hold up the remaining steps.
    pub async fn stop(self) {
        let Self {
            http,
            http_quit,
            scheduler,
            query_done,
            refresh_stopped,
            entries,
            updater,
            ..
        } = self;

        log::info!("Stopping HTTP listener");
        if http_quit.send(()).is_err() {
            log::debug!("HTTP listener already gone");
        }
        match http.await {
            Ok(()) => log::info!("HTTP listener stopped"),
            Err(e) => log::error!("HTTP listener task failed: {}", e),
        }

        log::info!("Stopping refresh scheduler");
        if query_done.send(QueryDone).is_err() {
            log::debug!("Refresh scheduler already gone");
        }
        if refresh_stopped.await.is_err() {
            log::warn!("Refresh scheduler exited without confirming");
        }
        if let Some(scheduler) = scheduler {
            match scheduler.await {
                Ok(Ok(state)) => log::debug!("Refresh scheduler ended in state {:?}", state),
                Ok(Err(e)) => log::error!("Refresh scheduler failed: {}", e),
                Err(e) => log::error!("Refresh scheduler task failed: {}", e),
            }
        }

        log::info!("Stopping catalog updater");
        entries.close_channel();
        match updater.await {
            Ok(state) => log::debug!("Catalog updater ended in state {:?}", state),
            Err(e) => log::error!("Catalog updater task failed: {}", e),
        }
    }
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigError),

    #[error("Failed to bind the HTTP listener")]
    Bind(#[source] std::io::Error),

    #[error("Failed to start service discovery")]
    Discovery(#[from] DiscoveryError),
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to refresh the service catalog")]
    Refresh(#[source] DiscoveryError),

    #[error("Refresh scheduler crashed")]
    SchedulerPanicked(#[source] JoinError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discovery::MockDiscoveryClient;
    use crate::service::Category;
    use crate::service::DiscoveredService;
    use futures_channel::mpsc::UnboundedSender;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn config() -> RegistryConfig {
        RegistryConfig {
            host: "127.0.0.1".into(),
            port: 0,
            static_dir: std::env::temp_dir(),
            interface: None,
            refresh_interval: Duration::from_secs(30),
            query_window: Duration::from_secs(1),
        }
    }

    fn announcement(category: Category) -> DiscoveredService {
        let (name, last_octet, info) = match category {
            Category::StreamPublisher => ("studio._stream-publisher._tcp.local.", 1, "studio_live1"),
            Category::ProxyCache => ("edge._proxy-cache._tcp.local.", 2, "edge"),
        };
        DiscoveredService {
            name: name.into(),
            address: Ipv4Addr::new(10, 0, 0, last_octet),
            port: 8080,
            info: info.into(),
        }
    }

    /// Answers each lookup once and keeps the sinks it was handed.
    fn recording_discovery(times: usize) -> (MockDiscoveryClient, Arc<Mutex<Vec<EntrySender>>>) {
        let sinks = Arc::new(Mutex::new(Vec::new()));
        let sinks_clone = sinks.clone();
        let mut discovery = MockDiscoveryClient::new();
        discovery
            .expect_lookup()
            .times(times)
            .returning(move |category, sink| {
                sink.unbounded_send(announcement(category)).unwrap();
                sinks_clone.lock().unwrap().push(sink);
                Ok(())
            });
        (discovery, sinks)
    }

    async fn wait_for_pairing(catalog: &ServiceCatalog) {
        loop {
            let snapshot = catalog.snapshot().await;
            if Category::ALL.into_iter().all(|c| snapshot.get(c).len() == 1) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    async fn http_get(address: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(address).await.unwrap();
        let request = format!("GET {} HTTP/1.0\r\nHost: localhost\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_discovered_pairings_and_shuts_down() {
        crate::test::init();

        let (discovery, sinks) = recording_discovery(2);
        let (_tick_sender, ticks) = futures_channel::mpsc::unbounded::<()>();
        let registry = Registry::start_with_ticks(config(), Arc::new(discovery), ticks)
            .await
            .unwrap();
        let catalog = registry.catalog();
        wait_for_pairing(&catalog).await;

        // When
        let home = http_get(registry.local_address(), "/").await;

        // Then
        assert!(home.contains(" 200 OK"), "{}", home);
        assert!(home.contains("From studio, cached at edge"));

        // When
        let address = registry.local_address();
        registry.stop().await;

        // Then
        assert!(TcpStream::connect(address).await.is_err());
        let sinks = sinks.lock().unwrap();
        assert_eq!(sinks.len(), 2);
        for sink in sinks.iter() {
            assert!(sink.is_closed(), "Entry channel must be closed after shutdown");
        }
    }

    #[tokio::test]
    async fn unfinished_request_does_not_outlive_stop() {
        crate::test::init();

        let (discovery, _sinks) = recording_discovery(2);
        let (_tick_sender, ticks) = futures_channel::mpsc::unbounded::<()>();
        let registry = Registry::start_with_ticks(config(), Arc::new(discovery), ticks)
            .await
            .unwrap();
        wait_for_pairing(&registry.catalog()).await;
        let mut client = TcpStream::connect(registry.local_address()).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // When
        let started = tokio::time::Instant::now();
        registry.stop().await;

        // Then
        assert!(started.elapsed() < SHUTDOWN_GRACE_PERIOD + Duration::from_secs(1));
        let _ = client.write_all(b"\r\n").await;
        let mut response = Vec::new();
        let _ = client.read_to_end(&mut response).await;
        let response = String::from_utf8_lossy(&response);
        assert!(!response.contains("200 OK"), "{}", response);
    }

    #[tokio::test]
    async fn refresh_wipes_and_relooks_up() {
        crate::test::init();

        let (discovery, sinks) = recording_discovery(4);
        let (tick_sender, ticks) = futures_channel::mpsc::unbounded::<()>();
        let registry = Registry::start_with_ticks(config(), Arc::new(discovery), ticks)
            .await
            .unwrap();
        let catalog = registry.catalog();
        wait_for_pairing(&catalog).await;

        // When
        tick_sender.unbounded_send(()).unwrap();
        while sinks.lock().unwrap().len() < 4 {
            tokio::task::yield_now().await;
        }
        wait_for_pairing(&catalog).await;

        // Then
        let snapshot = catalog.snapshot().await;
        assert_eq!(snapshot.get(Category::StreamPublisher).len(), 1);
        assert_eq!(snapshot.get(Category::ProxyCache).len(), 1);

        registry.stop().await;
    }

    #[tokio::test]
    async fn discovery_failure_is_fatal_at_startup() {
        crate::test::init();

        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_lookup().times(1).returning(|_, _| {
            Err(DiscoveryError::Mdns(mdns_sd::Error::Msg(
                "no usable interface".into(),
            )))
        });
        let (_tick_sender, ticks) = futures_channel::mpsc::unbounded::<()>();

        // When
        let result = Registry::start_with_ticks(config(), Arc::new(discovery), ticks).await;

        // Then
        assert!(matches!(result, Err(StartError::Discovery(_))));
    }

    #[tokio::test]
    async fn bind_failure_is_fatal_at_startup() {
        crate::test::init();

        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = RegistryConfig {
            port: occupied.local_addr().unwrap().port(),
            ..config()
        };
        let (discovery, _) = recording_discovery(0);
        let (_tick_sender, ticks) = futures_channel::mpsc::unbounded::<()>();

        // When
        let result = Registry::start_with_ticks(config, Arc::new(discovery), ticks).await;

        // Then
        assert!(matches!(result, Err(StartError::Bind(_))));
    }

    #[tokio::test]
    async fn refresh_failure_is_reported() {
        crate::test::init();

        let mut calls = 0;
        let mut discovery = MockDiscoveryClient::new();
        discovery.expect_lookup().returning(move |_, _| {
            calls += 1;
            if calls > 2 {
                Err(DiscoveryError::Mdns(mdns_sd::Error::Msg("gone".into())))
            } else {
                Ok(())
            }
        });
        let (tick_sender, ticks): (UnboundedSender<()>, _) = futures_channel::mpsc::unbounded();
        let mut registry = Registry::start_with_ticks(config(), Arc::new(discovery), ticks)
            .await
            .unwrap();

        // When
        tick_sender.unbounded_send(()).unwrap();

        // Then
        assert!(matches!(registry.failure().await, RuntimeError::Refresh(_)));
        registry.stop().await;
    }
}
