use crate::service::Category;
use crate::service::DiscoveredService;
use crate::signal::EntrySender;
use mdns_sd::IfKind;
use mdns_sd::ServiceDaemon;
use mdns_sd::ServiceEvent;
use mdns_sd::ServiceInfo;
use mockall::automock;
use std::time::Duration;
use thiserror::Error;

/// TXT property carrying the human-readable description of an instance.
const INFO_PROPERTY: &str = "info";

/// Push-based subscription to service announcements.
#[automock]
pub trait DiscoveryClient {
    /// Starts a query for `category` and returns immediately.
    ///
    /// Responses are pushed onto `sink` until the query ends or the sink is closed.
    fn lookup(&self, category: Category, sink: EntrySender) -> Result<(), DiscoveryError>;
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Error in the mDNS daemon")]
    Mdns(#[from] mdns_sd::Error),
}

/// [`DiscoveryClient`] querying the local network over mDNS.
///
/// Each lookup browses for a bounded query window and then stops.
pub struct MdnsDiscoveryClient {
    daemon: ServiceDaemon,
    query_window: Duration,
}

impl MdnsDiscoveryClient {
    pub fn new(interface: Option<&str>, query_window: Duration) -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new()?;
        if let Some(name) = interface {
            log::info!("Restricting service discovery to network interface {}", name);
            daemon.disable_interface(IfKind::All)?;
            daemon.enable_interface(IfKind::Name(name.into()))?;
        }
        Ok(Self {
            daemon,
            query_window,
        })
    }
}

impl DiscoveryClient for MdnsDiscoveryClient {
    fn lookup(&self, category: Category, sink: EntrySender) -> Result<(), DiscoveryError> {
        let service_type = category.service_type();
        let events = self.daemon.browse(&service_type)?;
        log::debug!("Browsing for {}", service_type);

        let daemon = self.daemon.clone();
        let query_window = self.query_window;
        tokio::spawn(async move {
            let forward = async {
                while let Ok(event) = events.recv_async().await {
                    let ServiceEvent::ServiceResolved(info) = event else {
                        continue;
                    };
                    let Some(service) = to_discovered_service(&info) else {
                        log::debug!("Ignoring {} without an IPv4 address", info.get_fullname());
                        continue;
                    };
                    if sink.unbounded_send(service).is_err() {
                        log::debug!("Entry channel closed, abandoning lookup of {}", category);
                        return;
                    }
                }
            };
            if tokio::time::timeout(query_window, forward).await.is_err() {
                log::debug!("Query window for {} elapsed", category);
            }
            if let Err(e) = daemon.stop_browse(&service_type) {
                log::debug!("Failed to stop browsing for {}: {}", service_type, e);
            }
        });
        Ok(())
    }
}

impl Drop for MdnsDiscoveryClient {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            log::warn!("Failed to shut down the mDNS daemon: {}", e);
        }
    }
}

fn to_discovered_service(info: &ServiceInfo) -> Option<DiscoveredService> {
    let address = info.get_addresses_v4().into_iter().min().copied()?;
    Some(DiscoveredService {
        name: info.get_fullname().into(),
        address,
        port: info.get_port(),
        info: info
            .get_property_val_str(INFO_PROPERTY)
            .unwrap_or_default()
            .into(),
    })
}
