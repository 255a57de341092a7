use std::fmt::Display;
use std::fmt::Formatter;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Number of dot-separated components a fully-qualified service name must have:
/// instance, service, protocol and domain.
const MIN_NAME_COMPONENTS: usize = 4;

const PROTOCOL: &str = "_tcp";

/// Class of service tracked by the coordinator.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Category {
    /// Origin servers producing live streams.
    StreamPublisher,

    /// Caches relaying streams from an origin.
    ProxyCache,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::StreamPublisher, Category::ProxyCache];

    pub fn key(self) -> &'static str {
        match self {
            Category::StreamPublisher => "stream-publisher",
            Category::ProxyCache => "proxy-cache",
        }
    }

    /// DNS-SD service type browsed for this category.
    pub fn service_type(self) -> String {
        format!("_{}.{}.local.", self.key(), PROTOCOL)
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw response delivered by a [`DiscoveryClient`](crate::DiscoveryClient).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DiscoveredService {
    /// Fully-qualified name, e.g. `studio._stream-publisher._tcp.local.`.
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub info: String,
}

/// A service instance accepted into the catalog.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ServiceEntry {
    pub category: Category,
    pub address: Ipv4Addr,
    pub port: u16,
    pub info: String,
}

impl ServiceEntry {
    pub fn host(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl TryFrom<DiscoveredService> for ServiceEntry {
    type Error = ServiceNameError;

    fn try_from(value: DiscoveredService) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&value.name)?,
            address: value.address,
            port: value.port,
            info: value.info,
        })
    }
}

/// Derives the category from the service and protocol labels of a name.
pub fn parse_category(name: &str) -> Result<Category, ServiceNameError> {
    let components: Vec<_> = name.strip_suffix('.').unwrap_or(name).split('.').collect();
    if components.len() < MIN_NAME_COMPONENTS {
        return Err(ServiceNameError::TooFewComponents(name.into()));
    }
    let service = components[1];
    let protocol = components[2];
    let key = service.strip_prefix('_').unwrap_or(service);
    match Category::from_key(key) {
        Some(category) if protocol == PROTOCOL => Ok(category),
        _ => Err(ServiceNameError::UnknownCategory(format!(
            "{}.{}",
            service, protocol
        ))),
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceNameError {
    #[error("Service name {0:?} is incorrectly formatted")]
    TooFewComponents(String),

    #[error("Service category {0:?} is not tracked")]
    UnknownCategory(String),
}
