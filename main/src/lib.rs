//! Discovers stream publishers and proxy caches on the local network and serves
//! a page listing every publisher/cache pairing.

mod catalog;
mod config;
mod discovery;
mod http;
mod page;
mod registry;
mod scheduler;
mod service;
mod signal;
mod template;
mod updater;

pub use catalog::CatalogSnapshot;
pub use catalog::ServiceCatalog;
pub use config::parse_duration;
pub use config::ConfigError;
pub use config::DurationParseError;
pub use config::RegistryConfig;
pub use discovery::DiscoveryClient;
pub use discovery::DiscoveryError;
pub use discovery::MdnsDiscoveryClient;
pub use registry::Registry;
pub use registry::RuntimeError;
pub use registry::StartError;
pub use registry::SHUTDOWN_GRACE_PERIOD;
pub use service::Category;
pub use service::DiscoveredService;
pub use service::ServiceEntry;
pub use signal::EntrySender;
