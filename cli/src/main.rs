mod server;

use clap::Parser;
use coordinator::RegistryConfig;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    crate::server::serve(Cli::parse().into()).await
}

/// Publishes every stream publisher × proxy cache pairing found over mDNS.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Listening port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Directory served under /static/
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Network interface used for service discovery, all interfaces if unset
    #[arg(long)]
    iface: Option<String>,

    /// How often the service catalog is rebuilt, e.g. `30s` or `5m`
    #[arg(long, default_value = "30s", value_parser = coordinator::parse_duration)]
    refresh_interval: Duration,

    /// How long each lookup listens for responses
    #[arg(long, default_value = "1s", value_parser = coordinator::parse_duration)]
    query_window: Duration,
}

impl From<Cli> for RegistryConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            static_dir: cli.dir,
            interface: cli.iface,
            refresh_interval: cli.refresh_interval,
            query_window: cli.query_window,
        }
    }
}
