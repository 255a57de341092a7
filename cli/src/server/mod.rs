use anyhow::Context;
use coordinator::MdnsDiscoveryClient;
use coordinator::Registry;
use coordinator::RegistryConfig;
use std::sync::Arc;

pub async fn serve(config: RegistryConfig) -> anyhow::Result<()> {
    let discovery = MdnsDiscoveryClient::new(config.interface.as_deref(), config.query_window)
        .context("Failed to start the mDNS daemon")?;
    let mut registry = Registry::start(config, Arc::new(discovery))
        .await
        .context("Failed to start the registry")?;

    tokio::select! {
        signal = shutdown_signal() => {
            signal?;
            log::info!("Quit signal received, initializing shutdown...");
            registry.stop().await;
            Ok(())
        }
        e = registry.failure() => Err(e).context("Registry failed"),
    }
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
