use anyhow::Result;
use signage_player::api::ApiClient;
use signage_player::config::PlayerConfig;
use signage_player::player::PlayerLoop;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = PlayerConfig::load()?;
    if let Some(key) = std::env::args().nth(1) {
        config.device_key = key;
    }
    config.validate()?;

    let client = ApiClient::new(config.api_url.clone(), config.request_timeout())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                // Park forever: this task owns the sender, and dropping it
                // would stop the player.
                std::future::pending::<()>().await;
            }
        }
    });

    #[cfg(feature = "kiosk")]
    let surface = signage_player::renderer::SdlSurface::new(&config)?;
    #[cfg(not(feature = "kiosk"))]
    let surface = signage_player::surface::LogSurface::new();

    PlayerLoop::new(
        Arc::new(client),
        surface,
        config.device_key.clone(),
        config.api_url.clone(),
        config.timings(),
    )
    .run(shutdown_rx)
    .await
}
