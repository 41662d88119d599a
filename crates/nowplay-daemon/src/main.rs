mod artwork;
mod bridge;
mod engine;
mod featuring;
mod gate;
mod history;
mod notify;

use anyhow::Context;
use nowplay_proto::config::Settings;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = nowplay_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("nowplayd.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nowplay_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let settings = Settings::load()?;
    info!("Config loaded from: {:?}", Settings::config_path());

    // Event channel — all external inputs funnel into the engine
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<engine::EngineEvent>(256);

    let player = bridge::BridgeDriver::connect(&settings.player.bridge_socket, event_tx.clone())
        .await
        .context("failed to connect to player bridge")?;

    let sink = notify::DesktopNotifier::new(data_dir, event_tx.clone());

    let mut engine = engine::NotificationEngine::new(settings, player, sink, event_tx);
    engine.startup().await;

    info!("Daemon initialised, running event loop");
    tokio::select! {
        res = engine.run(event_rx) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
