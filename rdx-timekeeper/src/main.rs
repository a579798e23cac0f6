use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use timekeeper::format::format_time;
use timekeeper::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Headless Timekeeper: runs the alarm scheduler and logs every event.
#[derive(Debug, Parser)]
#[command(name = "timekeeperd", version)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for persisted alarms. Overrides the configuration.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration and open storage.
    let args = Args::parse();
    let mut config = TimekeeperConfig::load(args.config.as_deref())?;
    if args.data_dir.is_some() {
        config.storage.data_dir = args.data_dir;
    }
    let store = Store::from_dir(config.storage.data_dir.as_deref());

    // 3. Create the engine and attach listeners.
    let engine = TimekeeperEngine::new(config, store).await;
    spawn_event_listeners(&engine);
    for alarm in engine.alarms().await {
        info!(
            "[ALARM] {} {} '{}' active={}",
            alarm.id,
            alarm.time.to_12h(),
            alarm.label,
            alarm.is_active
        );
    }

    // 4. Run until Ctrl+C.
    engine.run().await
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &TimekeeperEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut alarm_rx = engine.subscribe_alarm_events();
    tokio::spawn(async move {
        while let Ok(event) = alarm_rx.recv().await {
            info!("[ALARM] => {:?}", event);
        }
    });

    let mut countdown_rx = engine.subscribe_countdown_events();
    tokio::spawn(async move {
        while let Ok(event) = countdown_rx.recv().await {
            match event {
                CountdownEvent::Remaining { .. } => {}
                CountdownEvent::Expired { total } => {
                    info!("[TIMER] => {} elapsed.", format_time(total.as_millis() as u64, false))
                }
                other => info!("[TIMER] => {:?}", other),
            }
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(event) = alert_rx.recv().await {
            info!("[ALERT] => {:?}", event);
        }
    });
}
