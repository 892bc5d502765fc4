use anyhow::Context;
use rppal::gpio::Gpio;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tokio::sync::mpsc;
use tracing::error;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use entryd::config::Config;
use entryd::engine::EVENT_CHANNEL_SIZE;
use entryd::engine::Engine;
use entryd::engine::Event;
use entryd::gpio::GpioIndicators;
use entryd::gpio::SensorPins;
use entryd::light;
use entryd::light::LightClient;
use entryd::light::MqttLight;
use entryd::sun::SolarGate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration is validated in full before any resource is acquired.
    let config = Config::from_env().context("configuration error")?;

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.log_level))
        .init();

    info!("entryd starting");
    info!(
        "sunset gate location: {}, {}",
        config.latitude, config.longitude
    );

    // Resolve the light device first; an unreachable device is fatal at boot.
    let mut light_client = MqttLight::new(&config.light);
    info!(
        "connecting to light device via {}:{}",
        config.light.broker, config.light.port
    );
    light_client
        .resolve()
        .await
        .context("failed to resolve light device")?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (light_tx, light_rx) = mpsc::unbounded_channel();

    let gpio = Gpio::new().context("failed to open GPIO")?;
    let indicators =
        GpioIndicators::new(&gpio, &config).context("failed to acquire indicator pins")?;
    let _sensors = SensorPins::watch(&gpio, &config, events_tx.clone())
        .context("failed to watch sensor pins")?;

    let sun = SolarGate::new(config.latitude, config.longitude);
    let mut engine = Engine::new(
        sun,
        Box::new(indicators),
        light_tx,
        events_tx.clone(),
        config.inactivity_timeout,
        config.debounce_window,
    );

    let light_task = tokio::spawn(light::run_commands(light_client, light_rx));
    let engine_task = tokio::spawn(async move { engine.run(events_rx).await });

    info!(
        "watching door pin {} and motion pin {}",
        config.door_pin, config.motion_pin
    );

    wait_for_shutdown().await;
    info!("received shutdown signal");

    // Orderly stop: the engine cancels any pending timer on its way out; an
    // in-flight light command is abandoned, and the pins are released when
    // their handles drop.
    if events_tx.send(Event::Shutdown).await.is_err() {
        error!("engine already stopped");
    }
    if let Err(e) = engine_task.await {
        error!("engine task failed: {}", e);
    }
    light_task.abort();

    info!("entryd shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!("failed to install SIGTERM handler: {}", e);
            if let Err(e) = ctrl_c.await {
                error!("failed to listen for shutdown signal: {}", e);
            }
        }
    }
}
