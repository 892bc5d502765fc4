use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use super::LightClient;
use super::LightError;
use crate::config::LightConfig;

/// How long `resolve()` waits for the broker to acknowledge the connection.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// An MQTT smart plug/bulb (Zigbee2MQTT/Tasmota-style command topic).
pub struct MqttLight {
    options: MqttOptions,
    command_topic: String,

    /// Created in `resolve()`.
    client: Option<AsyncClient>,

    /// Background task servicing the MQTT connection.
    conn_task: Option<JoinHandle<()>>,
}

impl MqttLight {
    pub fn new(config: &LightConfig) -> Self {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        Self {
            options,
            command_topic: config.command_topic.clone(),
            client: None,
            conn_task: None,
        }
    }

    /// Command payload understood by Zigbee2MQTT-style devices.
    fn payload(on: bool) -> Vec<u8> {
        serde_json::json!({ "state": if on { "ON" } else { "OFF" } })
            .to_string()
            .into_bytes()
    }
}

#[async_trait]
impl LightClient for MqttLight {
    async fn resolve(&mut self) -> Result<(), LightError> {
        let (client, mut event_loop) = AsyncClient::new(self.options.clone(), 10);

        // Wait for the broker to accept us before declaring the device
        // usable; anything else at this stage is a startup failure.
        tokio::time::timeout(RESOLVE_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(LightError::Connect(e.to_string())),
                }
            }
        })
        .await
        .map_err(|_| LightError::Connect(format!("no CONNACK within {:?}", RESOLVE_TIMEOUT)))??;

        // Keep polling in the background so publishes and pings are serviced
        // for the life of the process.
        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = event_loop.poll().await {
                    warn!("mqtt connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        self.client = Some(client);
        self.conn_task = Some(task);
        info!("light device resolved");
        Ok(())
    }

    async fn set_state(&mut self, on: bool) -> Result<(), LightError> {
        let client = self.client.as_ref().ok_or(LightError::NotResolved)?;
        client
            .publish(
                self.command_topic.as_str(),
                QoS::AtLeastOnce,
                false,
                Self::payload(on),
            )
            .await
            .map_err(|e| LightError::Command(e.to_string()))?;
        Ok(())
    }
}

impl Drop for MqttLight {
    fn drop(&mut self) {
        if let Some(task) = self.conn_task.take() {
            task.abort();
        }
    }
}
