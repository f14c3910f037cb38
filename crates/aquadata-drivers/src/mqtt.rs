//! MQTT broker client built on `rumqttc`.
//!
//! Each [`connect`](MqttBroker::connect) is a single handshake: the event
//! loop is polled in place until the broker answers `CONNACK` (or the
//! handshake timeout fires), then handed to a background task that keeps
//! the session alive. Reconnect pacing belongs to the agent, so the
//! background task never retries; a dropped connection just flips
//! [`is_alive`](MqttBroker::is_alive) to `false`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aquadata_core::{BrokerClient, DriverError, LastWill};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ── MqttSettings ─────────────────────────────────────────────────────

/// Where and how to reach the broker.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// MQTT keep-alive interval. Default: 60s.
    pub keep_alive: Duration,
    /// Upper bound on one handshake. Default: 10s.
    pub connect_timeout: Duration,
    /// Capacity of the client → event loop request queue.
    pub request_capacity: usize,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".into(),
            port: 1883,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            request_capacity: 32,
        }
    }
}

// ── MqttBroker ───────────────────────────────────────────────────────

struct Session {
    client: AsyncClient,
    task: JoinHandle<()>,
}

/// [`BrokerClient`] over a plain-TCP MQTT 3.1.1 connection.
pub struct MqttBroker {
    settings: MqttSettings,
    session: Mutex<Option<Session>>,
    alive: Arc<AtomicBool>,
}

impl MqttBroker {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    fn options(&self, client_id: &str, will: &LastWill) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.settings.host.clone(), self.settings.port);
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);
        options.set_last_will(rumqttc::LastWill::new(
            will.topic.clone(),
            will.payload.to_vec(),
            QoS::AtLeastOnce,
            will.retain,
        ));
        options
    }

    async fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };
        if let Err(e) = session.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request not queued");
        }
        // Give the loop a moment to flush DISCONNECT before cutting it off.
        if tokio::time::timeout(Duration::from_secs(1), &mut session.task)
            .await
            .is_err()
        {
            session.task.abort();
        }
    }
}

/// Poll until the broker acknowledges the connection.
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), DriverError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(DriverError::Rejected {
                        reason: format!("{:?}", ack.code),
                    })
                };
            }
            Ok(_) => {}
            Err(e) => return Err(DriverError::Protocol(e.to_string())),
        }
    }
}

/// Keep the session serviced until it drops or is closed.
async fn drive(mut eventloop: EventLoop, alive: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT session closed by client");
                break;
            }
            Ok(event) => tracing::trace!(?event, "MQTT event"),
            Err(e) => {
                warn!(error = %e, "MQTT connection lost");
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
}

#[async_trait]
impl BrokerClient for MqttBroker {
    async fn connect(&self, client_id: &str, will: &LastWill) -> Result<(), DriverError> {
        self.teardown().await;

        let (client, mut eventloop) =
            AsyncClient::new(self.options(client_id, will), self.settings.request_capacity);

        let budget = self.settings.connect_timeout;
        tokio::time::timeout(budget, await_connack(&mut eventloop))
            .await
            .map_err(|_| DriverError::Timeout { after: budget })??;

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            client_id,
            "MQTT session established"
        );
        self.alive.store(true, Ordering::SeqCst);
        let task = tokio::spawn(drive(eventloop, Arc::clone(&self.alive)));
        *self.session.lock().await = Some(Session { client, task });
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, retain: bool) -> Result<(), DriverError> {
        if !self.is_alive() {
            return Err(DriverError::NotConnected);
        }
        let client = match self.session.lock().await.as_ref() {
            Some(session) => session.client.clone(),
            None => return Err(DriverError::NotConnected),
        };
        client
            .publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.teardown().await;
    }
}
