// ── Connectivity supervisor ──
//
// Owns the agent state and runs the single event loop: a fixed-period
// cycle (link → broker → sensor → dispatch) interleaved with inbound
// peripheral events. Both sides mutate state only from this loop, so no
// locking is needed and snapshots are always whole.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Reply;
use crate::config::AgentConfig;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::driver::{
    BrokerClient, LastWill, NetworkDriver, PeripheralEvent, PeripheralLink, SensorSource,
};
use crate::error::CoreError;
use crate::model::{StatusLevel, TelemetrySnapshot};
use crate::peripheral::PeripheralSession;
use crate::state::AgentState;

const KEEPALIVE_MESSAGE: &str =
    r#"{"type":"status_update","message":"AQUADATA device is alive."}"#;

/// The external collaborators the agent drives.
pub struct Drivers {
    pub network: Arc<dyn NetworkDriver>,
    pub broker: Arc<dyn BrokerClient>,
    pub peripheral: Arc<dyn PeripheralLink>,
    pub sensor: Box<dyn SensorSource>,
}

/// Why [`Agent::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Cancelled from outside; the process should exit.
    Shutdown,
    /// A `restart` command was accepted; start a fresh agent.
    Restart,
}

/// Summary of one supervisor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub status: StatusLevel,
    pub delivery: DispatchReport,
}

/// The telemetry agent.
pub struct Agent {
    pub(crate) config: AgentConfig,
    pub(crate) drivers: Drivers,
    pub(crate) state: AgentState,
    snapshot: watch::Sender<Arc<TelemetrySnapshot>>,
    started: Instant,
}

impl Agent {
    /// Build an agent. Does NOT start the peripheral driver -- call
    /// [`run()`](Self::run) for that.
    pub fn new(config: AgentConfig, drivers: Drivers) -> Self {
        let state = AgentState::new(&config);
        let (snapshot, _) = watch::channel(Arc::new(TelemetrySnapshot::initial()));

        Self {
            config,
            drivers,
            state,
            snapshot,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// The most recent snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<TelemetrySnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TelemetrySnapshot>> {
        self.snapshot.subscribe()
    }

    // ── Event loop ───────────────────────────────────────────────

    /// Start the peripheral driver and run until cancelled or restarted.
    ///
    /// Only a peripheral driver that cannot be started (or dies) is
    /// returned as an error; everything else is absorbed by the loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RunOutcome, CoreError> {
        let (events_tx, mut events) = mpsc::channel(self.config.peripheral.event_capacity);
        if let Err(source) = self.drivers.peripheral.start(events_tx).await {
            let err = CoreError::PeripheralInit { source };
            error!(error = %err, "peripheral link could not be initialized");
            return Err(err);
        }
        info!(
            name = %self.config.peripheral.name,
            client_id = %self.state.broker.client_identity(),
            mode = %self.state.mode,
            "agent started"
        );

        let timing = self.config.timing.clone();
        let mut cycle = tokio::time::interval(timing.cycle_interval);
        cycle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let keepalive_period = self.config.peripheral.keepalive_interval;
        let keepalive_enabled = !keepalive_period.is_zero();
        let mut keepalive = tokio::time::interval(if keepalive_enabled {
            keepalive_period
        } else {
            timing.cycle_interval
        });
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keepalive.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.shutdown().await;
                    return Ok(RunOutcome::Shutdown);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        error!("peripheral driver stopped delivering events");
                        return Err(CoreError::PeripheralClosed);
                    };
                    if let Some(outcome) = self.handle_peripheral_event(event).await {
                        return Ok(outcome);
                    }
                }
                _ = cycle.tick() => {
                    if let Err(e) = self.guarded_cycle().await {
                        warn!(error = %e, cooldown = ?timing.error_cooldown, "cycle failed");
                        cycle.reset_after(timing.error_cooldown);
                    }
                }
                _ = keepalive.tick(), if keepalive_enabled => {
                    self.send_keepalive().await;
                }
            }
        }
    }

    /// Apply one peripheral event. Returns an outcome when the loop should end.
    pub async fn handle_peripheral_event(&mut self, event: PeripheralEvent) -> Option<RunOutcome> {
        match event {
            PeripheralEvent::Connected { peer } => {
                self.state.peripheral.peer_connected();
                info!(peer, peers = self.state.peripheral.peer_count(), "peripheral peer connected");
            }
            PeripheralEvent::Disconnected { peer } => {
                self.state.peripheral.peer_disconnected();
                info!(peer, peers = self.state.peripheral.peer_count(), "peripheral peer disconnected");
            }
            PeripheralEvent::Data(data) => {
                let messages: Vec<String> = self.state.peripheral.feed(&data).collect();
                for message in messages {
                    let reply = self.process_command(&message).await;
                    self.send_reply(&reply).await;

                    if self.state.restart_requested {
                        tokio::time::sleep(self.config.timing.restart_flush).await;
                        self.shutdown().await;
                        return Some(RunOutcome::Restart);
                    }
                }
            }
        }
        None
    }

    // ── Cycle ────────────────────────────────────────────────────

    /// [`run_cycle`](Self::run_cycle) with a panic in any driver turned
    /// into an ordinary cycle failure.
    async fn guarded_cycle(&mut self) -> Result<CycleReport, CoreError> {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(cycle = self.state.cycle + 1, "supervisor cycle panicked");
                self.recover_from_panic();
                Err(CoreError::Internal("supervisor cycle panicked".into()))
            }
        }
    }

    /// Undo state a panicking driver call can leave half-applied. A connect
    /// that never finished would otherwise hold the link in `Connecting`.
    pub(crate) fn recover_from_panic(&mut self) {
        if self.state.link.connect_failed() {
            warn!(ssid = ?self.state.link.ssid(), "abandoned interrupted WiFi connect");
        }
    }

    /// One supervisor cycle: reconcile transports, take a reading,
    /// publish the snapshot.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        self.state
            .peripheral
            .resync_peers(self.drivers.peripheral.peer_count());

        let mode = self.state.mode;
        let link_up = self.refresh_link().await;

        if mode.uses_network() && !link_up {
            if self.state.link.credentials().is_some() {
                if let Err(e) = self.connect_network().await {
                    warn!(error = %e, "WiFi connect attempt failed");
                }
            } else {
                debug!("no WiFi credentials yet; waiting for wifi_config");
            }
        }

        if self.state.broker.is_connected() && !self.drivers.broker.is_alive() {
            let err = CoreError::BrokerKeepAlive;
            warn!(error = %err, "broker session lost");
            self.state.broker.reset(Some(err.to_string()));
            self.drivers.broker.disconnect().await;
        }

        if mode.uses_broker()
            && self.state.link.is_connected()
            && !self.state.broker.is_connected()
        {
            if self
                .state
                .broker
                .attempt_due(Instant::now(), self.config.broker.backoff)
            {
                if let Err(e) = self.connect_broker().await {
                    warn!(error = %e, "broker connect attempt failed");
                }
            } else {
                debug!("broker back-off in effect; skipping connect");
            }
        }

        let reading = self.drivers.sensor.read();
        self.state.counters.record(&reading);
        self.state.cycle += 1;

        let snapshot = Arc::new(TelemetrySnapshot::from_reading(
            &reading,
            &self.state.counters,
            self.state.cycle,
            self.started.elapsed(),
            self.state.link.state(),
        ));
        self.snapshot.send_replace(Arc::clone(&snapshot));
        debug!(
            cycle = self.state.cycle,
            status = snapshot.status.label(),
            link = %self.state.link.state(),
            "cycle reading taken"
        );

        let dispatcher = Dispatcher {
            peripheral: self.drivers.peripheral.as_ref(),
            broker: self.drivers.broker.as_ref(),
            stream_topic: &self.config.broker.stream_topic,
        };
        let delivery = dispatcher
            .dispatch(
                &snapshot,
                mode,
                &mut self.state.peripheral,
                &mut self.state.broker,
            )
            .await?;

        Ok(CycleReport {
            cycle: self.state.cycle,
            status: snapshot.status,
            delivery,
        })
    }

    // ── Network link ─────────────────────────────────────────────

    /// Reconcile the tracked link with the driver. Returns whether the link
    /// is up afterwards.
    pub(crate) async fn refresh_link(&mut self) -> bool {
        if self.state.link.is_connected() && !self.drivers.network.is_connected().await {
            warn!(ssid = ?self.state.link.ssid(), "WiFi link lost");
            self.state.link.disconnect();
        }
        if self.state.broker.follow_link(&self.state.link) {
            info!("broker session dropped with the network link");
            self.drivers.broker.disconnect().await;
        }
        self.state.link.is_connected()
    }

    /// Force the link (and the broker riding on it) down.
    pub(crate) async fn drop_network(&mut self) {
        self.drivers.network.disconnect().await;
        self.state.link.disconnect();
        if self.state.broker.follow_link(&self.state.link) {
            self.drivers.broker.disconnect().await;
        }
    }

    /// One bounded connect attempt with the stored credentials.
    pub(crate) async fn connect_network(&mut self) -> Result<(), CoreError> {
        let Some(credentials) = self.state.link.credentials().cloned() else {
            return Err(CoreError::NoCredentials);
        };
        if !self.state.link.begin_connect(Instant::now()) {
            return Ok(());
        }
        let ssid = credentials.ssid.clone();
        let budget = self.config.link.clone();
        info!(ssid = %ssid, budget = ?budget.total(), "connecting to WiFi");

        if let Err(source) = self.drivers.network.begin_connect(&credentials).await {
            self.state.link.connect_failed();
            return Err(CoreError::LinkFailed { ssid, source });
        }

        for attempt in 1..=budget.attempts {
            if self.drivers.network.is_connected().await {
                self.state.link.connect_succeeded();
                info!(ssid = %ssid, attempt, "WiFi connected");
                return Ok(());
            }
            tokio::time::sleep(budget.poll_interval).await;
        }

        self.state.link.connect_failed();
        self.drivers.network.disconnect().await;
        Err(CoreError::LinkTimeout {
            ssid,
            attempts: budget.attempts,
        })
    }

    // ── Broker session ───────────────────────────────────────────

    pub(crate) fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.config.broker.status_topic.clone(),
            payload: Bytes::from(self.config.broker.offline_payload.clone()),
            retain: true,
        }
    }

    /// One broker handshake, followed by the retained online announcement.
    pub(crate) async fn connect_broker(&mut self) -> Result<(), CoreError> {
        if !self.state.link.is_connected() {
            return Err(CoreError::BrokerUnavailable {
                link: self.state.link.state().to_string(),
            });
        }
        self.state.broker.record_attempt(Instant::now());

        let will = self.last_will();
        let client_id = self.state.broker.client_identity().to_owned();
        info!(client_id = %client_id, "connecting to broker");

        if let Err(source) = self.drivers.broker.connect(&client_id, &will).await {
            self.state.broker.reset(Some(source.to_string()));
            return Err(CoreError::BrokerHandshake { source });
        }
        self.state.broker.handshake_succeeded(&self.state.link);

        let topic = self.config.broker.status_topic.clone();
        let online = Bytes::from(self.config.broker.online_payload.clone());
        if let Err(source) = self.drivers.broker.publish(&topic, online, true).await {
            self.state.broker.reset(Some(source.to_string()));
            self.drivers.broker.disconnect().await;
            return Err(CoreError::BrokerPublish { topic, source });
        }

        info!(
            client_id = %client_id,
            topic = %self.config.broker.stream_topic,
            "broker connected"
        );
        Ok(())
    }

    // ── Peripheral output ────────────────────────────────────────

    /// Write a reply to connected peers. With no peers it is dropped.
    pub(crate) async fn send_reply(&mut self, reply: &Reply) {
        match reply.to_line() {
            Ok(line) => self.write_peripheral(line).await,
            Err(e) => warn!(error = %e, "reply could not be encoded"),
        }
    }

    async fn send_keepalive(&mut self) {
        if self.state.peripheral.has_peers() {
            self.write_peripheral(PeripheralSession::frame(KEEPALIVE_MESSAGE))
                .await;
        }
    }

    async fn write_peripheral(&mut self, line: Bytes) {
        if !self.state.peripheral.has_peers() {
            debug!("no peripheral peer connected; output dropped");
            return;
        }
        if let Err(source) = self.drivers.peripheral.write(line).await {
            let err = CoreError::PeripheralWrite { source };
            warn!(error = %err, "peripheral write failed");
            self.state.peripheral.mark_lost();
        }
    }

    /// Announce a clean departure so the broker does not fire the will.
    async fn shutdown(&mut self) {
        if self.state.broker.is_connected() {
            let topic = self.config.broker.status_topic.clone();
            let offline = Bytes::from(self.config.broker.offline_payload.clone());
            if let Err(e) = self.drivers.broker.publish(&topic, offline, true).await {
                debug!(error = %e, "offline announcement failed");
            }
            self.drivers.broker.disconnect().await;
            self.state.broker.reset(None);
        }
        info!(cycles = self.state.cycle, "agent stopped");
    }
}
