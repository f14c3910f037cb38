// In-memory drivers shared by the agent integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use aquadata_core::{
    Agent, AgentConfig, BrokerClient, DriverError, Drivers, LastWill, NetworkDriver,
    PeripheralEvent, PeripheralLink, SensorReading, WifiCredentials,
};

// ── Network ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNetwork {
    /// Whether a connect request ends up associated.
    pub associates: AtomicBool,
    /// Reject connect requests outright.
    pub reject: AtomicBool,
    /// Panic inside `begin_connect`, like a faulting radio driver.
    pub panics: AtomicBool,
    pub connected: AtomicBool,
    pub requests: Mutex<Vec<String>>,
    pub disconnects: AtomicUsize,
}

impl MockNetwork {
    pub fn associating() -> Self {
        let network = Self::default();
        network.associates.store(true, Ordering::SeqCst);
        network
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkDriver for MockNetwork {
    async fn begin_connect(&self, credentials: &WifiCredentials) -> Result<(), DriverError> {
        self.requests.lock().unwrap().push(credentials.ssid.clone());
        assert!(!self.panics.load(Ordering::SeqCst), "radio driver fault");
        if self.reject.load(Ordering::SeqCst) {
            return Err(DriverError::Rejected {
                reason: "no such network".into(),
            });
        }
        if self.associates.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

// ── Broker ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

pub struct MockBroker {
    pub fail_connect: AtomicBool,
    pub fail_publish: AtomicBool,
    pub alive: AtomicBool,
    pub connects: Mutex<Vec<(String, LastWill)>>,
    pub published: Mutex<Vec<Published>>,
    pub disconnects: AtomicUsize,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            fail_connect: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            connects: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        }
    }
}

impl MockBroker {
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn connect(&self, client_id: &str, will: &LastWill) -> Result<(), DriverError> {
        self.connects
            .lock()
            .unwrap()
            .push((client_id.to_owned(), will.clone()));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::Protocol("connection refused".into()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, retain: bool) -> Result<(), DriverError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(DriverError::NotConnected);
        }
        self.published.lock().unwrap().push(Published {
            topic: topic.to_owned(),
            payload,
            retain,
        });
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Peripheral ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPeripheral {
    pub peers: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_write: AtomicBool,
    pub events: Mutex<Option<mpsc::Sender<PeripheralEvent>>>,
    pub writes: Mutex<Vec<Bytes>>,
}

impl MockPeripheral {
    pub fn with_peers(peers: usize) -> Self {
        let peripheral = Self::default();
        peripheral.peers.store(peers, Ordering::SeqCst);
        peripheral
    }

    /// Every written frame as text.
    pub fn lines(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|l| serde_json::from_str(l.trim_end()).unwrap())
            .collect()
    }

    pub fn sender(&self) -> mpsc::Sender<PeripheralEvent> {
        self.events.lock().unwrap().clone().unwrap()
    }
}

#[async_trait]
impl PeripheralLink for MockPeripheral {
    async fn start(&self, events: mpsc::Sender<PeripheralEvent>) -> Result<(), DriverError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(DriverError::Protocol("radio unavailable".into()));
        }
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }

    async fn write(&self, frame: Bytes) -> Result<(), DriverError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.writes.lock().unwrap().push(frame);
        Ok(())
    }
}

// ── Sensor ──────────────────────────────────────────────────────────

pub fn healthy() -> SensorReading {
    SensorReading {
        ph: Some(7.2),
        do_conc: Some(8.5),
        do_sat: Some(95.0),
        temp: Some(24.5),
    }
}

/// Sensor that replays `script` and then repeats its last entry.
pub fn scripted(script: Vec<SensorReading>) -> impl FnMut() -> SensorReading + Send {
    let mut queue: VecDeque<SensorReading> = script.into();
    let mut last = healthy();
    move || {
        if let Some(next) = queue.pop_front() {
            last = next;
        }
        last
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub agent: Agent,
    pub network: Arc<MockNetwork>,
    pub broker: Arc<MockBroker>,
    pub peripheral: Arc<MockPeripheral>,
}

pub fn harness(config: AgentConfig) -> Harness {
    harness_with(
        config,
        MockNetwork::associating(),
        MockPeripheral::with_peers(1),
        scripted(Vec::new()),
    )
}

pub fn harness_with(
    config: AgentConfig,
    network: MockNetwork,
    peripheral: MockPeripheral,
    sensor: impl FnMut() -> SensorReading + Send + 'static,
) -> Harness {
    let network = Arc::new(network);
    let broker = Arc::new(MockBroker::default());
    let peripheral = Arc::new(peripheral);

    let agent = Agent::new(
        config,
        Drivers {
            network: network.clone(),
            broker: broker.clone(),
            peripheral: peripheral.clone(),
            sensor: Box::new(sensor),
        },
    );

    Harness {
        agent,
        network,
        broker,
        peripheral,
    }
}

pub fn config_with_wifi(ssid: &str) -> AgentConfig {
    AgentConfig {
        hardware_id: vec![0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01],
        wifi: Some(WifiCredentials::new(ssid, Some("pw".to_owned().into()))),
        ..AgentConfig::default()
    }
}

pub fn data(raw: &str) -> PeripheralEvent {
    PeripheralEvent::Data(Bytes::copy_from_slice(raw.as_bytes()))
}
