// ── Shared agent state ──
//
// The one mutable state block. It is owned by the agent's event loop, so
// the periodic cycle and inbound commands take turns mutating it and a
// reader never sees a half-written snapshot.

use crate::config::AgentConfig;
use crate::link::{BrokerSession, NetworkLink};
use crate::model::{Counters, OperationMode};
use crate::peripheral::PeripheralSession;

#[derive(Debug)]
pub struct AgentState {
    pub link: NetworkLink,
    pub broker: BrokerSession,
    pub peripheral: PeripheralSession,
    pub mode: OperationMode,
    pub counters: Counters,
    /// Number of completed supervisor cycles.
    pub cycle: u64,
    /// Set by an accepted `restart` command; the loop exits once the reply is out.
    pub restart_requested: bool,
}

impl AgentState {
    pub fn new(config: &AgentConfig) -> Self {
        let identity =
            BrokerSession::derive_identity(&config.broker.client_prefix, &config.hardware_id);

        Self {
            link: NetworkLink::new(config.wifi.clone()),
            broker: BrokerSession::new(identity),
            peripheral: PeripheralSession::new(config.peripheral.receive_cap),
            mode: config.mode,
            counters: Counters::default(),
            cycle: 0,
            restart_requested: false,
        }
    }
}
