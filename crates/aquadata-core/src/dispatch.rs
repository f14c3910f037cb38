// ── Telemetry dispatch ──
//
// Pushes one snapshot to every eligible transport. Each transport fails on
// its own: a broken peripheral write never stops the broker publish and
// vice versa. A failed transport is knocked back to its disconnected
// state so the supervisor picks it up again on a later cycle.

use tracing::{debug, trace, warn};

use crate::driver::{BrokerClient, PeripheralLink};
use crate::error::CoreError;
use crate::link::BrokerSession;
use crate::model::{OperationMode, TelemetrySnapshot};
use crate::peripheral::PeripheralSession;

/// Which transports accepted the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub peripheral_sent: bool,
    pub broker_sent: bool,
}

/// Borrowed view of the outbound drivers.
pub struct Dispatcher<'a> {
    pub peripheral: &'a dyn PeripheralLink,
    pub broker: &'a dyn BrokerClient,
    pub stream_topic: &'a str,
}

impl Dispatcher<'_> {
    /// Send `snapshot` to each transport that `mode` allows and that is
    /// currently connected.
    ///
    /// Only an encoding failure is returned as an error; transport
    /// failures are absorbed into session state and the report.
    pub async fn dispatch(
        &self,
        snapshot: &TelemetrySnapshot,
        mode: OperationMode,
        peripheral: &mut PeripheralSession,
        broker: &mut BrokerSession,
    ) -> Result<DispatchReport, CoreError> {
        let line = snapshot.to_line()?;
        let mut report = DispatchReport::default();

        if mode.uses_peripheral() && peripheral.has_peers() {
            match self.peripheral.write(line.clone()).await {
                Ok(()) => {
                    trace!(peers = peripheral.peer_count(), "telemetry sent to peripheral");
                    report.peripheral_sent = true;
                }
                Err(source) => {
                    let err = CoreError::PeripheralWrite { source };
                    warn!(error = %err, "peripheral telemetry send failed");
                    peripheral.mark_lost();
                }
            }
        }

        if mode.uses_broker() && broker.is_connected() {
            match self.broker.publish(self.stream_topic, line, false).await {
                Ok(()) => {
                    trace!(topic = self.stream_topic, "telemetry published");
                    report.broker_sent = true;
                }
                Err(source) => {
                    let err = CoreError::BrokerPublish {
                        topic: self.stream_topic.to_owned(),
                        source,
                    };
                    warn!(error = %err, "broker publish failed, will reconnect");
                    broker.reset(Some(err.to_string()));
                    self.broker.disconnect().await;
                }
            }
        }

        debug!(
            cycle = snapshot.simulation_cycle,
            peripheral = report.peripheral_sent,
            broker = report.broker_sent,
            "telemetry dispatched"
        );
        Ok(report)
    }
}
