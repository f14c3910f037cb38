//! `aquadata run`: the agent lifecycle.
//!
//! Each generation gets freshly built drivers and a fresh agent, which is
//! what a device reset amounts to: counters, sessions and any mode or
//! WiFi change made over the peripheral start over from the config.

use std::sync::Arc;
use std::time::Duration;

use aquadata_config::Config;
use aquadata_core::{Agent, Drivers, RunOutcome};
use aquadata_drivers::{MqttBroker, MqttSettings, SimulatedSensor, SimulatedWifi, TcpPeripheral};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load(global)?;
    let hardware_id = aquadata_drivers::hardware_id(config.device.hardware_id.as_deref())
        .await
        .map_err(|source| CliError::HardwareId { source })?;
    let agent_config = config.to_agent_config(hardware_id)?;
    let listen = config.listen_addr()?;
    let fatal_delay = agent_config.timing.fatal_restart_delay;

    let cancel = CancellationToken::new();
    tokio::spawn(interrupt(cancel.clone()));

    let mut generation: u64 = 0;
    loop {
        generation += 1;
        let peripheral = Arc::new(TcpPeripheral::new(config.device.name.clone(), listen));
        let drivers = build_drivers(&config, Arc::clone(&peripheral));
        let agent = Agent::new(agent_config.clone(), drivers);

        info!(
            generation,
            name = %peripheral.name(),
            %listen,
            mode = %agent_config.mode,
            "agent starting"
        );
        let outcome = agent.run(cancel.clone()).await;
        peripheral.stop();

        match outcome {
            Ok(RunOutcome::Shutdown) => return Ok(()),
            Ok(RunOutcome::Restart) => info!(generation, "restarting agent"),
            Err(e) => {
                error!(error = %e, delay = ?fatal_delay, "agent failed; restarting after delay");
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = tokio::time::sleep(fatal_delay) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(());
        }
    }
}

fn build_drivers(config: &Config, peripheral: Arc<TcpPeripheral>) -> Drivers {
    let broker = MqttBroker::new(MqttSettings {
        host: config.broker.host.clone(),
        port: config.broker.port,
        keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
        connect_timeout: Duration::from_secs(config.broker.connect_timeout_secs),
        ..MqttSettings::default()
    });
    let wifi = SimulatedWifi::new(
        config.simulated_networks(),
        Duration::from_millis(config.simulation.association_delay_ms),
    );
    let sensor = SimulatedSensor::new(config.simulation.failure_rate, config.simulation.seed);

    Drivers {
        network: Arc::new(wifi),
        broker: Arc::new(broker),
        peripheral,
        sensor: Box::new(sensor),
    }
}

async fn interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, shutting down");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "could not listen for Ctrl-C"),
    }
}
