//! Scripted scenarios run against a fresh engine
//!
//! Each scenario builds its own topology, drives a few operations, waits for
//! in-flight packets to settle, and returns what happened.

use std::time::Duration;

use clap::ValueEnum;
use tracing::info;

use netsim_core::{
    ConnectionSpec, ConnectionStatus, DeviceId, DeviceKind, DeviceSpec, DeviceStatus, EngineResult, PacketFlow,
    SimulationStats,
};
use netsim_engine::{EngineConfig, NetworkEngine, SeedTopology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// R1 - S1 - PC1: resolve a path and ping across it
    Basic,
    /// Ping and traceroute across the demo office network
    Demo,
    /// Take a link down mid-run and watch packets drop
    LinkFailure,
    /// Send traffic, then reset the simulation
    Reset,
}

/// What a scenario observed
#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub packets: Vec<PacketFlow>,
    pub stats: SimulationStats,
}

impl ScenarioReport {
    async fn capture(scenario: Scenario, engine: &NetworkEngine) -> Self {
        Self {
            scenario,
            packets: engine.history().await,
            stats: engine.stats().await,
        }
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Scenario {:?}", self.scenario)];
        for packet in &self.packets {
            let path: Vec<&str> = packet.path().iter().map(DeviceId::as_str).collect();
            lines.push(format!(
                "  {:?} {} -> {} [{}] {:?}",
                packet.protocol,
                packet.source,
                packet.destination,
                path.join(" > "),
                packet.status()
            ));
        }
        lines.push(format!(
            "  devices {} ({} online), connections {}, packets {} received / {} dropped",
            self.stats.devices,
            self.stats.devices_online,
            self.stats.connections,
            self.stats.packets_received,
            self.stats.packets_dropped
        ));
        lines.join("\n")
    }
}

/// Run `scenario` on an engine built from `config`; the seed is chosen by
/// the scenario.
pub async fn run(scenario: Scenario, config: EngineConfig) -> EngineResult<ScenarioReport> {
    info!(?scenario, "=== Running scenario ===");
    let settle = config.settle_delay();
    match scenario {
        Scenario::Basic => basic(config.with_seed(SeedTopology::Empty), settle).await,
        Scenario::Demo => demo(config.with_seed(SeedTopology::Demo), settle).await,
        Scenario::LinkFailure => link_failure(config.with_seed(SeedTopology::Demo), settle).await,
        Scenario::Reset => reset(config.with_seed(SeedTopology::Demo)).await,
    }
}

/// Wait long enough for every packet sent so far to be received
async fn settle(delay: Duration) {
    tokio::time::sleep(delay + Duration::from_millis(50)).await;
}

async fn basic(config: EngineConfig, delay: Duration) -> EngineResult<ScenarioReport> {
    let engine = NetworkEngine::new(config);
    engine.start().await;

    let r1 = engine.add_device(DeviceSpec::new(DeviceKind::Router, "R1").at(100.0, 100.0)).await?;
    let s1 = engine.add_device(DeviceSpec::new(DeviceKind::Switch, "S1").at(300.0, 100.0)).await?;
    let pc1 = engine.add_device(DeviceSpec::new(DeviceKind::Pc, "PC1").at(500.0, 100.0)).await?;
    for device in [&r1, &s1, &pc1] {
        engine.set_device_status(&device.id, DeviceStatus::Online).await?;
    }

    engine
        .add_connection(ConnectionSpec::new(r1.id.clone(), s1.id.clone()).via("GigabitEthernet0/0", "FastEthernet0/1"))
        .await?;
    engine
        .add_connection(ConnectionSpec::new(s1.id.clone(), pc1.id.clone()).via("FastEthernet0/2", "eth0"))
        .await?;

    let path = engine.resolve_path(&r1.id, &pc1.id).await;
    info!(hops = path.len().saturating_sub(1), "Path resolved");
    engine.ping(&r1.id, &pc1.id).await?;

    settle(delay).await;
    Ok(ScenarioReport::capture(Scenario::Basic, &engine).await)
}

async fn demo(config: EngineConfig, delay: Duration) -> EngineResult<ScenarioReport> {
    let engine = NetworkEngine::new(config);
    engine.start().await;

    engine.ping(&"pc1".into(), &"pc2".into()).await?;
    engine.traceroute(&"pc1".into(), &"srv1".into()).await?;

    settle(delay).await;
    Ok(ScenarioReport::capture(Scenario::Demo, &engine).await)
}

async fn link_failure(config: EngineConfig, delay: Duration) -> EngineResult<ScenarioReport> {
    let engine = NetworkEngine::new(config);
    engine.start().await;

    engine.ping(&"pc1".into(), &"srv1".into()).await?;

    // Cut the router's uplink to the server
    info!("Taking r1 <-> srv1 down");
    engine
        .set_connection_status(&"c4".into(), ConnectionStatus::Disconnected)
        .await?;
    engine.ping(&"pc1".into(), &"srv1".into()).await?;

    settle(delay).await;
    Ok(ScenarioReport::capture(Scenario::LinkFailure, &engine).await)
}

async fn reset(config: EngineConfig) -> EngineResult<ScenarioReport> {
    let engine = NetworkEngine::new(config);
    engine.start().await;

    engine.ping(&"pc1".into(), &"srv1".into()).await?;
    engine.ping(&"pc2".into(), &"srv1".into()).await?;
    info!(pending = engine.pending_settles(), "Resetting with packets in flight");
    engine.reset().await;

    Ok(ScenarioReport::capture(Scenario::Reset, &engine).await)
}
