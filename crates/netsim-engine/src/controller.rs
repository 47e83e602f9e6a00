//! Simulation controller: the `stopped ⇄ running` flag and reset

use tracing::info;

use netsim_core::{DeviceStatus, EngineEvent, SimulationState, TopologyChange};

use crate::broadcast::EventBroadcaster;

pub struct SimulationController<'a> {
    state: &'a mut SimulationState,
    events: &'a EventBroadcaster,
}

impl<'a> SimulationController<'a> {
    pub fn new(state: &'a mut SimulationState, events: &'a EventBroadcaster) -> Self {
        Self { state, events }
    }

    pub fn start(&mut self) {
        self.set_running(true);
    }

    pub fn stop(&mut self) {
        self.set_running(false);
    }

    /// Clear packet history, stop, and take every device offline.
    ///
    /// Emits `simulation-state-changed` then `topology-changed` with the
    /// reset marker. Returns the number of packets cleared.
    pub fn reset(&mut self) -> usize {
        let cleared = self.state.packets.len();
        self.state.packets.clear();
        self.state.is_running = false;
        for device in &mut self.state.devices {
            device.status = DeviceStatus::Offline;
        }

        info!(packets = cleared, devices = self.state.devices.len(), "Simulation reset");
        self.events.emit(EngineEvent::simulation(false));
        self.events.emit(EngineEvent::topology(TopologyChange::Reset));
        cleared
    }

    /// The state-changed event is emitted even when the flag already
    /// had the requested value.
    fn set_running(&mut self, running: bool) {
        let was_running = self.state.is_running;
        self.state.is_running = running;
        info!(running, was_running, "Simulation state changed");
        self.events.emit(EngineEvent::simulation(running));
    }
}
