//! Configuration for the simulation engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::path::PathStrategy;
use crate::seed::SeedTopology;

/// Default delay between a packet being transmitted and it being received
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Default capacity of each event broadcast channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for a [`NetworkEngine`](crate::NetworkEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Uniform delay before a transmitted packet is marked received.
    /// Not scaled by hop count.
    pub settle_delay_ms: u64,
    /// Traversal used when no direct edge joins source and destination
    pub path_strategy: PathStrategy,
    /// Capacity of each event broadcast channel
    pub event_channel_capacity: usize,
    /// Refuse packet creation while the simulation is stopped
    pub require_running: bool,
    /// Topology the engine starts with, and returns to on restore-less boot
    pub seed: SeedTopology,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            path_strategy: PathStrategy::DepthFirst,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            require_running: false,
            seed: SeedTopology::Empty,
        }
    }
}

impl EngineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Set the settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the path strategy
    pub fn with_path_strategy(mut self, strategy: PathStrategy) -> Self {
        self.path_strategy = strategy;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Gate packet creation on the running flag
    pub fn with_require_running(mut self, require: bool) -> Self {
        self.require_running = require;
        self
    }

    /// Set the initial topology
    pub fn with_seed(mut self, seed: SeedTopology) -> Self {
        self.seed = seed;
        self
    }
}
