//! # Netsim Engine
//!
//! The in-memory network simulation engine.
//!
//! A [`NetworkEngine`] owns one topology of devices and connections and a
//! history of synthetic packets. Packets are routed over the connection
//! graph when they are created and settle after a fixed delay. Every change
//! is announced on typed broadcast channels.
//!
//! ## Components
//!
//! - [`TopologyStore`]: device and connection CRUD with cascading removal
//! - [`resolve_path`]: direct edge first, then depth- or breadth-first
//! - [`PacketLifecycle`]: `pending → transmitted → received`, or `dropped`
//! - [`SimulationController`]: run flag and reset
//! - [`EventBroadcaster`]: one channel per event kind plus a combined one
//!
//! ## Example
//!
//! ```ignore
//! use netsim_engine::{EngineConfig, NetworkEngine, SeedTopology};
//!
//! let engine = NetworkEngine::new(EngineConfig::default().with_seed(SeedTopology::Demo));
//! let mut events = engine.subscribe_packet_flow();
//!
//! let packet = engine.ping(&"pc1".into(), &"srv1".into()).await?;
//! println!("{:?} via {:?}", packet.status(), packet.path());
//! ```

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod engine;
pub mod packets;
pub mod path;
pub mod seed;
pub mod topology;

pub use broadcast::{EventBroadcaster, broadcast_to_stream};
pub use config::{DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_SETTLE_DELAY_MS, EngineConfig};
pub use controller::SimulationController;
pub use engine::NetworkEngine;
pub use packets::{PacketLifecycle, SettleTimers, traceroute_hops};
pub use path::{PathStrategy, resolve_path};
pub use seed::SeedTopology;
pub use topology::TopologyStore;

// Re-export the data model so adapters need only one dependency
pub use netsim_core;
