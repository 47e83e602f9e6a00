//! # Netsim Core
//!
//! Core types, events, and errors for the netsim network simulation engine.
//!
//! This crate holds the data model shared by the engine, the persistence
//! mirror, and the HTTP adapter. It has no runtime of its own: everything
//! here is plain data plus the invariants that can be checked without the
//! rest of the topology.
//!
//! ## Key Types
//!
//! - [`Device`]: A router, switch, PC, or server placed in the topology
//! - [`Interface`]: A network interface exclusively owned by a device
//! - [`Connection`]: An undirected link between two devices
//! - [`PacketFlow`]: A synthetic packet and its lifecycle status
//! - [`SimulationState`]: The aggregate of all of the above plus the run flag
//! - [`EngineEvent`]: Notifications emitted when any of the above change
//!
//! ## Wire Format
//!
//! All types serialize with camelCase field names and the closed enum sets
//! (`router`, `online`, `connected`, `ICMP`, `transmitted`, ...) that
//! existing clients expect.

pub mod connection;
pub mod device;
pub mod error;
pub mod event;
pub mod identity;
pub mod packet;
pub mod state;

// Re-export main types
pub use connection::*;
pub use device::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use packet::*;
pub use state::*;
