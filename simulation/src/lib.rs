//! # Netsim Simulation
//!
//! Command-line front end for the netsim engine.
//!
//! ## Architecture
//!
//! - **Config** (`config.rs`): TOML configuration for the server, engine,
//!   logging, and snapshot storage
//! - **Shapes** (`shapes.rs`): Generated topologies (line, ring, star, full
//!   mesh, random)
//! - **Scenarios** (`scenarios.rs`): Scripted runs against a fresh engine
//!
//! The `netsim` binary wires these to subcommands and to the HTTP server in
//! `netsim-api`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use netsim_engine::NetworkEngine;
//! use netsim_simulation::shapes::ShapeBuilder;
//!
//! let engine = NetworkEngine::default();
//! let ids = ShapeBuilder::new(6).ring().apply(&engine).await?;
//! let packet = engine.ping(&ids[0], &ids[3]).await?;
//! ```

pub mod config;
pub mod scenarios;
pub mod shapes;

pub use config::AppConfig;
pub use scenarios::{Scenario, ScenarioReport};
pub use shapes::{Shape, ShapeBuilder, TopologyPlan};
