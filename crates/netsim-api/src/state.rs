//! Shared handler state

use netsim_engine::NetworkEngine;

/// State handed to every handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: NetworkEngine,
}

impl AppState {
    pub fn new(engine: NetworkEngine) -> Self {
        Self { engine }
    }
}
