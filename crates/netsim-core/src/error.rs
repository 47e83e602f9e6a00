//! Error types for the simulation engine
//!
//! An unreachable destination is not an error: it shows up as a packet
//! with status `dropped`.

use thiserror::Error;

/// The kind of entity an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Device,
    Connection,
    Packet,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Device => write!(f, "Device"),
            Entity::Connection => write!(f, "Connection"),
            Entity::Packet => write!(f, "Packet"),
        }
    }
}

/// Errors surfaced by engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The operation referenced an id that does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The request was rejected before any state changed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Packet creation was attempted while the simulation is stopped
    /// and the running gate is enabled
    #[error("Simulation is not running")]
    SimulationStopped,
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Short machine-readable name, used in response envelopes
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "NotFound",
            EngineError::InvalidArgument(_) => "InvalidArgument",
            EngineError::SimulationStopped => "SimulationStopped",
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EngineError::not_found(Entity::Device, "r9");
        let msg = format!("{}", err);
        assert!(msg.contains("Device not found"));
        assert!(msg.contains("r9"));
        assert_eq!(err.code(), "NotFound");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = EngineError::invalid("status must be online, offline or error");
        assert!(format!("{}", err).contains("Invalid argument"));
        assert_eq!(err.code(), "InvalidArgument");
    }

    #[test]
    fn test_stopped_display() {
        assert!(format!("{}", EngineError::SimulationStopped).contains("not running"));
    }
}
