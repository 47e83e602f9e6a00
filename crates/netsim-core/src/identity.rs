//! Typed identifiers for devices, connections, and packets
//!
//! Ids are opaque strings on the wire. Generated ids carry a short kind
//! prefix so that logs stay readable (`dev-…`, `conn-…`, `pkt-…`); seeded
//! topologies use stable hand-written ids such as `r1` or `pc1`.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
        #[serde(transparent)]
        #[display("{_0}")]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh, globally unique id
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4().simple()))
            }

            /// Borrow the id as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a device in the topology
    DeviceId,
    "dev"
);

string_id!(
    /// Unique identifier for a connection between two devices
    ConnectionId,
    "conn"
);

string_id!(
    /// Unique identifier for a packet flow
    PacketId,
    "pkt"
);
