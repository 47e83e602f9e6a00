//! Standard field and span names
//!
//! Shared so that every crate logs the same key for the same thing and
//! JSONL output can be filtered uniformly.

/// Standard field names
pub mod fields {
    pub const DEVICE_ID: &str = "device_id";
    pub const CONNECTION_ID: &str = "connection_id";
    pub const PACKET_ID: &str = "packet_id";
    pub const SOURCE: &str = "source";
    pub const DESTINATION: &str = "destination";
    pub const PROTOCOL: &str = "protocol";
    pub const STATUS: &str = "status";
    pub const HOP_COUNT: &str = "hop_count";
    pub const EVENT_KIND: &str = "event_kind";
    pub const SUBSCRIBER: &str = "subscriber";
}

/// Standard span names
pub mod spans {
    pub const SEND_PACKET: &str = "send_packet";
    pub const RESOLVE_PATH: &str = "resolve_path";
    pub const SETTLE_PACKET: &str = "settle_packet";
    pub const TRACEROUTE: &str = "traceroute";
    pub const RESET: &str = "reset";
    pub const SUBSCRIBER: &str = "event_subscriber";
    pub const MIRROR: &str = "topology_mirror";
    pub const HTTP_REQUEST: &str = "http_request";
}
