//! # Netsim API
//!
//! HTTP and server-sent events adapter for the netsim engine.
//!
//! Every route is a thin translation of one engine operation. Request
//! bodies are validated here, engine errors are mapped to status codes, and
//! all JSON responses share the `{ success, data?, error?, message? }`
//! envelope.
//!
//! ## Routes
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `GET /health` | Liveness probe |
//! | `/api/devices[/{id}[/status]]` | Device CRUD and status |
//! | `/api/connections[/{id}[/status]]` | Connection CRUD and status |
//! | `/api/packets[/ping\|/traceroute\|/{id}]` | Packet creation and history |
//! | `GET /api/path` | Path resolution without creating a packet |
//! | `/api/simulation[/start\|/stop\|/reset]` | Simulation control |
//! | `GET /api/events?topic=..` | Server-sent engine events |

pub mod events;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;
pub mod validation;

pub use response::{ApiError, ApiResponse, ApiResult};
pub use routes::create_router;
pub use server::{ServerError, serve};
pub use state::AppState;
